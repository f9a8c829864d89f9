use rkecore::acquisition::{SampleChunk, SampleSource};
use rkecore::prelude::{PipelineError, PipelineResult};
use std::collections::VecDeque;

/// Feeds a pre-built list of chunks into the pipeline, then reports the
/// source as unavailable, which is the same failure surface a
/// disconnected receiver presents.
pub struct ScriptedSource {
    chunks: VecDeque<SampleChunk>,
}

impl ScriptedSource {
    pub fn new(chunks: Vec<SampleChunk>) -> Self {
        Self {
            chunks: chunks.into(),
        }
    }
}

impl SampleSource for ScriptedSource {
    fn next_chunk(&mut self) -> PipelineResult<SampleChunk> {
        self.chunks
            .pop_front()
            .ok_or_else(|| PipelineError::SourceUnavailable("script exhausted".into()))
    }
}
