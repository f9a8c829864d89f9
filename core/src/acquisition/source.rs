use crate::acquisition::SampleChunk;
use crate::prelude::{epoch_seconds, PipelineConfig, PipelineResult};
use crate::telemetry::{LogManager, PipelineMetrics};
use num_complex::Complex32;
use rustfft::num_traits::Zero;
use std::sync::Arc;
use std::time::Duration;

/// Boundary to the sample acquisition collaborator. Implementations may
/// fail transiently with `SourceUnavailable`; recovery is the wrapper's job.
pub trait SampleSource: Send {
    fn next_chunk(&mut self) -> PipelineResult<SampleChunk>;
}

/// Synthetic no-op source used once a hardware source is declared dead.
/// Emits all-zero chunks stamped with the wall clock so the pipeline
/// keeps ticking.
pub struct SilenceSource {
    fft_size: usize,
    sample_rate_hz: f64,
    center_freq_hz: f64,
}

impl SilenceSource {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            fft_size: config.fft_size,
            sample_rate_hz: config.sample_rate_hz,
            center_freq_hz: config.center_freq_hz,
        }
    }
}

impl SampleSource for SilenceSource {
    fn next_chunk(&mut self) -> PipelineResult<SampleChunk> {
        Ok(SampleChunk::new(
            vec![Complex32::zero(); self.fft_size],
            epoch_seconds(),
            self.sample_rate_hz,
            self.center_freq_hz,
        ))
    }
}

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Wraps a hardware source with a bounded retry sequence. After three
/// failed attempts with exponential backoff the source is declared dead
/// and every later call is served from the silence fallback, so the
/// detection pipeline is never blocked on hardware recovery.
pub struct GuardedSource {
    inner: Box<dyn SampleSource>,
    fallback: SilenceSource,
    degraded: bool,
    metrics: Arc<PipelineMetrics>,
    logger: LogManager,
}

impl GuardedSource {
    pub fn new(
        inner: Box<dyn SampleSource>,
        config: &PipelineConfig,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            inner,
            fallback: SilenceSource::new(config),
            degraded: false,
            metrics,
            logger: LogManager::new(),
        }
    }

    /// True once the hardware source has been given up on.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Status line surfaced to the dashboard collaborator.
    pub fn status(&self) -> &'static str {
        if self.degraded {
            "degraded: serving synthetic silence"
        } else {
            "live"
        }
    }

    pub async fn next_chunk(&mut self) -> SampleChunk {
        if self.degraded {
            return self.silent_chunk();
        }

        let mut backoff = INITIAL_BACKOFF;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.inner.next_chunk() {
                Ok(chunk) => return chunk,
                Err(err) => {
                    self.metrics.record_source_retry();
                    self.logger.warn(&format!(
                        "sample source failed (attempt {attempt}/{MAX_ATTEMPTS}): {err}"
                    ));
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        self.degraded = true;
        self.logger
            .warn("sample source declared dead, falling back to silence");
        self.silent_chunk()
    }

    fn silent_chunk(&mut self) -> SampleChunk {
        self.fallback
            .next_chunk()
            .unwrap_or_else(|_| SampleChunk::new(Vec::new(), epoch_seconds(), 0.0, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::PipelineError;

    struct FlakySource {
        failures_left: u32,
        chunk: SampleChunk,
    }

    impl SampleSource for FlakySource {
        fn next_chunk(&mut self) -> PipelineResult<SampleChunk> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(PipelineError::SourceUnavailable("usb stall".into()));
            }
            Ok(self.chunk.clone())
        }
    }

    fn test_chunk() -> SampleChunk {
        SampleChunk::new(vec![Complex32::new(0.5, 0.0); 16], 42.0, 250_000.0, 433.92e6)
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_within_the_retry_allowance() {
        let config = PipelineConfig::default();
        let metrics = Arc::new(PipelineMetrics::new());
        let source = FlakySource {
            failures_left: 2,
            chunk: test_chunk(),
        };
        let mut guarded = GuardedSource::new(Box::new(source), &config, metrics.clone());

        let chunk = guarded.next_chunk().await;
        assert_eq!(chunk.timestamp, 42.0);
        assert!(!guarded.is_degraded());
        assert_eq!(metrics.snapshot().source_retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_silence_after_exhausting_retries() {
        let config = PipelineConfig::default();
        let metrics = Arc::new(PipelineMetrics::new());
        let source = FlakySource {
            failures_left: 10,
            chunk: test_chunk(),
        };
        let mut guarded = GuardedSource::new(Box::new(source), &config, metrics);

        let chunk = guarded.next_chunk().await;
        assert!(guarded.is_degraded());
        assert_eq!(chunk.samples.len(), config.fft_size);
        assert!(chunk.samples.iter().all(|s| s.norm_sqr() == 0.0));

        // Once degraded, the hardware source is not consulted again.
        let again = guarded.next_chunk().await;
        assert_eq!(again.samples.len(), config.fft_size);
    }
}
