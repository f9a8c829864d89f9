pub mod chunk;
pub mod source;

pub use chunk::SampleChunk;
pub use source::{GuardedSource, SampleSource, SilenceSource};
