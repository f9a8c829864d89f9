pub mod classifier;
pub mod templates;

pub use classifier::{DetectedSignal, PatternClassifier, MIN_CONFIDENCE};
pub use templates::{SignalTemplate, SignalType};
