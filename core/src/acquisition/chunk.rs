use num_complex::Complex32;
use serde::{Deserialize, Serialize};

/// One fixed-size block of complex baseband samples handed over by the
/// acquisition front end. Arrival order is capture order; arrival timing
/// is not assumed uniform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleChunk {
    pub samples: Vec<Complex32>,
    /// Capture timestamp, seconds since the Unix epoch.
    pub timestamp: f64,
    pub sample_rate_hz: f64,
    pub center_freq_hz: f64,
}

impl SampleChunk {
    pub fn new(
        samples: Vec<Complex32>,
        timestamp: f64,
        sample_rate_hz: f64,
        center_freq_hz: f64,
    ) -> Self {
        Self {
            samples,
            timestamp,
            sample_rate_hz,
            center_freq_hz,
        }
    }

    /// Chunk duration in seconds at the nominal sample rate.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate_hz <= 0.0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate_hz
    }
}
