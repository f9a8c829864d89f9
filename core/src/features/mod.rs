pub mod bursts;
pub mod extractor;

pub use extractor::FeatureExtractor;

use crate::prelude::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Modulation family guessed from a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modulation {
    Fsk,
    Ask,
    Unknown,
}

impl Modulation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modulation::Fsk => "fsk",
            Modulation::Ask => "ask",
            Modulation::Unknown => "unknown",
        }
    }
}

/// Frequency-domain and burst-structure measurements for one sample chunk.
/// Produced once per chunk and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalFeatures {
    /// Capture timestamp of the source chunk, seconds since the epoch.
    pub timestamp: f64,
    pub center_freq_hz: f64,
    /// Power per transform bin in dBFS, lowest to highest frequency.
    pub power_spectrum_db: Vec<f32>,
    /// Burst start offsets in seconds from the beginning of the chunk.
    pub burst_timing: Vec<f64>,
    /// Burst lengths in seconds, index-aligned with `burst_timing`.
    pub burst_durations: Vec<f64>,
    /// Seconds between consecutive burst starts; `burst_count - 1` entries
    /// when bursts are present.
    pub inter_burst_intervals: Vec<f64>,
    pub burst_count: usize,
    pub modulation: Modulation,
    pub frequency_deviation_hz: f64,
    /// Span holding 99% of the spectral energy.
    pub bandwidth_hz: f64,
    pub snr_db: f64,
    pub rssi_dbm: f64,
    /// Absolute frequencies of spectral peaks above the noise floor,
    /// strongest first.
    pub peak_frequencies_hz: Vec<f64>,
}

impl SignalFeatures {
    /// Structural invariants every downstream consumer may rely on.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.burst_count != self.burst_timing.len() {
            return Err(PipelineError::Detector(format!(
                "burst_count {} does not match burst_timing length {}",
                self.burst_count,
                self.burst_timing.len()
            )));
        }
        let expected_intervals = self.burst_count.saturating_sub(1);
        if self.burst_count > 0 && self.inter_burst_intervals.len() != expected_intervals {
            return Err(PipelineError::Detector(format!(
                "expected {} inter-burst intervals, found {}",
                expected_intervals,
                self.inter_burst_intervals.len()
            )));
        }
        if self.power_spectrum_db.is_empty() {
            return Err(PipelineError::Detector("empty power spectrum".into()));
        }
        Ok(())
    }
}
