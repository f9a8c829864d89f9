use serde::{Deserialize, Serialize};

/// Shared configuration for the detection pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Transform size; must be a power of two within the supported range.
    pub fft_size: usize,
    pub sample_rate_hz: f64,
    pub center_freq_hz: f64,
    /// History retention window in seconds.
    pub retention_secs: f64,
    /// Maximum number of entries kept in the history store.
    pub history_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fft_size: 16_384,
            sample_rate_hz: 250_000.0,
            center_freq_hz: 433_920_000.0,
            retention_secs: 300.0,
            history_capacity: 1000,
        }
    }
}

/// Common error type for pipeline execution.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("invalid chunk size: {got} samples is not a supported transform size")]
    InvalidChunkSize { got: usize },
    #[error("sample source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("peer link lost: {0}")]
    PeerLinkLost(String),
    #[error("detector failure: {0}")]
    Detector(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Seconds since the Unix epoch as a float timestamp.
pub fn epoch_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_supported_transform_size() {
        let config = PipelineConfig::default();
        assert!(config.fft_size.is_power_of_two());
        assert_eq!(config.history_capacity, 1000);
    }

    #[test]
    fn errors_render_their_context() {
        let err = PipelineError::InvalidChunkSize { got: 1000 };
        assert!(err.to_string().contains("1000"));
    }
}
