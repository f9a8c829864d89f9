use anyhow::Context;
use rkecore::prelude::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub fft_size: usize,
    pub sample_rate_hz: f64,
    pub center_freq_hz: f64,
    pub retention_secs: f64,
    pub history_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let core = PipelineConfig::default();
        Self {
            fft_size: core.fft_size,
            sample_rate_hz: core.sample_rate_hz,
            center_freq_hz: core.center_freq_hz,
            retention_secs: core.retention_secs,
            history_capacity: core.history_capacity,
        }
    }
}

impl MonitorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading monitor config {}", path_ref.display()))?;
        let config: MonitorConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing monitor config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(fft_size: usize, sample_rate_hz: f64, center_freq_hz: f64) -> Self {
        Self {
            fft_size,
            sample_rate_hz,
            center_freq_hz,
            ..Default::default()
        }
    }

    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            fft_size: self.fft_size,
            sample_rate_hz: self.sample_rate_hz,
            center_freq_hz: self.center_freq_hz,
            retention_secs: self.retention_secs,
            history_capacity: self.history_capacity,
        }
    }
}
