use num_complex::Complex32;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rkecore::acquisition::SampleChunk;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Scenario shapes the generator can synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    KeyFob,
    Tpms,
    JammingContinuous,
    JammingPulse,
    JammingSweep,
    JammingSpot,
    Noise,
}

impl std::fmt::Display for ScenarioKind {
    /// Matches the kebab-case CLI value names.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScenarioKind::KeyFob => "key-fob",
            ScenarioKind::Tpms => "tpms",
            ScenarioKind::JammingContinuous => "jamming-continuous",
            ScenarioKind::JammingPulse => "jamming-pulse",
            ScenarioKind::JammingSweep => "jamming-sweep",
            ScenarioKind::JammingSpot => "jamming-spot",
            ScenarioKind::Noise => "noise",
        };
        write!(f, "{name}")
    }
}

/// Configuration for synthetic chunk generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub kind: ScenarioKind,
    pub fft_size: usize,
    pub sample_rate_hz: f64,
    pub center_freq_hz: f64,
    /// Bursts per chunk for burst-structured scenarios.
    pub burst_count: usize,
    pub burst_spacing_secs: f64,
    pub burst_duration_secs: f64,
    pub deviation_hz: f64,
    pub symbol_rate_hz: f64,
    pub amplitude: f32,
    pub noise: f32,
    pub seed: u64,
    /// Carrier offset for spot jammers, sweep starting point.
    pub tone_offset_hz: f64,
    /// Per-chunk carrier progression for sweep jammers.
    pub sweep_step_hz: f64,
    pub description: Option<String>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            kind: ScenarioKind::KeyFob,
            fft_size: 16_384,
            sample_rate_hz: 250_000.0,
            center_freq_hz: 433_920_000.0,
            burst_count: 4,
            burst_spacing_secs: 0.015,
            burst_duration_secs: 0.003,
            deviation_hz: 35_000.0,
            symbol_rate_hz: 2_000.0,
            amplitude: 0.5,
            noise: 0.002,
            seed: 0,
            tone_offset_hz: 10_000.0,
            sweep_step_hz: 15_000.0,
            description: None,
        }
    }
}

impl ScenarioConfig {
    pub fn for_kind(kind: ScenarioKind) -> Self {
        let mut config = Self {
            kind,
            ..Default::default()
        };
        match kind {
            ScenarioKind::KeyFob => {}
            ScenarioKind::Tpms => {
                config.burst_count = 2;
                config.burst_spacing_secs = 0.030;
                config.burst_duration_secs = 0.008;
                config.deviation_hz = 20_000.0;
            }
            ScenarioKind::JammingContinuous => {
                config.amplitude = 0.5;
            }
            ScenarioKind::JammingPulse => {
                config.burst_count = 4;
                config.burst_duration_secs = 0.005;
            }
            ScenarioKind::JammingSweep | ScenarioKind::JammingSpot => {
                config.amplitude = 0.9;
            }
            ScenarioKind::Noise => {
                config.amplitude = 0.0;
            }
        }
        config
    }
}

/// Builds one chunk of the configured scenario. `chunk_index` advances
/// time-varying scenarios such as the sweep jammer.
pub fn build_chunk(config: &ScenarioConfig, timestamp: f64, chunk_index: usize) -> SampleChunk {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(chunk_index as u64));
    let mut samples: Vec<Complex32> = (0..config.fft_size)
        .map(|_| noise_sample(&mut rng, config.noise))
        .collect();

    match config.kind {
        ScenarioKind::KeyFob | ScenarioKind::Tpms => {
            add_fsk_bursts(&mut samples, config);
        }
        ScenarioKind::JammingContinuous => {
            for sample in &mut samples {
                *sample = noise_sample(&mut rng, config.amplitude);
            }
        }
        ScenarioKind::JammingPulse => {
            add_noise_bursts(&mut samples, config, &mut rng);
        }
        ScenarioKind::JammingSweep => {
            let offset = config.tone_offset_hz + chunk_index as f64 * config.sweep_step_hz;
            add_tone(&mut samples, config, offset);
        }
        ScenarioKind::JammingSpot => {
            add_tone(&mut samples, config, config.tone_offset_hz);
        }
        ScenarioKind::Noise => {}
    }

    SampleChunk::new(
        samples,
        timestamp,
        config.sample_rate_hz,
        config.center_freq_hz,
    )
}

fn noise_sample(rng: &mut StdRng, amplitude: f32) -> Complex32 {
    if amplitude <= 0.0 {
        return Complex32::new(0.0, 0.0);
    }
    Complex32::new(
        rng.gen_range(-amplitude..amplitude),
        rng.gen_range(-amplitude..amplitude),
    )
}

/// Phase-continuous two-tone FSK bursts with a leading guard interval.
fn add_fsk_bursts(samples: &mut [Complex32], config: &ScenarioConfig) {
    let rate = config.sample_rate_hz;
    let burst_len = (config.burst_duration_secs * rate) as usize;
    let mut phase = 0.0_f64;

    for burst in 0..config.burst_count {
        let start = ((0.005 + burst as f64 * config.burst_spacing_secs) * rate) as usize;
        for n in 0..burst_len {
            let index = start + n;
            if index >= samples.len() {
                break;
            }
            let symbol = ((n as f64 / rate) * config.symbol_rate_hz) as usize;
            let freq = if symbol % 2 == 0 {
                config.deviation_hz
            } else {
                -config.deviation_hz
            };
            phase += TAU * freq / rate;
            samples[index] += Complex32::new(
                config.amplitude * phase.cos() as f32,
                config.amplitude * phase.sin() as f32,
            );
        }
    }
}

/// Broadband noise bursts with the configured regular spacing.
fn add_noise_bursts(samples: &mut [Complex32], config: &ScenarioConfig, rng: &mut StdRng) {
    let rate = config.sample_rate_hz;
    let burst_len = (config.burst_duration_secs * rate) as usize;
    for burst in 0..config.burst_count {
        let start = ((0.005 + burst as f64 * config.burst_spacing_secs) * rate) as usize;
        for n in 0..burst_len {
            let index = start + n;
            if index >= samples.len() {
                break;
            }
            samples[index] += noise_sample(rng, config.amplitude);
        }
    }
}

fn add_tone(samples: &mut [Complex32], config: &ScenarioConfig, offset_hz: f64) {
    let rate = config.sample_rate_hz;
    for (n, sample) in samples.iter_mut().enumerate() {
        let phase = TAU * offset_hz / rate * n as f64;
        *sample += Complex32::new(
            config.amplitude * phase.cos() as f32,
            config.amplitude * phase.sin() as f32,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_builds_expected_sample_count() {
        let config = ScenarioConfig::default();
        let chunk = build_chunk(&config, 0.0, 0);
        assert_eq!(chunk.samples.len(), config.fft_size);
        assert_eq!(chunk.sample_rate_hz, 250_000.0);
    }

    #[test]
    fn generation_is_deterministic_per_seed_and_index() {
        let config = ScenarioConfig::for_kind(ScenarioKind::JammingContinuous);
        let a = build_chunk(&config, 0.0, 3);
        let b = build_chunk(&config, 0.0, 3);
        assert_eq!(a.samples, b.samples);

        let c = build_chunk(&config, 0.0, 4);
        assert_ne!(a.samples, c.samples);
    }

    #[test]
    fn key_fob_bursts_sit_above_the_noise_floor() {
        let config = ScenarioConfig::default();
        let chunk = build_chunk(&config, 0.0, 0);
        let rate = config.sample_rate_hz;
        let in_burst = ((0.005 + 0.001) * rate) as usize;
        let in_gap = ((0.005 + 0.010) * rate) as usize;
        assert!(chunk.samples[in_burst].norm() > 0.3);
        assert!(chunk.samples[in_gap].norm() < 0.1);
    }

    #[test]
    fn sweep_carrier_advances_between_chunks() {
        let config = ScenarioConfig::for_kind(ScenarioKind::JammingSweep);
        // Different chunk indices place the tone at different offsets, so
        // the sample streams must differ.
        let a = build_chunk(&config, 0.0, 0);
        let b = build_chunk(&config, 0.0, 1);
        assert_ne!(a.samples, b.samples);
    }
}
