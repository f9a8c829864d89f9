use crate::acquisition::SampleChunk;
use crate::features::bursts::detect_bursts;
use crate::features::{Modulation, SignalFeatures};
use crate::math::{FftHelper, StatsHelper};
use crate::prelude::{PipelineError, PipelineResult};
use std::f64::consts::TAU;

const MIN_FFT_SIZE: usize = 256;
const MAX_FFT_SIZE: usize = 65_536;

/// Peaks must clear the noise floor by this much.
const PEAK_ABOVE_FLOOR_DB: f32 = 10.0;
/// Hysteresis thresholds for burst gating, relative to the envelope floor.
const BURST_ENTER_DB: f32 = 10.0;
const BURST_EXIT_DB: f32 = 6.0;
const MIN_BURST_SAMPLES: usize = 64;
const ENVELOPE_SMOOTHING: usize = 32;
/// Fraction of spectral energy defining the occupied bandwidth.
const OBW_ENERGY_FRACTION: f64 = 0.99;
/// Full-scale digital power maps to this many dBm at the antenna port.
const RSSI_CAL_OFFSET_DB: f64 = -30.0;
/// Below this instantaneous-frequency spread a signal is not considered
/// frequency keyed.
const FSK_MIN_DEVIATION_HZ: f64 = 5_000.0;
/// Envelope coefficient of variation above which the amplitude is not
/// considered stable.
const AMP_STABLE_CV: f64 = 0.25;
const MAX_REPORTED_PEAKS: usize = 8;

/// Turns one chunk of complex baseband samples into a `SignalFeatures`
/// record. Pure and deterministic; safe to share across worker threads.
pub struct FeatureExtractor {
    fft: FftHelper,
}

impl FeatureExtractor {
    pub fn new(fft_size: usize) -> PipelineResult<Self> {
        if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
            return Err(PipelineError::InvalidChunkSize { got: fft_size });
        }
        Ok(Self {
            fft: FftHelper::new(fft_size),
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft.size()
    }

    pub fn extract(&self, chunk: &SampleChunk) -> PipelineResult<SignalFeatures> {
        let size = self.fft.size();
        if chunk.samples.len() != size {
            return Err(PipelineError::InvalidChunkSize {
                got: chunk.samples.len(),
            });
        }

        // Power spectrum, shifted so bin order equals frequency order.
        let transformed = self.fft.forward(&chunk.samples);
        let scale = (size * size) as f32;
        let mut power_linear: Vec<f32> = Vec::with_capacity(size);
        for &bin in transformed[size / 2..].iter().chain(&transformed[..size / 2]) {
            power_linear.push(bin.norm_sqr() / scale);
        }
        let power_db: Vec<f32> = power_linear.iter().map(|&p| StatsHelper::db(p)).collect();

        let noise_floor_db = StatsHelper::median(&power_db);
        let bin_width = chunk.sample_rate_hz / size as f64;
        let peaks = spectral_peaks(&power_db, noise_floor_db + PEAK_ABOVE_FLOOR_DB);
        let peak_frequencies_hz: Vec<f64> = peaks
            .iter()
            .take(MAX_REPORTED_PEAKS)
            .map(|&(bin, _)| chunk.center_freq_hz + (bin as f64 - (size / 2) as f64) * bin_width)
            .collect();

        let peak_power_db = power_db
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max)
            .max(noise_floor_db);
        let snr_db = (peak_power_db - noise_floor_db) as f64;
        // Total in-band power, so broadband emitters report their true
        // strength rather than one bin's worth.
        let total_power: f32 = power_linear.iter().sum();
        let rssi_dbm = StatsHelper::db(total_power) as f64 + RSSI_CAL_OFFSET_DB;

        // Smoothed amplitude envelope drives burst segmentation.
        let envelope_db = smoothed_envelope_db(&chunk.samples);
        let envelope_floor = StatsHelper::median(&envelope_db);
        let bursts = detect_bursts(
            &envelope_db,
            envelope_floor + BURST_ENTER_DB,
            envelope_floor + BURST_EXIT_DB,
            MIN_BURST_SAMPLES,
        );

        let burst_timing: Vec<f64> = bursts
            .iter()
            .map(|b| b.start as f64 / chunk.sample_rate_hz)
            .collect();
        let burst_durations: Vec<f64> = bursts
            .iter()
            .map(|b| b.len as f64 / chunk.sample_rate_hz)
            .collect();
        let inter_burst_intervals: Vec<f64> = burst_timing
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect();

        let (modulation, frequency_deviation_hz) =
            estimate_modulation(&chunk.samples, chunk.sample_rate_hz);

        let bandwidth_hz = occupied_bandwidth(&power_linear, bin_width);

        let features = SignalFeatures {
            timestamp: chunk.timestamp,
            center_freq_hz: chunk.center_freq_hz,
            power_spectrum_db: power_db,
            burst_count: burst_timing.len(),
            burst_timing,
            burst_durations,
            inter_burst_intervals,
            modulation,
            frequency_deviation_hz,
            bandwidth_hz,
            snr_db,
            rssi_dbm,
            peak_frequencies_hz,
        };
        features.validate()?;
        Ok(features)
    }
}

/// Local maxima above the threshold, strongest first.
fn spectral_peaks(power_db: &[f32], threshold_db: f32) -> Vec<(usize, f32)> {
    let mut peaks = Vec::new();
    for i in 1..power_db.len().saturating_sub(1) {
        let level = power_db[i];
        if level > threshold_db && level > power_db[i - 1] && level >= power_db[i + 1] {
            peaks.push((i, level));
        }
    }
    peaks.sort_by(|a, b| b.1.total_cmp(&a.1));
    peaks
}

/// Instantaneous power smoothed with a trailing moving average, in dB.
fn smoothed_envelope_db(samples: &[num_complex::Complex32]) -> Vec<f32> {
    let window = ENVELOPE_SMOOTHING.min(samples.len().max(1));
    let mut envelope = Vec::with_capacity(samples.len());
    let mut acc = 0.0_f32;
    for (i, sample) in samples.iter().enumerate() {
        acc += sample.norm_sqr();
        if i >= window {
            acc -= samples[i - window].norm_sqr();
        }
        let len = (i + 1).min(window) as f32;
        envelope.push(StatsHelper::db(acc.max(0.0) / len));
    }
    envelope
}

/// Carrier-to-peak amplitude ratio below which a sample is treated as
/// dead air for the modulation estimate.
const ACTIVE_AMPLITUDE_RATIO: f32 = 0.1;

/// Frequency spread versus envelope stability over the active samples.
/// Large frequency excursion with a stable envelope reads as FSK; a stable
/// carrier that is keyed on and off (or amplitude modulated) reads as ASK.
/// Activity is gated on raw sample amplitude so inter-burst noise never
/// pollutes the phase statistics.
fn estimate_modulation(
    samples: &[num_complex::Complex32],
    sample_rate_hz: f64,
) -> (Modulation, f64) {
    let max_amp = samples.iter().map(|s| s.norm()).fold(0.0_f32, f32::max);
    if max_amp <= f32::EPSILON {
        return (Modulation::Unknown, 0.0);
    }
    let gate = max_amp * ACTIVE_AMPLITUDE_RATIO;
    let active: Vec<usize> = samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.norm() >= gate)
        .map(|(idx, _)| idx)
        .collect();
    if active.len() < 2 {
        return (Modulation::Unknown, 0.0);
    }

    // Instantaneous frequency from consecutive-sample phase differences,
    // median filtered to suppress noise spikes.
    let mut inst_freq = Vec::with_capacity(active.len());
    for pair in active.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        if cur != prev + 1 {
            continue; // burst boundary
        }
        let rotation = samples[cur] * samples[prev].conj();
        if rotation.norm_sqr() <= f32::EPSILON {
            continue;
        }
        inst_freq.push(rotation.arg() as f64 * sample_rate_hz / TAU);
    }
    if inst_freq.len() < 2 {
        return (Modulation::Unknown, 0.0);
    }
    let filtered = median_filter(&inst_freq, 5);
    let max_f = filtered.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_f = filtered.iter().copied().fold(f64::INFINITY, f64::min);
    let deviation = (max_f - min_f) / 2.0;

    let amplitudes: Vec<f64> = active
        .iter()
        .map(|&idx| samples[idx].norm() as f64)
        .collect();
    let mean_amp = amplitudes.iter().sum::<f64>() / amplitudes.len() as f64;
    if mean_amp <= f64::EPSILON {
        return (Modulation::Unknown, 0.0);
    }
    let var_amp = amplitudes
        .iter()
        .map(|&a| (a - mean_amp) * (a - mean_amp))
        .sum::<f64>()
        / amplitudes.len() as f64;
    let amp_cv = var_amp.sqrt() / mean_amp;

    // Carrier duty cycle within the transmission extent.
    let first = active[0];
    let last = *active.last().unwrap_or(&first);
    let extent_len = last - first + 1;
    let off_fraction = 1.0 - active.len() as f64 / extent_len as f64;

    let modulation = if deviation > FSK_MIN_DEVIATION_HZ && amp_cv < AMP_STABLE_CV {
        Modulation::Fsk
    } else if deviation <= FSK_MIN_DEVIATION_HZ && (off_fraction > 0.2 || amp_cv > AMP_STABLE_CV) {
        Modulation::Ask
    } else {
        Modulation::Unknown
    };

    (modulation, deviation)
}

fn median_filter(values: &[f64], window: usize) -> Vec<f64> {
    if values.len() <= window {
        return values.to_vec();
    }
    let half = window / 2;
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(values.len());
        let mut slice = values[lo..hi].to_vec();
        slice.sort_by(|a, b| a.total_cmp(b));
        out.push(slice[slice.len() / 2]);
    }
    out
}

/// Width of the smallest frequency span holding `OBW_ENERGY_FRACTION` of
/// the total spectral energy, trimming equal tails from both ends.
fn occupied_bandwidth(power_linear: &[f32], bin_width: f64) -> f64 {
    let total: f64 = power_linear.iter().map(|&p| p as f64).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let tail = total * (1.0 - OBW_ENERGY_FRACTION) / 2.0;

    let mut acc = 0.0_f64;
    let mut low = 0usize;
    for (i, &p) in power_linear.iter().enumerate() {
        acc += p as f64;
        if acc >= tail {
            low = i;
            break;
        }
    }
    let mut acc = 0.0_f64;
    let mut high = power_linear.len() - 1;
    for (i, &p) in power_linear.iter().enumerate().rev() {
        acc += p as f64;
        if acc >= tail {
            high = i;
            break;
        }
    }
    ((high.saturating_sub(low)).max(1)) as f64 * bin_width
}
