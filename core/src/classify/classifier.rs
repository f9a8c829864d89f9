use crate::classify::templates::{self, SignalTemplate, SignalType};
use crate::features::SignalFeatures;
use serde::{Deserialize, Serialize};

/// Candidates below this confidence are not emitted.
pub const MIN_CONFIDENCE: f64 = 0.6;

/// Confidence term weights. Modulation match contributes its full weight
/// once the template gate passes; the remaining terms are scored by how
/// centered the measurement sits in its accepted range.
const W_MODULATION: f64 = 0.30;
const W_BURST_PATTERN: f64 = 0.25;
const W_TIMING: f64 = 0.20;
const W_DEVIATION: f64 = 0.15;
const W_QUALITY: f64 = 0.10;

/// SNR at or above this scores full signal quality.
const FULL_QUALITY_SNR_DB: f64 = 20.0;

/// One classification result. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedSignal {
    pub signal_type: SignalType,
    pub confidence: f64,
    pub features: SignalFeatures,
    pub timestamp: f64,
}

impl DetectedSignal {
    /// Wraps features that matched no template, so the threat engine still
    /// sees every analyzed chunk.
    pub fn unclassified(features: SignalFeatures) -> Self {
        let timestamp = features.timestamp;
        Self {
            signal_type: SignalType::Unknown,
            confidence: 0.0,
            features,
            timestamp,
        }
    }
}

/// Matches feature records against the known transmitter templates.
/// Stateless; safe to call from any number of workers.
pub struct PatternClassifier {
    templates: Vec<SignalTemplate>,
}

impl PatternClassifier {
    pub fn new() -> Self {
        Self {
            templates: templates::all(),
        }
    }

    /// Returns zero or more candidates. A chunk may hold no automotive
    /// signal, or overlapping transmissions matching more than one type;
    /// precedence between candidates is the threat engine's job.
    pub fn classify(&self, features: &SignalFeatures) -> Vec<DetectedSignal> {
        self.templates
            .iter()
            .filter_map(|template| {
                score(template, features).map(|confidence| DetectedSignal {
                    signal_type: template.signal_type,
                    confidence,
                    features: features.clone(),
                    timestamp: features.timestamp,
                })
            })
            .collect()
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// All template conditions gate acceptance; the weighted centered scores
/// then grade how prototypical the match is.
fn score(template: &SignalTemplate, features: &SignalFeatures) -> Option<f64> {
    if features.modulation != template.modulation {
        return None;
    }
    let burst_count = features.burst_count as f64;
    if !template.burst_count.contains(burst_count) {
        return None;
    }
    if let Some(interval_range) = &template.interval_secs {
        if features.inter_burst_intervals.is_empty()
            || !features
                .inter_burst_intervals
                .iter()
                .all(|&interval| interval_range.contains(interval))
        {
            return None;
        }
    }
    if let Some(duration_range) = &template.burst_duration_secs {
        if features.burst_durations.is_empty()
            || !features
                .burst_durations
                .iter()
                .all(|&duration| duration_range.contains(duration))
        {
            return None;
        }
    }
    if !template.deviation_hz.contains(features.frequency_deviation_hz) {
        return None;
    }
    if !template.bandwidth_hz.contains(features.bandwidth_hz) {
        return None;
    }

    // Timing consistency: mean centered score of the per-gap (or per-burst
    // duration) measurements, whichever the template constrains.
    let timing_term = if let Some(interval_range) = &template.interval_secs {
        mean_centered(&features.inter_burst_intervals, interval_range)
    } else if let Some(duration_range) = &template.burst_duration_secs {
        mean_centered(&features.burst_durations, duration_range)
    } else {
        1.0
    };

    let quality = (features.snr_db / FULL_QUALITY_SNR_DB).clamp(0.0, 1.0);

    let confidence = W_MODULATION
        + W_BURST_PATTERN * template.burst_count.centered_score(burst_count)
        + W_TIMING * timing_term
        + W_DEVIATION * template.deviation_hz.centered_score(features.frequency_deviation_hz)
        + W_QUALITY * quality;
    let confidence = confidence.clamp(0.0, 1.0);

    (confidence >= MIN_CONFIDENCE).then_some(confidence)
}

fn mean_centered(values: &[f64], range: &templates::Range) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| range.centered_score(v)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Modulation;

    fn key_fob_features() -> SignalFeatures {
        SignalFeatures {
            timestamp: 100.0,
            center_freq_hz: 433.92e6,
            power_spectrum_db: vec![-80.0; 64],
            burst_timing: vec![0.005, 0.020, 0.035, 0.050],
            burst_durations: vec![0.003; 4],
            inter_burst_intervals: vec![0.015; 3],
            burst_count: 4,
            modulation: Modulation::Fsk,
            frequency_deviation_hz: 35_000.0,
            bandwidth_hz: 50_000.0,
            snr_db: 30.0,
            rssi_dbm: -40.0,
            peak_frequencies_hz: vec![433.955e6, 433.885e6],
        }
    }

    #[test]
    fn prototypical_key_fob_scores_high() {
        let classifier = PatternClassifier::new();
        let candidates = classifier.classify(&key_fob_features());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].signal_type, SignalType::KeyFob);
        assert!(candidates[0].confidence >= 0.8);
    }

    #[test]
    fn wrong_modulation_is_rejected() {
        let mut features = key_fob_features();
        features.modulation = Modulation::Ask;
        assert!(PatternClassifier::new().classify(&features).is_empty());
    }

    #[test]
    fn out_of_window_interval_is_rejected() {
        let mut features = key_fob_features();
        features.inter_burst_intervals = vec![0.015, 0.015, 0.035];
        assert!(PatternClassifier::new().classify(&features).is_empty());
    }

    #[test]
    fn tpms_frame_matches_tpms_only() {
        let features = SignalFeatures {
            timestamp: 50.0,
            center_freq_hz: 433.92e6,
            power_spectrum_db: vec![-80.0; 64],
            burst_timing: vec![0.010, 0.040],
            burst_durations: vec![0.010, 0.010],
            inter_burst_intervals: vec![0.030],
            burst_count: 2,
            modulation: Modulation::Fsk,
            frequency_deviation_hz: 20_000.0,
            bandwidth_hz: 25_000.0,
            snr_db: 25.0,
            rssi_dbm: -50.0,
            peak_frequencies_hz: vec![433.94e6],
        };
        let candidates = PatternClassifier::new().classify(&features);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].signal_type, SignalType::Tpms);
        assert!(candidates[0].confidence >= MIN_CONFIDENCE);
    }

    #[test]
    fn unclassified_wrapper_keeps_the_timestamp() {
        let features = key_fob_features();
        let wrapped = DetectedSignal::unclassified(features.clone());
        assert_eq!(wrapped.signal_type, SignalType::Unknown);
        assert_eq!(wrapped.timestamp, features.timestamp);
        assert_eq!(wrapped.confidence, 0.0);
    }
}
