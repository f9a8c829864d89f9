use crate::classify::{DetectedSignal, SignalType};
use crate::history::{SignalHistory, StoredSignal};
use crate::math::StatsHelper;
use crate::prelude::PipelineResult;
use crate::threat::{ThreatDetector, ThreatEventType, ThreatIndication};
use serde_json::json;
use std::collections::BTreeMap;

/// Similarity at or above this counts as a retransmission.
const SIMILARITY_THRESHOLD: f64 = 0.95;
/// Characteristic replay window: attackers retransmit between one second
/// and five minutes after capture.
const MIN_DELTA_SECS: f64 = 1.0;
const MAX_DELTA_SECS: f64 = 300.0;
/// Spectrum/timing weighting for the similarity score.
const SPECTRUM_WEIGHT: f64 = 0.70;
const TIMING_WEIGHT: f64 = 0.30;

/// Flags signals that are near-identical copies of a recent detection of
/// the same type.
pub struct ReplayDetector;

impl ThreatDetector for ReplayDetector {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn evaluate(
        &self,
        signal: &DetectedSignal,
        history: &SignalHistory,
    ) -> PipelineResult<Option<ThreatIndication>> {
        signal.features.validate()?;
        // Replays only make sense for recognized transmitter types.
        if signal.signal_type == SignalType::Unknown {
            return Ok(None);
        }

        let candidates =
            history.recent_of_type(signal.signal_type, signal.timestamp, MAX_DELTA_SECS);

        let mut best: Option<(f64, &StoredSignal)> = None;
        for candidate in &candidates {
            if candidate.replay_consumed {
                continue;
            }
            let delta = signal.timestamp - candidate.timestamp;
            if !(MIN_DELTA_SECS..=MAX_DELTA_SECS).contains(&delta) {
                continue;
            }
            let similarity = similarity(signal, candidate);
            if similarity >= SIMILARITY_THRESHOLD
                && best.is_none_or(|(best_sim, _)| similarity > best_sim)
            {
                best = Some((similarity, candidate));
            }
        }

        let Some((similarity, original)) = best else {
            return Ok(None);
        };
        history.mark_replay_consumed(original.id);

        let delta = signal.timestamp - original.timestamp;
        let mut evidence = BTreeMap::new();
        evidence.insert("original_timestamp".into(), json!(original.timestamp));
        evidence.insert("replay_timestamp".into(), json!(signal.timestamp));
        evidence.insert("similarity".into(), json!(similarity));
        evidence.insert("time_delta_secs".into(), json!(delta));
        evidence.insert("signal_type".into(), json!(signal.signal_type.as_str()));

        Ok(Some(ThreatIndication {
            event_type: ThreatEventType::ReplayAttack,
            threat_level: similarity,
            confidence: similarity,
            evidence,
            recommended_action:
                "Treat unlock events in this window as hostile; verify vehicle access logs and rotate credentials."
                    .into(),
        }))
    }
}

/// Weighted combination of power-spectrum correlation and burst-timing
/// similarity.
fn similarity(signal: &DetectedSignal, candidate: &StoredSignal) -> f64 {
    let spectrum = StatsHelper::pearson(
        &signal.features.power_spectrum_db,
        &candidate.power_spectrum_db,
    )
    .max(0.0) as f64;
    let timing = timing_similarity(
        &signal.features.inter_burst_intervals,
        &candidate.inter_burst_intervals,
    );
    SPECTRUM_WEIGHT * spectrum + TIMING_WEIGHT * timing
}

/// One minus the mean relative gap disagreement. Pearson is the wrong tool
/// here: identical burst trains have zero interval variance.
fn timing_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut disagreement = 0.0;
    let mut scale = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        disagreement += (x - y).abs();
        scale += x.max(y);
    }
    if scale <= 0.0 {
        return 1.0;
    }
    (1.0 - disagreement / scale).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Modulation, SignalFeatures};

    fn fob_detection(timestamp: f64, spectrum: Vec<f32>) -> DetectedSignal {
        DetectedSignal {
            signal_type: SignalType::KeyFob,
            confidence: 0.85,
            timestamp,
            features: SignalFeatures {
                timestamp,
                center_freq_hz: 433.92e6,
                power_spectrum_db: spectrum,
                burst_timing: vec![0.005, 0.020, 0.035, 0.050],
                burst_durations: vec![0.003; 4],
                inter_burst_intervals: vec![0.015; 3],
                burst_count: 4,
                modulation: Modulation::Fsk,
                frequency_deviation_hz: 35_000.0,
                bandwidth_hz: 50_000.0,
                snr_db: 30.0,
                rssi_dbm: -40.0,
                peak_frequencies_hz: vec![433.955e6],
            },
        }
    }

    fn varied_spectrum(seed: u32) -> Vec<f32> {
        (0..128)
            .map(|i| -90.0 + ((i * 37 + seed * 13) % 50) as f32)
            .collect()
    }

    #[test]
    fn identical_signal_within_window_is_a_replay() {
        let history = SignalHistory::with_defaults();
        let spectrum = varied_spectrum(1);
        history.insert(&fob_detection(1000.0, spectrum.clone()));

        let replayed = fob_detection(1060.0, spectrum);
        let indication = ReplayDetector
            .evaluate(&replayed, &history)
            .unwrap()
            .expect("replay should fire");
        assert_eq!(indication.event_type, ThreatEventType::ReplayAttack);
        assert!(indication.confidence >= 0.95);
        assert_eq!(indication.evidence["time_delta_secs"], 60.0);
    }

    #[test]
    fn outside_the_window_is_not_a_replay() {
        let history = SignalHistory::with_defaults();
        let spectrum = varied_spectrum(2);
        history.insert(&fob_detection(1000.0, spectrum.clone()));

        let late = fob_detection(1400.0, spectrum);
        assert!(ReplayDetector.evaluate(&late, &history).unwrap().is_none());
    }

    #[test]
    fn consumed_original_cannot_fire_twice() {
        let history = SignalHistory::with_defaults();
        let spectrum = varied_spectrum(3);
        history.insert(&fob_detection(1000.0, spectrum.clone()));

        let first = fob_detection(1030.0, spectrum.clone());
        assert!(ReplayDetector.evaluate(&first, &history).unwrap().is_some());

        // The original is now consumed and nothing else is in range.
        let second = fob_detection(1090.0, spectrum);
        assert!(ReplayDetector
            .evaluate(&second, &history)
            .unwrap()
            .is_none());
    }

    #[test]
    fn dissimilar_spectra_do_not_match() {
        let history = SignalHistory::with_defaults();
        history.insert(&fob_detection(1000.0, varied_spectrum(4)));

        let mut other = fob_detection(1060.0, varied_spectrum(9));
        other.features.inter_burst_intervals = vec![0.012, 0.018, 0.011];
        assert!(ReplayDetector.evaluate(&other, &history).unwrap().is_none());
    }

    #[test]
    fn malformed_features_are_a_detector_error() {
        let history = SignalHistory::with_defaults();
        let mut broken = fob_detection(1000.0, varied_spectrum(5));
        broken.features.burst_count = 7;
        assert!(ReplayDetector.evaluate(&broken, &history).is_err());
    }
}
