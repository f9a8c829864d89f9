use crate::classify::{DetectedSignal, SignalType};
use crate::history::SignalHistory;
use crate::telemetry::{LogManager, PipelineMetrics};
use crate::threat::{
    BruteForceDetector, JammingDetector, ReplayDetector, ThreatDetector, ThreatEvent,
    ThreatEventType, ThreatIndication,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Runs the detectors in fixed priority order over each classified signal
/// and turns the first indication into a `ThreatEvent`. Every analyzed
/// signal produces exactly one event; afterwards the signal is added to
/// the shared history so it can never match itself.
pub struct ThreatEngine {
    history: Arc<SignalHistory>,
    detectors: Vec<Box<dyn ThreatDetector>>,
    metrics: Arc<PipelineMetrics>,
    logger: LogManager,
}

impl ThreatEngine {
    pub fn new(history: Arc<SignalHistory>, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            history,
            // Priority order: replay outranks jamming outranks brute force.
            detectors: vec![
                Box::new(ReplayDetector),
                Box::new(JammingDetector),
                Box::new(BruteForceDetector),
            ],
            metrics,
            logger: LogManager::new(),
        }
    }

    pub fn history(&self) -> &Arc<SignalHistory> {
        &self.history
    }

    /// Picks the strongest candidate when overlapping template matches
    /// exist, then analyzes it. Falls back to an unclassified wrapper when
    /// the classifier produced nothing.
    pub fn resolve(&self, mut candidates: Vec<DetectedSignal>) -> Option<ThreatEvent> {
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates.into_iter().next().map(|best| self.analyze(&best))
    }

    pub fn analyze(&self, signal: &DetectedSignal) -> ThreatEvent {
        let mut indication: Option<ThreatIndication> = None;
        let mut failures: Vec<(&'static str, String)> = Vec::new();

        for detector in &self.detectors {
            match detector.evaluate(signal, &self.history) {
                Ok(Some(found)) => {
                    indication = Some(found);
                    break;
                }
                Ok(None) => {}
                Err(err) => {
                    // One failing detector never silences the others.
                    self.metrics.record_detector_error();
                    self.logger
                        .warn(&format!("{} detector failed: {err}", detector.name()));
                    failures.push((detector.name(), err.to_string()));
                }
            }
        }

        let indication = indication.unwrap_or_else(|| no_threat(signal, &failures));
        let event = ThreatEvent {
            event_id: Uuid::new_v4(),
            timestamp: signal.timestamp,
            event_type: indication.event_type,
            threat_level: indication.threat_level,
            confidence: indication.confidence,
            signal_features: signal.features.clone(),
            evidence: indication.evidence,
            recommended_action: indication.recommended_action,
        };

        self.history.insert(signal);
        self.metrics.record_threat();
        self.logger.record(&format!(
            "threat event {} level {:.2}",
            event.event_type.as_str(),
            event.threat_level
        ));
        event
    }
}

/// Classification when no detector fired. Recognized transmitters report
/// as routine traffic; anything the detectors could not evaluate degrades
/// to `unknown` with the failures on record.
fn no_threat(signal: &DetectedSignal, failures: &[(&'static str, String)]) -> ThreatIndication {
    if !failures.is_empty() {
        let mut evidence = BTreeMap::new();
        evidence.insert(
            "detector_failures".into(),
            json!(failures
                .iter()
                .map(|(name, message)| json!({"detector": name, "error": message}))
                .collect::<Vec<_>>()),
        );
        return ThreatIndication {
            event_type: ThreatEventType::Unknown,
            threat_level: 0.2,
            confidence: 0.0,
            evidence,
            recommended_action: "Signal could not be fully evaluated; review detector logs.".into(),
        };
    }

    let mut evidence = BTreeMap::new();
    evidence.insert(
        "classifier_confidence".into(),
        json!(signal.confidence),
    );
    match signal.signal_type {
        SignalType::KeyFob => ThreatIndication {
            event_type: ThreatEventType::KeyFobTransmission,
            threat_level: 0.1,
            confidence: signal.confidence,
            evidence,
            recommended_action: "Routine key-fob transmission; no action required.".into(),
        },
        SignalType::Tpms => ThreatIndication {
            event_type: ThreatEventType::Benign,
            threat_level: 0.05,
            confidence: signal.confidence,
            evidence,
            recommended_action: "Routine tire-pressure telemetry; no action required.".into(),
        },
        SignalType::Unknown => ThreatIndication {
            event_type: ThreatEventType::Unknown,
            threat_level: 0.2,
            confidence: signal.confidence,
            evidence,
            recommended_action: "Unrecognized emission; continue monitoring.".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Modulation, SignalFeatures};

    fn engine() -> ThreatEngine {
        ThreatEngine::new(
            Arc::new(SignalHistory::with_defaults()),
            Arc::new(PipelineMetrics::new()),
        )
    }

    fn fob_detection(timestamp: f64, spectrum_seed: u32) -> DetectedSignal {
        DetectedSignal {
            signal_type: SignalType::KeyFob,
            confidence: 0.85,
            timestamp,
            features: SignalFeatures {
                timestamp,
                center_freq_hz: 433.92e6,
                power_spectrum_db: (0..128)
                    .map(|i| -90.0 + ((i * 37 + spectrum_seed * 13) % 50) as f32)
                    .collect(),
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

    #[test]
    fn clean_key_fob_reports_as_transmission() {
        let engine = engine();
        let event = engine.analyze(&fob_detection(100.0, 1));
        assert_eq!(event.event_type, ThreatEventType::KeyFobTransmission);
        assert!(event.threat_level < 0.5);
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn replayed_key_fob_outranks_everything() {
        let engine = engine();
        engine.analyze(&fob_detection(100.0, 7));
        let event = engine.analyze(&fob_detection(160.0, 7));
        assert_eq!(event.event_type, ThreatEventType::ReplayAttack);
        assert!(event.confidence >= 0.95);
    }

    #[test]
    fn replay_outside_window_is_not_flagged() {
        let engine = engine();
        engine.analyze(&fob_detection(100.0, 8));
        let event = engine.analyze(&fob_detection(500.0, 8));
        assert_eq!(event.event_type, ThreatEventType::KeyFobTransmission);
    }

    #[test]
    fn rapid_repeats_become_brute_force() {
        let engine = engine();
        // Sub-second spacing keeps the replay window (>= 1 s delta) shut.
        for i in 0..10 {
            engine.analyze(&fob_detection(100.0 + i as f64 * 0.5, i));
        }
        let event = engine.analyze(&fob_detection(105.0, 42));
        assert_eq!(event.event_type, ThreatEventType::BruteForceAttack);
    }

    #[test]
    fn ten_per_minute_stays_benign() {
        let engine = engine();
        for i in 0..9 {
            engine.analyze(&fob_detection(100.0 + i as f64 * 0.5, i));
        }
        let event = engine.analyze(&fob_detection(104.5, 42));
        assert_eq!(event.event_type, ThreatEventType::KeyFobTransmission);
    }

    #[test]
    fn detector_failure_degrades_to_unknown_with_evidence() {
        let engine = engine();
        let mut broken = fob_detection(100.0, 3);
        broken.features.burst_count = 9; // violates the timing invariant
        let event = engine.analyze(&broken);
        assert_eq!(event.event_type, ThreatEventType::Unknown);
        assert!(event.evidence.contains_key("detector_failures"));
    }

    #[test]
    fn resolve_prefers_the_strongest_candidate() {
        let engine = engine();
        let mut weak = fob_detection(100.0, 2);
        weak.signal_type = SignalType::Tpms;
        weak.confidence = 0.62;
        let strong = fob_detection(100.0, 2);
        let event = engine.resolve(vec![weak, strong]).unwrap();
        assert_eq!(event.event_type, ThreatEventType::KeyFobTransmission);
    }

    #[test]
    fn every_analyzed_signal_produces_exactly_one_event() {
        let engine = engine();
        let unknown = DetectedSignal::unclassified(fob_detection(10.0, 1).features);
        let event = engine.analyze(&unknown);
        assert_eq!(event.event_type, ThreatEventType::Unknown);
    }
}
