use crate::classify::{DetectedSignal, SignalType};
use crate::history::SignalHistory;
use crate::prelude::PipelineResult;
use crate::threat::{ThreatDetector, ThreatEventType, ThreatIndication};
use serde_json::json;
use std::collections::BTreeMap;

/// More than this many same-type transmissions per window is an attack.
const RATE_THRESHOLD: usize = 10;
const WINDOW_SECS: f64 = 60.0;

/// Flags rapid repeated transmissions of one transmitter type, the
/// signature of code-space guessing.
pub struct BruteForceDetector;

impl ThreatDetector for BruteForceDetector {
    fn name(&self) -> &'static str {
        "brute_force"
    }

    fn evaluate(
        &self,
        signal: &DetectedSignal,
        history: &SignalHistory,
    ) -> PipelineResult<Option<ThreatIndication>> {
        signal.features.validate()?;
        // Rate counting only means something for recognized types.
        if signal.signal_type == SignalType::Unknown {
            return Ok(None);
        }

        let window = history.recent_of_type(signal.signal_type, signal.timestamp, WINDOW_SECS);
        let count = window.len() + 1; // include the signal under analysis
        if count <= RATE_THRESHOLD {
            return Ok(None);
        }

        let confidence =
            ((count - RATE_THRESHOLD) as f64 / RATE_THRESHOLD as f64).clamp(0.0, 1.0);
        let threat_level = (0.6 + 0.4 * confidence).min(1.0);

        let mut evidence = BTreeMap::new();
        evidence.insert("signal_type".into(), json!(signal.signal_type.as_str()));
        evidence.insert("rate_per_minute".into(), json!(count));
        evidence.insert("rate_threshold".into(), json!(RATE_THRESHOLD));
        evidence.insert(
            "window_start".into(),
            json!(signal.timestamp - WINDOW_SECS),
        );
        evidence.insert("window_end".into(), json!(signal.timestamp));

        Ok(Some(ThreatIndication {
            event_type: ThreatEventType::BruteForceAttack,
            threat_level,
            confidence,
            evidence,
            recommended_action:
                "Rolling-code exhaustion in progress; move the vehicle out of range and alert the owner."
                    .into(),
        }))
    }
}
