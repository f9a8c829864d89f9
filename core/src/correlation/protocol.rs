use crate::threat::ThreatEvent;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Proximity detection reported by the peer's NFC front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NfcDetection {
    pub timestamp: f64,
    /// Tag UID as hex byte strings.
    pub uid: Vec<String>,
    pub uid_length: usize,
    pub detection_context: String,
}

impl NfcDetection {
    pub fn from_uid(uid_bytes: &[u8], timestamp: f64, detection_context: &str) -> Self {
        let uid: Vec<String> = uid_bytes.iter().map(|b| format!("{b:02x}")).collect();
        Self {
            timestamp,
            uid_length: uid.len(),
            uid,
            detection_context: detection_context.to_string(),
        }
    }

    fn to_wire(&self) -> Value {
        json!({
            "type": "nfc_detection",
            "timestamp": self.timestamp,
            "uid": self.uid,
            "uid_length": self.uid_length,
            "detection_context": self.detection_context,
        })
    }
}

/// Messages the peer sends back to the central monitor.
#[derive(Debug, Clone)]
pub enum PeerMessage {
    CorrelationActivated {
        timestamp: f64,
        detection_count: u32,
        threat_types: Vec<String>,
    },
    CorrelatedSecurityEvent {
        timestamp: f64,
        rf_threat: Box<ThreatEvent>,
        nfc_detection: NfcDetection,
    },
    CorrelationTimeout {
        timestamp: f64,
    },
    ProximityDetection(NfcDetection),
}

impl PeerMessage {
    /// Exact wire shape expected by the central system.
    pub fn to_wire(&self) -> Value {
        match self {
            PeerMessage::CorrelationActivated {
                timestamp,
                detection_count,
                threat_types,
            } => json!({
                "type": "nfc_correlation_activated",
                "timestamp": timestamp,
                "detection_count": detection_count,
                "threat_types": threat_types,
            }),
            PeerMessage::CorrelatedSecurityEvent {
                timestamp,
                rf_threat,
                nfc_detection,
            } => json!({
                "type": "correlated_security_event",
                "timestamp": timestamp,
                "rf_threat": {
                    "event_id": rf_threat.event_id,
                    "timestamp": rf_threat.timestamp,
                    "event_type": rf_threat.event_type,
                    "threat_level": rf_threat.threat_level,
                    "confidence": rf_threat.confidence,
                    "recommended_action": rf_threat.recommended_action,
                },
                "nfc_detection": nfc_detection.to_wire(),
                "correlation_type": "rf_nfc_proximity",
                "threat_escalation": "high_confidence_attack",
            }),
            PeerMessage::CorrelationTimeout { timestamp } => json!({
                "type": "nfc_correlation_timeout",
                "timestamp": timestamp,
                "reason": "timeout",
            }),
            PeerMessage::ProximityDetection(detection) => detection.to_wire(),
        }
    }
}
