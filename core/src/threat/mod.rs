pub mod brute_force;
pub mod engine;
pub mod jamming;
pub mod replay;

pub use brute_force::BruteForceDetector;
pub use engine::ThreatEngine;
pub use jamming::{JammingDetector, JammingPattern};
pub use replay::ReplayDetector;

use crate::classify::DetectedSignal;
use crate::features::SignalFeatures;
use crate::history::SignalHistory;
use crate::prelude::PipelineResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Final classification of one analyzed signal. Closed set so an
/// unhandled variant is a build error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatEventType {
    KeyFobTransmission,
    ReplayAttack,
    JammingAttack,
    BruteForceAttack,
    Benign,
    Unknown,
}

impl ThreatEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatEventType::KeyFobTransmission => "key_fob_transmission",
            ThreatEventType::ReplayAttack => "replay_attack",
            ThreatEventType::JammingAttack => "jamming_attack",
            ThreatEventType::BruteForceAttack => "brute_force_attack",
            ThreatEventType::Benign => "benign",
            ThreatEventType::Unknown => "unknown",
        }
    }
}

/// Coarse severity grading derived from confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatClass {
    Benign,
    Suspicious,
    Malicious,
}

impl ThreatClass {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.90 {
            ThreatClass::Malicious
        } else if confidence > 0.70 {
            ThreatClass::Suspicious
        } else {
            ThreatClass::Benign
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatClass::Benign => "benign",
            ThreatClass::Suspicious => "suspicious",
            ThreatClass::Malicious => "malicious",
        }
    }
}

/// Message emitted once per analyzed signal; never stored or mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatEvent {
    pub event_id: Uuid,
    pub timestamp: f64,
    pub event_type: ThreatEventType,
    pub threat_level: f64,
    pub confidence: f64,
    pub signal_features: SignalFeatures,
    /// Free-form technical proof backing the classification.
    pub evidence: BTreeMap<String, serde_json::Value>,
    pub recommended_action: String,
}

/// What a detector reports when it fires.
#[derive(Debug, Clone)]
pub struct ThreatIndication {
    pub event_type: ThreatEventType,
    pub threat_level: f64,
    pub confidence: f64,
    pub evidence: BTreeMap<String, serde_json::Value>,
    pub recommended_action: String,
}

/// One rule-based detector consulted by the engine in priority order.
/// A detector may decline (`Ok(None)`) or fail; failures are isolated by
/// the engine and never abort the other detectors.
pub trait ThreatDetector: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(
        &self,
        signal: &DetectedSignal,
        history: &SignalHistory,
    ) -> PipelineResult<Option<ThreatIndication>>;
}
