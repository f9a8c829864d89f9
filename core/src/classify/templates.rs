use crate::features::Modulation;
use serde::{Deserialize, Serialize};

/// Signal categories the classifier can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    KeyFob,
    Tpms,
    Unknown,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::KeyFob => "key_fob",
            SignalType::Tpms => "tpms",
            SignalType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusive acceptance range for one measured quantity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Range {
    pub lo: f64,
    pub hi: f64,
}

impl Range {
    pub const fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.lo..=self.hi).contains(&value)
    }

    /// 1.0 at the center of the range, falling linearly to 0.0 at the
    /// edges; 0.0 outside.
    pub fn centered_score(&self, value: f64) -> f64 {
        if !self.contains(value) {
            return 0.0;
        }
        let half = (self.hi - self.lo) / 2.0;
        if half <= 0.0 {
            return 1.0;
        }
        let mid = (self.hi + self.lo) / 2.0;
        (1.0 - (value - mid).abs() / half).clamp(0.0, 1.0)
    }
}

/// Acceptance ranges describing one known automotive transmitter.
#[derive(Debug, Clone)]
pub struct SignalTemplate {
    pub signal_type: SignalType,
    pub modulation: Modulation,
    pub burst_count: Range,
    /// Each inter-burst interval must fall here; `None` skips the check
    /// (single-burst transmitters).
    pub interval_secs: Option<Range>,
    /// Each burst duration must fall here; `None` skips the check.
    pub burst_duration_secs: Option<Range>,
    pub deviation_hz: Range,
    pub bandwidth_hz: Range,
}

/// Remote keyless entry fob: FSK, 3-8 bursts spaced 10-20 ms apart,
/// 20-50 kHz deviation inside a 20-80 kHz channel.
pub fn key_fob() -> SignalTemplate {
    SignalTemplate {
        signal_type: SignalType::KeyFob,
        modulation: Modulation::Fsk,
        burst_count: Range::new(3.0, 8.0),
        interval_secs: Some(Range::new(0.010, 0.020)),
        burst_duration_secs: None,
        deviation_hz: Range::new(20_000.0, 50_000.0),
        bandwidth_hz: Range::new(20_000.0, 80_000.0),
    }
}

/// Tire-pressure sensor: FSK, 1-3 bursts of 5-15 ms, 10-30 kHz deviation
/// inside a 10-40 kHz channel.
pub fn tpms() -> SignalTemplate {
    SignalTemplate {
        signal_type: SignalType::Tpms,
        modulation: Modulation::Fsk,
        burst_count: Range::new(1.0, 3.0),
        interval_secs: None,
        burst_duration_secs: Some(Range::new(0.005, 0.015)),
        deviation_hz: Range::new(10_000.0, 30_000.0),
        bandwidth_hz: Range::new(10_000.0, 40_000.0),
    }
}

pub fn all() -> Vec<SignalTemplate> {
    vec![key_fob(), tpms()]
}
