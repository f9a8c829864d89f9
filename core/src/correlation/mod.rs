pub mod machine;
pub mod protocol;

pub use machine::{CorrelationMachine, CorrelationMode, ARM_THRESHOLD};
pub use protocol::{NfcDetection, PeerMessage};

/// Physical indicators on the proximity peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Scan,
    Alert,
}

impl Indicator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Indicator::Scan => "scan",
            Indicator::Alert => "alert",
        }
    }
}

/// Fire-and-forget control of the peer's indicators. Implementations must
/// not block the state machine.
pub trait IndicatorPort: Send + Sync {
    fn set_indicator(&self, indicator: Indicator, on: bool);
}
