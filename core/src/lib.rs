//! Signal-analysis and threat-detection core for the RKE spectrum
//! sentinel.
//!
//! The modules follow the capture path: `acquisition` hands chunks of
//! complex baseband samples to the `features` extractor, `classify`
//! matches the resulting records against known automotive transmitters,
//! and `threat` grades each detection against the shared `history`
//! ledger. `correlation` runs on the proximity peer and links RF threats
//! to NFC taps.

pub mod acquisition;
pub mod classify;
pub mod correlation;
pub mod features;
pub mod history;
pub mod math;
pub mod prelude;
pub mod telemetry;
pub mod threat;

pub use prelude::{PipelineConfig, PipelineError, PipelineResult};
