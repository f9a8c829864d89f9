use log::info;
use rkecore::correlation::{Indicator, IndicatorPort};

/// Indicator backend for peers without attached LEDs: state changes go to
/// the log and return immediately.
#[derive(Default)]
pub struct LogIndicator;

impl IndicatorPort for LogIndicator {
    fn set_indicator(&self, indicator: Indicator, on: bool) {
        info!(
            "indicator {} -> {}",
            indicator.as_str(),
            if on { "on" } else { "off" }
        );
    }
}
