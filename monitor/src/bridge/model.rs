use rkecore::telemetry::MetricsSnapshot;
use rkecore::threat::ThreatEvent;
use serde::Serialize;

/// How many recent items the dashboard state retains.
const RETAINED_ITEMS: usize = 100;

/// State served to the dashboard collaborator and the polling peer.
#[derive(Debug, Clone, Serialize, Default)]
pub struct DashboardModel {
    pub events: Vec<ThreatEvent>,
    pub correlation_messages: Vec<serde_json::Value>,
    pub source_status: String,
    pub metrics: MetricsSnapshot,
}

impl DashboardModel {
    pub fn push_event(&mut self, event: ThreatEvent) {
        self.events.push(event);
        if self.events.len() > RETAINED_ITEMS {
            self.events.remove(0);
        }
    }

    pub fn push_correlation(&mut self, message: serde_json::Value) {
        self.correlation_messages.push(message);
        if self.correlation_messages.len() > RETAINED_ITEMS {
            self.correlation_messages.remove(0);
        }
    }
}
