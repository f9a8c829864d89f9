use log::warn;
use rkecore::prelude::{PipelineError, PipelineResult};
use serde_json::Value;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Delivers correlation messages to the central monitor. Delivery is
/// best-effort: after the bounded retry sequence the message is dropped
/// with a warning, and peer-local state has already transitioned.
pub struct Uplink {
    client: reqwest::Client,
    url: String,
}

impl Uplink {
    pub fn new(monitor_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/correlation", monitor_url.trim_end_matches('/')),
        }
    }

    pub async fn send(&self, body: &Value) -> PipelineResult<()> {
        let mut backoff = INITIAL_BACKOFF;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.client.post(&self.url).json(body).send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    warn!(
                        "uplink attempt {attempt}/{MAX_ATTEMPTS} rejected: {}",
                        response.status()
                    );
                }
                Err(err) => {
                    warn!("uplink attempt {attempt}/{MAX_ATTEMPTS} failed: {err}");
                }
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
        Err(PipelineError::PeerLinkLost(self.url.clone()))
    }
}
