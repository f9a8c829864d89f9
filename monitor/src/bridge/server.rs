use crate::bridge::model::DashboardModel;
use crate::generator::{build_chunk, ScenarioConfig};
use crate::pipeline::Pipeline;
use anyhow::Result;
use log::warn;
use rkecore::acquisition::SampleChunk;
use rkecore::threat::ThreatEvent;
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

fn bridge_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9100))
}

#[derive(Debug)]
struct BridgeError;

impl warp::reject::Reject for BridgeError {}

/// Hosts the HTTP surface for the dashboard collaborator and the
/// proximity peer: recent events out, raw chunks and scenario configs in,
/// correlation messages back from the peer.
pub struct MonitorBridge {
    state: Arc<RwLock<DashboardModel>>,
    pipeline: Arc<Pipeline>,
}

impl MonitorBridge {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            state: Arc::new(RwLock::new(DashboardModel::default())),
            pipeline,
        }
    }

    /// Spawns the warp server on its own thread and returns immediately.
    pub fn serve(&self) {
        let state = self.state.clone();
        let pipeline = self.pipeline.clone();
        let state_filter = warp::any().map(move || state.clone());
        let pipeline_filter = warp::any().map(move || pipeline.clone());

        let events_route = warp::path("events")
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: Arc<RwLock<DashboardModel>>| {
                warp::reply::json(&state.read().unwrap().events)
            });

        let status_route = warp::path("status")
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: Arc<RwLock<DashboardModel>>| {
                warp::reply::json(&*state.read().unwrap())
            });

        let ingest_route = warp::path("ingest")
            .and(warp::post())
            .and(warp::body::json())
            .and(state_filter.clone())
            .and(pipeline_filter.clone())
            .and_then(
                |chunk: SampleChunk,
                 state: Arc<RwLock<DashboardModel>>,
                 pipeline: Arc<Pipeline>| async move {
                    match pipeline.process_chunk(&chunk) {
                        Ok(event) => {
                            let mut guard = state.write().unwrap();
                            guard.metrics = pipeline.metrics();
                            let event_type = event.event_type;
                            guard.push_event(event);
                            Ok::<_, warp::Rejection>(warp::reply::with_status(
                                warp::reply::json(&json!({
                                    "status": "ok",
                                    "event_type": event_type,
                                })),
                                StatusCode::OK,
                            ))
                        }
                        Err(err) => {
                            warn!("ingest error: {err:#}");
                            Err(warp::reject::custom(BridgeError))
                        }
                    }
                },
            );

        let scenario_route = warp::path("ingest-config")
            .and(warp::post())
            .and(warp::body::json())
            .and(state_filter.clone())
            .and(pipeline_filter)
            .and_then(
                |config: ScenarioConfig,
                 state: Arc<RwLock<DashboardModel>>,
                 pipeline: Arc<Pipeline>| async move {
                    let chunk = build_chunk(&config, rkecore::prelude::epoch_seconds(), 0);
                    match pipeline.process_chunk(&chunk) {
                        Ok(event) => {
                            let mut guard = state.write().unwrap();
                            guard.metrics = pipeline.metrics();
                            let summary = json!({
                                "status": "ok",
                                "event_type": event.event_type,
                                "threat_level": event.threat_level,
                                "description": config.description.clone().unwrap_or_default(),
                            });
                            guard.push_event(event);
                            Ok::<_, warp::Rejection>(warp::reply::with_status(
                                warp::reply::json(&summary),
                                StatusCode::OK,
                            ))
                        }
                        Err(err) => {
                            warn!("ingest-config error: {err:#}");
                            Err(warp::reject::custom(BridgeError))
                        }
                    }
                },
            );

        let correlation_route = warp::path("correlation")
            .and(warp::post())
            .and(warp::body::json())
            .and(state_filter)
            .map(
                |message: serde_json::Value, state: Arc<RwLock<DashboardModel>>| {
                    log::info!(
                        "peer correlation message: {}",
                        message["type"].as_str().unwrap_or("unknown")
                    );
                    state.write().unwrap().push_correlation(message);
                    warp::reply::json(&json!({"status": "ok"}))
                },
            );

        thread::spawn(move || {
            let routes = events_route
                .or(status_route)
                .or(ingest_route)
                .or(scenario_route)
                .or(correlation_route);
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build bridge runtime");
            runtime.block_on(async move {
                warp::serve(routes).run(bridge_bind_address()).await;
            });
        });
    }

    /// Publishes an event produced outside the HTTP surface (offline runs).
    pub fn publish(&self, event: ThreatEvent) -> Result<()> {
        let mut guard = self.state.write().unwrap();
        guard.metrics = self.pipeline.metrics();
        guard.push_event(event);
        Ok(())
    }

    pub fn publish_status(&self, message: &str) {
        self.state.write().unwrap().source_status = message.to_string();
        println!("[bridge] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> DashboardModel {
        self.state.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ScenarioConfig;
    use rkecore::prelude::PipelineConfig;

    #[test]
    fn bridge_retains_published_events() {
        let pipeline = Arc::new(Pipeline::new(&PipelineConfig::default()).unwrap());
        let bridge = MonitorBridge::new(pipeline.clone());

        let chunk = build_chunk(&ScenarioConfig::default(), 100.0, 0);
        let event = pipeline.process_chunk(&chunk).unwrap();
        bridge.publish(event).unwrap();
        bridge.publish_status("offline run complete");

        let snapshot = bridge.snapshot();
        assert_eq!(snapshot.events.len(), 1);
        assert_eq!(snapshot.metrics.chunks_processed, 1);
        assert_eq!(snapshot.source_status, "offline run complete");
    }
}
