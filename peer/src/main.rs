use anyhow::Context;
use clap::Parser;
use indicator::LogIndicator;
use log::{info, warn};
use rkecore::correlation::{CorrelationMachine, NfcDetection};
use rkecore::prelude::epoch_seconds;
use rkecore::threat::ThreatEvent;
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;
use uplink::Uplink;
use uuid::Uuid;
use warp::Filter;

mod indicator;
mod uplink;

#[derive(Parser)]
#[command(author, version, about = "NFC proximity peer")]
struct Args {
    /// Base URL of the central monitor bridge
    #[arg(long, default_value = "http://127.0.0.1:9100")]
    monitor_url: String,
    /// Port for the local NFC boundary endpoint
    #[arg(long, default_value_t = 9200)]
    listen_port: u16,
    /// Seconds between threat-event polls
    #[arg(long, default_value_t = 1)]
    poll_interval_secs: u64,
}

/// Payload the NFC front end posts on a tap.
#[derive(Debug, Deserialize)]
struct ProximityReport {
    uid: Vec<u8>,
    #[serde(default)]
    detection_context: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let (outbox_tx, mut outbox_rx) = unbounded_channel();
    let machine = Arc::new(CorrelationMachine::new(
        Arc::new(LogIndicator),
        outbox_tx,
    ));
    let uplink = Uplink::new(&args.monitor_url);
    let events_url = format!("{}/events", args.monitor_url.trim_end_matches('/'));
    let client = reqwest::Client::new();

    // Local NFC boundary.
    let machine_for_route = machine.clone();
    let proximity_route = warp::path("proximity")
        .and(warp::post())
        .and(warp::body::json())
        .map(move |report: ProximityReport| {
            let detection = NfcDetection::from_uid(
                &report.uid,
                epoch_seconds(),
                report.detection_context.as_deref().unwrap_or("tap"),
            );
            machine_for_route.handle_proximity(detection);
            warp::reply::json(&serde_json::json!({"status": "ok"}))
        });
    let listen: SocketAddr = ([127, 0, 0, 1], args.listen_port).into();
    tokio::spawn(warp::serve(proximity_route).run(listen));
    info!("proximity endpoint listening on {listen}");

    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut poll = tokio::time::interval(Duration::from_secs(args.poll_interval_secs.max(1)));

    loop {
        tokio::select! {
            Some(message) = outbox_rx.recv() => {
                if let Err(err) = uplink.send(&message.to_wire()).await {
                    warn!("dropping correlation message: {err}");
                }
            }
            _ = poll.tick() => {
                match fetch_events(&client, &events_url).await {
                    Ok(events) => {
                        for event in events {
                            if seen.insert(event.event_id) {
                                machine.handle_threat(event, epoch_seconds());
                            }
                        }
                    }
                    Err(err) => warn!("event poll failed: {err}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn fetch_events(client: &reqwest::Client, url: &str) -> anyhow::Result<Vec<ThreatEvent>> {
    let response = client
        .get(url)
        .send()
        .await
        .context("requesting threat events")?;
    let events = response
        .json::<Vec<ThreatEvent>>()
        .await
        .context("decoding threat events")?;
    Ok(events)
}
