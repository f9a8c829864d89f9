use anyhow::Context;
use bridge::MonitorBridge;
use clap::Parser;
use generator::{build_chunk, ScenarioConfig, ScenarioKind, ScriptedSource};
use pipeline::{MonitorConfig, Pipeline};
use rkecore::acquisition::GuardedSource;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;

mod bridge;
mod generator;
mod pipeline;

#[derive(Parser)]
#[command(author, version, about = "RKE spectrum sentinel driver")]
struct Args {
    /// Run a scripted scenario offline and emit a threat summary
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Scenario to synthesize in offline mode
    #[arg(long, value_enum, default_value_t = ScenarioKind::KeyFob)]
    scenario: ScenarioKind,
    /// Number of chunks to synthesize in offline mode
    #[arg(long, default_value_t = 8)]
    chunks: usize,
    /// Load a monitor config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value_t = 16_384)]
    fft_size: usize,
    #[arg(long, default_value_t = 250_000.0)]
    sample_rate_hz: f64,
    #[arg(long, default_value_t = 433_920_000.0)]
    center_freq_hz: f64,
    /// Keep the HTTP bridge alive for the dashboard and the peer
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let monitor_config = if let Some(path) = args.workflow {
        MonitorConfig::load(path)?
    } else {
        MonitorConfig::from_args(args.fft_size, args.sample_rate_hz, args.center_freq_hz)
    };

    let pipeline = Arc::new(Pipeline::new(&monitor_config.to_pipeline_config())?);
    let bridge = MonitorBridge::new(pipeline.clone());

    if args.offline {
        let scenario = ScenarioConfig {
            fft_size: monitor_config.fft_size,
            sample_rate_hz: monitor_config.sample_rate_hz,
            center_freq_hz: monitor_config.center_freq_hz,
            ..ScenarioConfig::for_kind(args.scenario)
        };
        let chunk_secs = monitor_config.fft_size as f64 / monitor_config.sample_rate_hz;
        let base = rkecore::prelude::epoch_seconds();

        let chunks: Vec<_> = (0..args.chunks)
            .map(|index| build_chunk(&scenario, base + index as f64 * chunk_secs, index))
            .collect();
        let mut source = GuardedSource::new(
            Box::new(ScriptedSource::new(chunks)),
            &monitor_config.to_pipeline_config(),
            pipeline.metrics_handle(),
        );

        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for the offline run")?;
        let mut summary: Vec<String> = Vec::new();
        for index in 0..args.chunks {
            let chunk = runtime.block_on(source.next_chunk());
            let event = pipeline
                .process_chunk(&chunk)
                .with_context(|| format!("processing chunk {index}"))?;
            summary.push(format!(
                "{} (level {:.2}, confidence {:.2})",
                event.event_type.as_str(),
                event.threat_level,
                event.confidence
            ));
            bridge.publish(event)?;
        }
        bridge.publish_status(&format!("sample source: {}", source.status()));

        let metrics = pipeline.metrics();
        println!(
            "Offline run -> chunks {}, detections {}, events {}, history entries {}",
            metrics.chunks_processed,
            metrics.detections,
            metrics.threats_emitted,
            pipeline.history().len()
        );
        for (index, line) in summary.iter().enumerate() {
            println!("  chunk {index}: {line}");
        }
        bridge.publish_status("Offline scenario results ready.");

        let report = format!(
            "scenario={:?} chunks={} detections={} events={:?}\n",
            args.scenario, metrics.chunks_processed, metrics.detections, summary
        );
        let report_path = PathBuf::from("tools/data/offline_threats.log");
        if let Some(parent) = report_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(report_path)?;
        file.write_all(report.as_bytes())?;
    }

    if args.serve {
        bridge.serve();
        bridge.publish_status("HTTP bridge running (Ctrl+C to stop)...");
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
