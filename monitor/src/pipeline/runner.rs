use anyhow::Context;
use rkecore::acquisition::SampleChunk;
use rkecore::classify::{DetectedSignal, PatternClassifier};
use rkecore::features::FeatureExtractor;
use rkecore::history::SignalHistory;
use rkecore::prelude::PipelineConfig;
use rkecore::telemetry::{MetricsSnapshot, PipelineMetrics};
use rkecore::threat::{ThreatEngine, ThreatEvent};
use std::sync::Arc;

/// Chains extract → classify → analyze for each chunk. The history store
/// is constructed once here and shared with the engine's detectors.
pub struct Pipeline {
    extractor: FeatureExtractor,
    classifier: PatternClassifier,
    engine: ThreatEngine,
    history: Arc<SignalHistory>,
    metrics: Arc<PipelineMetrics>,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> anyhow::Result<Self> {
        let extractor =
            FeatureExtractor::new(config.fft_size).context("initializing feature extractor")?;
        let history = Arc::new(SignalHistory::new(
            config.retention_secs,
            config.history_capacity,
        ));
        let metrics = Arc::new(PipelineMetrics::new());
        let engine = ThreatEngine::new(history.clone(), metrics.clone());
        Ok(Self {
            extractor,
            classifier: PatternClassifier::new(),
            engine,
            history,
            metrics,
        })
    }

    pub fn history(&self) -> Arc<SignalHistory> {
        self.history.clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn metrics_handle(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Runs one chunk through the full path and returns the single threat
    /// event it produced.
    pub fn process_chunk(&self, chunk: &SampleChunk) -> anyhow::Result<ThreatEvent> {
        let features = self
            .extractor
            .extract(chunk)
            .context("extracting signal features")?;
        self.metrics.record_chunk();

        let candidates = self.classifier.classify(&features);
        for _ in &candidates {
            self.metrics.record_detection();
        }

        let event = if candidates.is_empty() {
            self.engine.analyze(&DetectedSignal::unclassified(features))
        } else {
            self.engine
                .resolve(candidates)
                .context("resolving classified candidates")?
        };
        Ok(event)
    }
}
