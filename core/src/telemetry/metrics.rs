use serde::Serialize;
use std::sync::Mutex;

/// Counters for the capture-to-event pipeline, shared across threads.
pub struct PipelineMetrics {
    inner: Mutex<Counters>,
}

#[derive(Default)]
struct Counters {
    chunks_processed: usize,
    detections: usize,
    threats_emitted: usize,
    detector_errors: usize,
    source_retries: usize,
}

/// Point-in-time copy of the counters, suitable for the status endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub chunks_processed: usize,
    pub detections: usize,
    pub threats_emitted: usize,
    pub detector_errors: usize,
    pub source_retries: usize,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Counters::default()),
        }
    }

    pub fn record_chunk(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.chunks_processed += 1;
        }
    }

    pub fn record_detection(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.detections += 1;
        }
    }

    pub fn record_threat(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.threats_emitted += 1;
        }
    }

    pub fn record_detector_error(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.detector_errors += 1;
        }
    }

    pub fn record_source_retry(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.source_retries += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        match self.inner.lock() {
            Ok(counters) => MetricsSnapshot {
                chunks_processed: counters.chunks_processed,
                detections: counters.detections,
                threats_emitted: counters.threats_emitted,
                detector_errors: counters.detector_errors,
                source_retries: counters.source_retries,
            },
            Err(_) => MetricsSnapshot::default(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let metrics = PipelineMetrics::new();
        metrics.record_chunk();
        metrics.record_chunk();
        metrics.record_threat();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.chunks_processed, 2);
        assert_eq!(snapshot.threats_emitted, 1);
        assert_eq!(snapshot.detector_errors, 0);
    }
}
