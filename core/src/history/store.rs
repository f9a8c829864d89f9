use crate::classify::{DetectedSignal, SignalType};
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

/// Entry owned exclusively by the history store: the essential fields of a
/// detection, copied on ingestion. Callers only ever receive clones.
#[derive(Debug, Clone)]
pub struct StoredSignal {
    pub id: Uuid,
    pub signal_type: SignalType,
    pub confidence: f64,
    /// Capture timestamp of the underlying chunk.
    pub timestamp: f64,
    pub inserted_at: f64,
    pub power_spectrum_db: Vec<f32>,
    pub inter_burst_intervals: Vec<f64>,
    pub rssi_dbm: f64,
    pub snr_db: f64,
    /// Strongest spectral peak, when one was found.
    pub dominant_peak_hz: Option<f64>,
    /// Set once a replay determination has consumed this entry as the
    /// original transmission.
    pub replay_consumed: bool,
}

impl StoredSignal {
    fn from_detection(signal: &DetectedSignal) -> Self {
        Self {
            id: Uuid::new_v4(),
            signal_type: signal.signal_type,
            confidence: signal.confidence,
            timestamp: signal.timestamp,
            inserted_at: signal.timestamp,
            power_spectrum_db: signal.features.power_spectrum_db.clone(),
            inter_burst_intervals: signal.features.inter_burst_intervals.clone(),
            rssi_dbm: signal.features.rssi_dbm,
            snr_db: signal.features.snr_db,
            dominant_peak_hz: signal.features.peak_frequencies_hz.first().copied(),
            replay_consumed: false,
        }
    }
}

pub const DEFAULT_RETENTION_SECS: f64 = 300.0;
pub const DEFAULT_CAPACITY: usize = 1000;

/// Bounded, time-windowed ledger of recent detections. One producer
/// inserts while detector threads query; each operation takes a short
/// exclusive lock around the deque and nothing else, and reads hand back
/// independent copies.
pub struct SignalHistory {
    entries: Mutex<VecDeque<StoredSignal>>,
    retention_secs: f64,
    capacity: usize,
}

impl SignalHistory {
    pub fn new(retention_secs: f64, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            retention_secs,
            capacity: capacity.max(1),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_RETENTION_SECS, DEFAULT_CAPACITY)
    }

    /// Always succeeds; entries older than the retention window (measured
    /// against the inserted signal's timestamp) and overflow beyond the
    /// capacity are evicted oldest-first.
    pub fn insert(&self, signal: &DetectedSignal) -> Uuid {
        let entry = StoredSignal::from_detection(signal);
        let id = entry.id;
        let horizon = entry.timestamp - self.retention_secs;

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        while entries.front().is_some_and(|oldest| oldest.timestamp < horizon) {
            entries.pop_front();
        }
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
        id
    }

    /// Entries captured within `within_secs` of `now`, oldest first.
    pub fn recent(&self, now: f64, within_secs: f64) -> Vec<StoredSignal> {
        let cutoff = now - within_secs;
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .filter(|entry| entry.timestamp >= cutoff && entry.timestamp <= now)
            .cloned()
            .collect()
    }

    pub fn recent_of_type(
        &self,
        signal_type: SignalType,
        now: f64,
        within_secs: f64,
    ) -> Vec<StoredSignal> {
        let cutoff = now - within_secs;
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .filter(|entry| {
                entry.signal_type == signal_type
                    && entry.timestamp >= cutoff
                    && entry.timestamp <= now
            })
            .cloned()
            .collect()
    }

    /// Flags an entry as consumed by a replay determination. Returns false
    /// when the entry has already been evicted.
    pub fn mark_replay_consumed(&self, id: Uuid) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for entry in entries.iter_mut() {
            if entry.id == id {
                entry.replay_consumed = true;
                return true;
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
