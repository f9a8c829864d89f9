use crate::correlation::protocol::{NfcDetection, PeerMessage};
use crate::correlation::{Indicator, IndicatorPort};
use crate::telemetry::LogManager;
use crate::threat::ThreatEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// RF threats below this level do not arm the correlation window.
pub const ARM_THRESHOLD: f64 = 0.7;
/// How long a proximity detection stays attributable to an RF threat.
pub const CORRELATION_WINDOW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationMode {
    Idle,
    Armed,
    Correlated,
}

struct MachineState {
    mode: CorrelationMode,
    active_threat: Option<ThreatEvent>,
    armed_at: f64,
    deadline: f64,
    /// Cooperative cancellation for the pending countdown; replaced on
    /// every arming, checked by the countdown task before it fires.
    cancel_flag: Option<Arc<AtomicBool>>,
    arm_count: u32,
    threat_types: Vec<String>,
}

/// Links inbound RF threat events to local proximity detections. Single
/// control flow on the peer; the only concurrent actor is the countdown
/// task, which is fenced off with the cancellation flag and the state
/// lock.
pub struct CorrelationMachine {
    state: Arc<Mutex<MachineState>>,
    outbox: UnboundedSender<PeerMessage>,
    indicator: Arc<dyn IndicatorPort>,
    window: Duration,
    logger: LogManager,
}

impl CorrelationMachine {
    pub fn new(indicator: Arc<dyn IndicatorPort>, outbox: UnboundedSender<PeerMessage>) -> Self {
        Self::with_window(indicator, outbox, CORRELATION_WINDOW)
    }

    pub fn with_window(
        indicator: Arc<dyn IndicatorPort>,
        outbox: UnboundedSender<PeerMessage>,
        window: Duration,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(MachineState {
                mode: CorrelationMode::Idle,
                active_threat: None,
                armed_at: 0.0,
                deadline: 0.0,
                cancel_flag: None,
                arm_count: 0,
                threat_types: Vec::new(),
            })),
            outbox,
            indicator,
            window,
            logger: LogManager::new(),
        }
    }

    pub fn mode(&self) -> CorrelationMode {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).mode
    }

    /// Inbound threat event. High-level threats arm (or re-arm, last
    /// wins) the correlation window and start a cancellable countdown.
    pub fn handle_threat(&self, event: ThreatEvent, now: f64) {
        if event.threat_level <= ARM_THRESHOLD {
            return;
        }

        let flag = Arc::new(AtomicBool::new(false));
        let (detection_count, threat_types) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(previous) = state.cancel_flag.take() {
                previous.store(true, Ordering::SeqCst);
            }
            state.mode = CorrelationMode::Armed;
            state.armed_at = now;
            state.deadline = now + self.window.as_secs_f64();
            state.arm_count += 1;
            let type_name = event.event_type.as_str().to_string();
            if !state.threat_types.contains(&type_name) {
                state.threat_types.push(type_name);
            }
            state.active_threat = Some(event);
            state.cancel_flag = Some(flag.clone());
            (state.arm_count, state.threat_types.clone())
        };

        self.indicator.set_indicator(Indicator::Scan, true);
        self.logger
            .record(&format!("armed correlation window #{detection_count}"));
        let _ = self.outbox.send(PeerMessage::CorrelationActivated {
            timestamp: now,
            detection_count,
            threat_types,
        });

        let state = self.state.clone();
        let outbox = self.outbox.clone();
        let indicator = self.indicator.clone();
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if flag.load(Ordering::SeqCst) {
                return;
            }
            let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
            // Re-check under the lock: a proximity detection may have won
            // the race and cancelled after our first look.
            if flag.load(Ordering::SeqCst) || state.mode != CorrelationMode::Armed {
                return;
            }
            let deadline = state.deadline;
            state.mode = CorrelationMode::Idle;
            state.active_threat = None;
            state.cancel_flag = None;
            drop(state);
            indicator.set_indicator(Indicator::Scan, false);
            let _ = outbox.send(PeerMessage::CorrelationTimeout {
                timestamp: deadline,
            });
        });
    }

    /// Local proximity detection. While armed this correlates with the
    /// stored threat; otherwise it is reported as a plain detection.
    pub fn handle_proximity(&self, detection: NfcDetection) {
        let correlated = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match state.mode {
                CorrelationMode::Armed => {
                    // Cancel the countdown before emitting, so the same
                    // arming can never also produce a timeout.
                    if let Some(flag) = state.cancel_flag.take() {
                        flag.store(true, Ordering::SeqCst);
                    }
                    state.mode = CorrelationMode::Correlated;
                    let threat = state.active_threat.take();
                    state.mode = CorrelationMode::Idle;
                    threat
                }
                _ => None,
            }
        };

        match correlated {
            Some(threat) => {
                self.logger.record("correlated RF threat with proximity detection");
                let _ = self.outbox.send(PeerMessage::CorrelatedSecurityEvent {
                    timestamp: detection.timestamp,
                    rf_threat: Box::new(threat),
                    nfc_detection: detection,
                });
                // Brief alert blink, then both indicators off.
                self.indicator.set_indicator(Indicator::Alert, true);
                self.indicator.set_indicator(Indicator::Alert, false);
                self.indicator.set_indicator(Indicator::Scan, false);
            }
            None => {
                let _ = self
                    .outbox
                    .send(PeerMessage::ProximityDetection(detection));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Modulation, SignalFeatures};
    use crate::threat::ThreatEventType;
    use std::collections::BTreeMap;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingIndicator {
        calls: Mutex<Vec<(Indicator, bool)>>,
    }

    impl IndicatorPort for RecordingIndicator {
        fn set_indicator(&self, indicator: Indicator, on: bool) {
            self.calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push((indicator, on));
        }
    }

    fn threat(level: f64) -> ThreatEvent {
        ThreatEvent {
            event_id: Uuid::new_v4(),
            timestamp: 100.0,
            event_type: ThreatEventType::ReplayAttack,
            threat_level: level,
            confidence: level,
            signal_features: SignalFeatures {
                timestamp: 100.0,
                center_freq_hz: 433.92e6,
                power_spectrum_db: vec![-70.0; 8],
                burst_timing: vec![],
                burst_durations: vec![],
                inter_burst_intervals: vec![],
                burst_count: 0,
                modulation: Modulation::Fsk,
                frequency_deviation_hz: 30_000.0,
                bandwidth_hz: 40_000.0,
                snr_db: 20.0,
                rssi_dbm: -50.0,
                peak_frequencies_hz: vec![],
            },
            evidence: BTreeMap::new(),
            recommended_action: "test".into(),
        }
    }

    fn drain(rx: &mut UnboundedReceiver<PeerMessage>) -> Vec<serde_json::Value> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message.to_wire());
        }
        messages
    }

    fn machine() -> (
        CorrelationMachine,
        UnboundedReceiver<PeerMessage>,
        Arc<RecordingIndicator>,
    ) {
        let (tx, rx) = unbounded_channel();
        let indicator = Arc::new(RecordingIndicator::default());
        let machine = CorrelationMachine::new(indicator.clone(), tx);
        (machine, rx, indicator)
    }

    #[tokio::test(start_paused = true)]
    async fn proximity_within_window_emits_one_correlated_event() {
        let (machine, mut rx, indicator) = machine();

        machine.handle_threat(threat(0.8), 100.0);
        assert_eq!(machine.mode(), CorrelationMode::Armed);

        tokio::time::sleep(Duration::from_secs(5)).await;
        machine.handle_proximity(NfcDetection::from_uid(&[0x04, 0xa2], 105.0, "tap"));
        assert_eq!(machine.mode(), CorrelationMode::Idle);

        // Let the (cancelled) countdown lapse to prove it stays silent.
        tokio::time::sleep(Duration::from_secs(60)).await;

        let messages = drain(&mut rx);
        let kinds: Vec<&str> = messages
            .iter()
            .map(|m| m["type"].as_str().unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec!["nfc_correlation_activated", "correlated_security_event"]
        );
        let correlated = &messages[1];
        assert_eq!(correlated["correlation_type"], "rf_nfc_proximity");
        assert_eq!(correlated["threat_escalation"], "high_confidence_attack");
        assert_eq!(correlated["rf_threat"]["event_type"], "replay_attack");
        assert_eq!(correlated["nfc_detection"]["type"], "nfc_detection");

        let calls = indicator.calls.lock().unwrap().clone();
        assert!(calls.contains(&(Indicator::Scan, true)));
        assert_eq!(calls.last(), Some(&(Indicator::Scan, false)));
    }

    #[tokio::test(start_paused = true)]
    async fn silence_for_the_full_window_emits_one_timeout() {
        let (machine, mut rx, _indicator) = machine();

        machine.handle_threat(threat(0.8), 100.0);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(machine.mode(), CorrelationMode::Idle);

        let messages = drain(&mut rx);
        let kinds: Vec<&str> = messages
            .iter()
            .map(|m| m["type"].as_str().unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec!["nfc_correlation_activated", "nfc_correlation_timeout"]
        );
        assert_eq!(messages[1]["reason"], "timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_refreshes_the_countdown_last_wins() {
        let (machine, mut rx, _indicator) = machine();

        machine.handle_threat(threat(0.8), 100.0);
        tokio::time::sleep(Duration::from_secs(20)).await;
        let mut second = threat(0.9);
        second.event_type = ThreatEventType::JammingAttack;
        machine.handle_threat(second, 120.0);

        // 40 s after the first arming: its countdown must stay cancelled.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(machine.mode(), CorrelationMode::Armed);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(machine.mode(), CorrelationMode::Idle);

        let messages = drain(&mut rx);
        let timeouts = messages
            .iter()
            .filter(|m| m["type"] == "nfc_correlation_timeout")
            .count();
        assert_eq!(timeouts, 1);
        // The second activation reports both threat types seen so far.
        let second_activation = &messages[1];
        assert_eq!(second_activation["detection_count"], 2);
        assert_eq!(
            second_activation["threat_types"]
                .as_array()
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn low_level_threats_do_not_arm() {
        let (machine, mut rx, _indicator) = machine();
        machine.handle_threat(threat(0.5), 100.0);
        assert_eq!(machine.mode(), CorrelationMode::Idle);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_proximity_is_reported_as_plain_detection() {
        let (machine, mut rx, _indicator) = machine();
        machine.handle_proximity(NfcDetection::from_uid(&[0xde, 0xad], 50.0, "tap"));
        assert_eq!(machine.mode(), CorrelationMode::Idle);

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["type"], "nfc_detection");
        assert_eq!(messages[0]["uid"][0], "de");
    }
}
