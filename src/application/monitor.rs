//! Monitor aggregator and latency window.
//!
//! The aggregator keeps a bounded FIFO of monitor events and streams every
//! new event and heartbeat to attached observers. Heartbeats are never kept.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};

use crate::domain::events::{HubEvent, HubEventKind, RouteRecipient};
use crate::domain::foundation::{ConnectionId, DomainError};
use crate::domain::monitor::{
    LatencySample, MonitorEvent, MonitorEventKind, MonitorHeartbeat, HUB_SOURCE,
};
use crate::ports::{EventHandler, EventSubscriber, Transport};

pub const MONITOR_EVENT: &str = "monitor:event";
pub const MONITOR_HEARTBEAT: &str = "monitor:heartbeat";
pub const MONITOR_HISTORY: &str = "monitor:history";

struct MonitorState {
    history: VecDeque<(u64, MonitorEvent)>,
    recorded: u64,
    observers: Vec<ConnectionId>,
}

pub struct MonitorAggregator {
    state: Mutex<MonitorState>,
    capacity: usize,
    transport: Arc<dyn Transport>,
}

impl MonitorAggregator {
    pub fn new(capacity: usize, transport: Arc<dyn Transport>) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                history: VecDeque::with_capacity(capacity),
                recorded: 0,
                observers: Vec::new(),
            }),
            capacity,
            transport,
        }
    }

    /// Subscribes the aggregator to the hub events it records.
    pub fn register(self: &Arc<Self>, subscriber: &dyn EventSubscriber) {
        subscriber.subscribe_all(
            &[
                HubEventKind::CommandRouted,
                HubEventKind::DeviceHeartbeat,
                HubEventKind::PersistenceFailed,
                HubEventKind::HardwareEvent,
                HubEventKind::SdkReset,
            ],
            Arc::clone(self) as Arc<dyn EventHandler>,
        );
    }

    /// Appends to history, evicting the oldest entry when full, and streams
    /// the event to observers. Returns the event's sequence number.
    pub fn record_event(&self, event: MonitorEvent) -> u64 {
        let mut state = self.lock();
        state.recorded += 1;
        let seq = state.recorded;

        if self.capacity > 0 {
            while state.history.len() >= self.capacity {
                state.history.pop_front();
            }
            state.history.push_back((seq, event.clone()));
        }

        let payload = to_value(&event);
        for observer in &state.observers {
            self.transport.send(observer, MONITOR_EVENT, &payload);
        }
        seq
    }

    /// Streams a heartbeat to observers without recording it.
    pub fn record_heartbeat(&self, heartbeat: MonitorHeartbeat) {
        let state = self.lock();
        let payload = to_value(&heartbeat);
        for observer in &state.observers {
            self.transport.send(observer, MONITOR_HEARTBEAT, &payload);
        }
    }

    /// Sends the whole history to one observer as a single batch.
    pub fn send_history(&self, observer: &ConnectionId) -> bool {
        let events = self.history();
        self.transport
            .send(observer, MONITOR_HISTORY, &json!({ "events": events }))
    }

    /// Attaches an observer and sends it the current history.
    pub fn attach(&self, observer: &ConnectionId) {
        {
            let mut state = self.lock();
            if !state.observers.contains(observer) {
                state.observers.push(observer.clone());
            }
        }
        self.send_history(observer);
    }

    /// Detaches an observer. Returns false if it was not attached.
    pub fn detach(&self, observer: &ConnectionId) -> bool {
        let mut state = self.lock();
        let before = state.observers.len();
        state.observers.retain(|o| o != observer);
        state.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    /// Current history, oldest first.
    pub fn history(&self) -> Vec<MonitorEvent> {
        self.lock()
            .history
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Current history paired with sequence numbers.
    pub fn history_with_ids(&self) -> Vec<(u64, MonitorEvent)> {
        self.lock().history.iter().cloned().collect()
    }

    /// Total events ever recorded, evicted ones included.
    pub fn recorded(&self) -> u64 {
        self.lock().recorded
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventHandler for MonitorAggregator {
    fn handle(&self, event: &HubEvent) -> Result<(), DomainError> {
        match event {
            HubEvent::CommandRouted {
                envelope,
                event_name,
                recipients,
                at,
            } => {
                let delivered = recipients.iter().filter(|r| r.delivered).count();
                let mut detail = json!({
                    "event": event_name,
                    "delivered": delivered > 0,
                    "deliveredCount": delivered,
                    "status": if delivered > 0 { "delivered" } else { "failed" },
                    "recipients": recipients.iter().map(recipient_json).collect::<Vec<_>>(),
                });
                if let Some(payload) = &envelope.payload {
                    detail["payload"] = payload.clone();
                }
                if let Some(instance) = &envelope.target_instance_id {
                    detail["targetInstanceId"] = json!(instance);
                }
                if let Some(instance) = &envelope.source_instance_id {
                    detail["sourceInstanceId"] = json!(instance);
                }

                let source = envelope
                    .source
                    .map(|s| s.as_str())
                    .unwrap_or(HUB_SOURCE);
                self.record_event(
                    MonitorEvent::new(source, envelope.command.clone(), *at)
                        .with_target(envelope.target.as_str())
                        .with_detail(detail)
                        .with_kind(MonitorEventKind::Command),
                );
            }
            HubEvent::DeviceHeartbeat {
                device,
                instance_id,
                latency_ms,
                at,
            } => self.record_heartbeat(MonitorHeartbeat {
                device: *device,
                instance_id: instance_id.clone(),
                latency_ms: *latency_ms,
                at: *at,
            }),
            HubEvent::PersistenceFailed { key, error, at } => {
                self.record_event(
                    MonitorEvent::new(HUB_SOURCE, "persistence-failed", *at)
                        .with_detail(json!({ "key": key, "error": error }))
                        .with_kind(MonitorEventKind::Persistence),
                );
            }
            HubEvent::HardwareEvent {
                device,
                instance_id,
                event,
                data,
                at,
            } => {
                let mut detail = json!({ "instanceId": instance_id });
                if let Some(data) = data {
                    detail["data"] = data.clone();
                }
                self.record_event(
                    MonitorEvent::new(device.as_str(), event.clone(), *at)
                        .with_detail(detail)
                        .with_kind(MonitorEventKind::Hardware),
                );
            }
            HubEvent::SdkReset {
                source,
                source_instance_id,
                reason,
                at,
            } => {
                let source = source.map(|s| s.as_str()).unwrap_or(HUB_SOURCE);
                self.record_event(
                    MonitorEvent::new(source, "sdk:reset", *at)
                        .with_detail(json!({
                            "sourceInstanceId": source_instance_id,
                            "reason": reason,
                        }))
                        .with_kind(MonitorEventKind::Reset),
                );
            }
            _ => {}
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MonitorAggregator"
    }
}

fn recipient_json(recipient: &RouteRecipient) -> Value {
    json!({
        "connectionId": recipient.connection_id,
        "instanceId": recipient.instance_id,
        "transport": recipient.transport,
        "delivered": recipient.delivered,
    })
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Rolling window of latency samples.
pub struct LatencyWindow {
    samples: Mutex<VecDeque<LatencySample>>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn register(self: &Arc<Self>, subscriber: &dyn EventSubscriber) {
        subscriber.subscribe(
            HubEventKind::DeviceHeartbeat,
            Arc::clone(self) as Arc<dyn EventHandler>,
        );
    }

    pub fn push(&self, sample: LatencySample) {
        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        if self.capacity == 0 {
            return;
        }
        while samples.len() >= self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    /// Samples, oldest first.
    pub fn samples(&self) -> Vec<LatencySample> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl EventHandler for LatencyWindow {
    fn handle(&self, event: &HubEvent) -> Result<(), DomainError> {
        if let HubEvent::DeviceHeartbeat {
            device,
            instance_id,
            latency_ms: Some(latency_ms),
            at,
        } = event
        {
            self.push(LatencySample {
                device: *device,
                instance_id: instance_id.clone(),
                latency_ms: *latency_ms,
                at: *at,
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LatencyWindow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::domain::devices::{CommandEnvelope, DeviceId, TransportMode};
    use crate::domain::foundation::{InstanceId, Timestamp};
    use crate::ports::EventPublisher;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(ConnectionId, String, Value)>>,
    }

    impl RecordingTransport {
        fn events_for(&self, conn: &ConnectionId) -> Vec<(String, Value)> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(c, _, _)| c == conn)
                .map(|(_, e, p)| (e.clone(), p.clone()))
                .collect()
        }
    }

    impl Transport for RecordingTransport {
        fn send(&self, connection_id: &ConnectionId, event: &str, payload: &Value) -> bool {
            self.sent
                .lock()
                .unwrap()
                .push((connection_id.clone(), event.to_string(), payload.clone()));
            true
        }

        fn broadcast(&self, _: &str, _: &Value, _: Option<&ConnectionId>) -> usize {
            0
        }
    }

    fn event(n: i64) -> MonitorEvent {
        MonitorEvent::new("hub", format!("channel-{}", n), Timestamp::from_millis(n))
    }

    fn setup(capacity: usize) -> (Arc<RecordingTransport>, Arc<MonitorAggregator>) {
        let transport = Arc::new(RecordingTransport::default());
        let monitor = Arc::new(MonitorAggregator::new(capacity, transport.clone()));
        (transport, monitor)
    }

    #[test]
    fn history_keeps_last_capacity_events() {
        let (_transport, monitor) = setup(200);
        for n in 0..250 {
            monitor.record_event(event(n));
        }

        let history = monitor.history();
        assert_eq!(history.len(), 200);
        assert_eq!(history[0].channel, "channel-50");
        assert_eq!(history[199].channel, "channel-249");
        assert_eq!(monitor.recorded(), 250);
    }

    #[test]
    fn attach_sends_history_batch_then_streams() {
        let (transport, monitor) = setup(10);
        monitor.record_event(event(1));
        let observer = ConnectionId::from_string("obs");

        monitor.attach(&observer);
        monitor.record_event(event(2));

        let received = transport.events_for(&observer);
        assert_eq!(received[0].0, MONITOR_HISTORY);
        assert_eq!(received[0].1["events"].as_array().unwrap().len(), 1);
        assert_eq!(received[1].0, MONITOR_EVENT);
        assert_eq!(received[1].1["channel"], "channel-2");
    }

    #[test]
    fn heartbeats_stream_but_never_enter_history() {
        let (transport, monitor) = setup(10);
        let observer = ConnectionId::from_string("obs");
        monitor.attach(&observer);

        monitor.record_heartbeat(MonitorHeartbeat {
            device: DeviceId::ButtonsArduino,
            instance_id: InstanceId::default(),
            latency_ms: Some(20),
            at: Timestamp::from_millis(5),
        });

        assert!(monitor.history().is_empty());
        let received = transport.events_for(&observer);
        assert_eq!(received.last().unwrap().0, MONITOR_HEARTBEAT);
    }

    #[test]
    fn detached_observer_gets_nothing_more() {
        let (transport, monitor) = setup(10);
        let observer = ConnectionId::from_string("obs");
        monitor.attach(&observer);
        assert!(monitor.detach(&observer));
        assert!(!monitor.detach(&observer));

        monitor.record_event(event(1));
        assert_eq!(transport.events_for(&observer).len(), 1);
    }

    #[test]
    fn failed_delivery_is_recorded_as_failed_command() {
        let (_transport, monitor) = setup(10);
        let bus = InMemoryEventBus::new();
        monitor.register(&bus);

        bus.publish(HubEvent::CommandRouted {
            envelope: CommandEnvelope::new(DeviceId::Totem, "start"),
            event_name: "start".into(),
            recipients: vec![],
            at: Timestamp::from_millis(3),
        })
        .unwrap();

        let history = monitor.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].source, HUB_SOURCE);
        assert_eq!(history[0].target.as_deref(), Some("totem"));
        assert_eq!(history[0].detail_flag("delivered"), Some(false));
        assert_eq!(history[0].detail_str("status"), Some("failed"));
        assert_eq!(history[0].kind, MonitorEventKind::Command);
    }

    #[test]
    fn delivered_command_lists_recipients() {
        let (_transport, monitor) = setup(10);
        let bus = InMemoryEventBus::new();
        monitor.register(&bus);

        bus.publish(HubEvent::CommandRouted {
            envelope: CommandEnvelope::new(DeviceId::MainScreen, "tabletActivity")
                .from_source(DeviceId::TabletFeedback, None),
            event_name: "tablet-activity".into(),
            recipients: vec![RouteRecipient {
                connection_id: ConnectionId::from_string("c"),
                instance_id: InstanceId::default(),
                transport: TransportMode::Socket,
                delivered: true,
            }],
            at: Timestamp::from_millis(3),
        })
        .unwrap();

        let recorded = &monitor.history()[0];
        assert_eq!(recorded.source, "tablet-feedback");
        assert_eq!(recorded.channel, "tabletActivity");
        assert_eq!(recorded.detail.as_ref().unwrap()["recipients"][0]["connectionId"], "c");
    }

    #[test]
    fn latency_window_keeps_only_samples_with_latency() {
        let window = Arc::new(LatencyWindow::new(2));
        let bus = InMemoryEventBus::new();
        window.register(&bus);

        for (n, latency) in [(1, Some(10)), (2, None), (3, Some(30)), (4, Some(40))] {
            bus.publish(HubEvent::DeviceHeartbeat {
                device: DeviceId::ButtonsGame,
                instance_id: InstanceId::default(),
                latency_ms: latency,
                at: Timestamp::from_millis(n),
            })
            .unwrap();
        }

        let samples: Vec<_> = window.samples().iter().map(|s| s.latency_ms).collect();
        assert_eq!(samples, vec![30, 40]);
    }
}
