//! Hub assembly and per-connection operations.
//!
//! [`Hub`] owns one instance of every component, wired to a shared event
//! bus and transport. Transport adapters call into it with a connection id
//! and never touch the components directly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Map, Value};

use super::{
    AdminStateAggregator, CommandRouter, DeviceRegistry, HeartbeatWatchdog, LatencyWindow,
    MonitorAggregator, PreviousMessageStore, Registration, RouteOutcome, SendOptions,
    SharedStateStore, SubscriptionId, WatchdogConfig,
};
use crate::config::HubConfig;
use crate::domain::admin::AdminStateSnapshot;
use crate::domain::devices::{DeviceId, DeviceSession};
use crate::domain::events::{DisconnectReason, HubEvent};
use crate::domain::foundation::{ConnectionId, DomainError, ErrorCode, InstanceId, Timestamp};
use crate::domain::previous_message::PreviousMessage;
use crate::domain::storage::{ModifyOptions, StorageUpdate};
use crate::ports::{DurableStorage, EventBus, EventPublisher, StorageError, Transport};

pub const DEVICES_LIST: &str = "devices:list";
pub const STORAGE_UPDATE: &str = "storage-update";
pub const PREVIOUS_MESSAGE: &str = "previous-message";
pub const SDK_RESET: &str = "sdk:reset";

/// Session clock length seeded into a fresh store.
const DEFAULT_SESSION_MS: u64 = 60 * 60 * 1000;

/// Request to reset every SDK client.
#[derive(Debug, Clone, Default)]
pub struct ResetRequest {
    pub source: Option<String>,
    pub source_instance_id: Option<String>,
    pub reason: Option<String>,
    pub metadata: Option<Value>,
}

pub struct Hub {
    registry: Arc<DeviceRegistry>,
    router: CommandRouter,
    store: SharedStateStore,
    monitor: Arc<MonitorAggregator>,
    admin: AdminStateAggregator,
    previous_message: PreviousMessageStore,
    transport: Arc<dyn Transport>,
    publisher: Arc<dyn EventPublisher>,
    storage_subscriptions: Mutex<HashMap<ConnectionId, SubscriptionId>>,
    watchdog: WatchdogConfig,
}

impl Hub {
    /// Builds every component and loads durable state.
    ///
    /// The monitor and latency window are subscribed to `bus` here. Other
    /// subscribers (such as transport bridges) are the caller's business.
    pub async fn build<B>(
        config: &HubConfig,
        bus: Arc<B>,
        storage: Arc<dyn DurableStorage>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, StorageError>
    where
        B: EventBus + 'static,
    {
        let publisher: Arc<dyn EventPublisher> = bus.clone();

        let registry = Arc::new(DeviceRegistry::new(publisher.clone()));
        let monitor = Arc::new(MonitorAggregator::new(
            config.monitor_capacity,
            transport.clone(),
        ));
        let latency = Arc::new(LatencyWindow::new(config.latency_window));
        monitor.register(bus.as_ref());
        latency.register(bus.as_ref());

        let router = CommandRouter::new(registry.clone(), transport.clone(), publisher.clone());
        let store = SharedStateStore::load(storage.clone(), publisher.clone()).await?;
        let previous_message = PreviousMessageStore::load(storage, publisher.clone()).await?;
        let admin = AdminStateAggregator::new(registry.clone(), monitor.clone(), latency);

        let hub = Self {
            registry,
            router,
            store,
            monitor,
            admin,
            previous_message,
            transport,
            publisher,
            storage_subscriptions: Mutex::new(HashMap::new()),
            watchdog: WatchdogConfig::default()
                .with_interval(config.watchdog_interval())
                .with_timeout(config.heartbeat_timeout()),
        };
        hub.seed_storage_defaults(Timestamp::now());
        Ok(hub)
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    pub fn store(&self) -> &SharedStateStore {
        &self.store
    }

    pub fn monitor(&self) -> &Arc<MonitorAggregator> {
        &self.monitor
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Watchdog over this hub's registry.
    pub fn watchdog(&self) -> HeartbeatWatchdog {
        HeartbeatWatchdog::new(self.registry.clone(), self.watchdog.clone())
    }

    /// Greets a new channel with the current device list.
    pub fn connect(&self, connection_id: &ConnectionId) {
        let devices = self.registry.list_summaries();
        self.transport
            .send(connection_id, DEVICES_LIST, &json!({ "devices": devices }));
    }

    /// Tears down everything tied to a closed channel.
    pub fn disconnect(&self, connection_id: &ConnectionId) {
        self.registry
            .disconnect(connection_id, DisconnectReason::ChannelClosed);
        self.unsubscribe_storage(connection_id);
        self.monitor.detach(connection_id);
        tracing::debug!(connection_id = %connection_id, "Channel cleaned up");
    }

    pub fn register(
        &self,
        connection_id: &ConnectionId,
        registration: Registration,
    ) -> Result<DeviceSession, DomainError> {
        self.registry.register(connection_id, registration)
    }

    /// Takes a channel's device offline while keeping the channel open.
    pub fn unregister(&self, connection_id: &ConnectionId) -> Result<DeviceSession, DomainError> {
        self.registry
            .disconnect(connection_id, DisconnectReason::Unregistered)
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::UnknownConnection,
                    "Channel has no registered device",
                )
                .with_detail("connectionId", connection_id.as_str())
            })
    }

    pub fn heartbeat(
        &self,
        connection_id: &ConnectionId,
        latency_ms: Option<u64>,
    ) -> Result<DeviceSession, DomainError> {
        self.registry.heartbeat(connection_id, latency_ms)
    }

    /// Routes a command on behalf of `sender`.
    pub fn execute(
        &self,
        sender: &ConnectionId,
        target: &str,
        command: &str,
        payload: Option<Value>,
        options: SendOptions,
    ) -> Result<RouteOutcome, DomainError> {
        let outcome = self.router.send(target, command, payload, options)?;
        self.registry.touch(sender);
        Ok(outcome)
    }

    pub fn modify_storage(
        &self,
        patch: Value,
        options: ModifyOptions,
    ) -> Result<StorageUpdate, DomainError> {
        self.store.modify(patch, options)
    }

    /// Subscribes a channel to store updates, replacing any earlier
    /// subscription it held.
    pub fn subscribe_storage(&self, connection_id: &ConnectionId, keys: Option<Vec<String>>) {
        self.unsubscribe_storage(connection_id);

        let transport = self.transport.clone();
        let target = connection_id.clone();
        let id = self.store.subscribe(
            Arc::new(move |update: &StorageUpdate| {
                let payload = serde_json::to_value(update).unwrap_or(Value::Null);
                transport.send(&target, STORAGE_UPDATE, &payload);
            }),
            keys,
        );

        self.subscriptions()
            .insert(connection_id.clone(), id);
    }

    pub fn unsubscribe_storage(&self, connection_id: &ConnectionId) -> bool {
        let removed = self.subscriptions().remove(connection_id);
        match removed {
            Some(id) => self.store.unsubscribe(id),
            None => false,
        }
    }

    pub fn monitor_subscribe(&self, connection_id: &ConnectionId) {
        self.monitor.attach(connection_id);
    }

    pub fn monitor_unsubscribe(&self, connection_id: &ConnectionId) -> bool {
        self.monitor.detach(connection_id)
    }

    pub fn admin_state(&self) -> AdminStateSnapshot {
        self.admin.snapshot()
    }

    pub fn previous_message(&self) -> PreviousMessage {
        self.previous_message.get()
    }

    /// Stores the previous message, or clears it when `message` is blank,
    /// and tells every channel.
    pub fn set_previous_message(&self, message: &str, team_name: Option<&str>) -> PreviousMessage {
        let record = if message.trim().is_empty() {
            self.previous_message.clear()
        } else {
            self.previous_message.set(message, team_name)
        };
        let payload = serde_json::to_value(&record).unwrap_or(Value::Null);
        self.transport.broadcast(PREVIOUS_MESSAGE, &payload, None);
        record
    }

    /// Relays a reset to every channel except the sender.
    pub fn reset(
        &self,
        sender: Option<&ConnectionId>,
        request: ResetRequest,
    ) -> Result<usize, DomainError> {
        let source = request
            .source
            .as_deref()
            .map(str::parse::<DeviceId>)
            .transpose()?;
        let source_instance_id = request
            .source_instance_id
            .as_deref()
            .map(|id| InstanceId::resolve(Some(id)));
        let at = Timestamp::now();

        let mut payload = Map::new();
        if let Some(source) = source {
            payload.insert("source".into(), json!(source));
        }
        if let Some(instance) = &source_instance_id {
            payload.insert("sourceInstanceId".into(), json!(instance));
        }
        if let Some(reason) = &request.reason {
            payload.insert("reason".into(), json!(reason));
        }
        if let Some(metadata) = request.metadata {
            payload.insert("metadata".into(), metadata);
        }
        payload.insert("at".into(), json!(at));

        let relayed = self
            .transport
            .broadcast(SDK_RESET, &Value::Object(payload), sender);
        tracing::info!(
            source = source.map(|s| s.as_str()),
            reason = request.reason.as_deref(),
            relayed,
            "SDK reset relayed"
        );

        self.publish(HubEvent::SdkReset {
            source,
            source_instance_id,
            reason: request.reason,
            at,
        });
        Ok(relayed)
    }

    /// Records an event raised by a hardware device and relays it to every
    /// channel under its own name.
    pub fn hardware_event(
        &self,
        device: DeviceId,
        instance_id: InstanceId,
        event: &str,
        data: Option<Value>,
    ) -> usize {
        let payload = data.clone().unwrap_or(Value::Null);
        let relayed = self.transport.broadcast(event, &payload, None);

        self.publish(HubEvent::HardwareEvent {
            device,
            instance_id,
            event: event.to_string(),
            data,
            at: Timestamp::now(),
        });
        relayed
    }

    /// Resolves once the store and previous message writers are idle.
    pub async fn flushed(&self) {
        self.store.flushed().await;
        self.previous_message.flushed().await;
    }

    fn seed_storage_defaults(&self, now: Timestamp) {
        let mut patch = Map::new();
        if self.store.get("status").is_none() {
            patch.insert(
                "status".into(),
                json!({ "phase": "idle", "updatedAt": now }),
            );
        }
        if self.store.get("timer").is_none() {
            patch.insert(
                "timer".into(),
                json!({
                    "totalMs": DEFAULT_SESSION_MS,
                    "remainingMs": DEFAULT_SESSION_MS,
                    "startedAt": null,
                    "phase": "idle",
                }),
            );
        }
        if patch.is_empty() {
            return;
        }
        if let Err(err) = self.store.modify(Value::Object(patch), ModifyOptions::default()) {
            tracing::error!(error = %err, "Could not seed storage defaults");
        }
    }

    fn publish(&self, event: HubEvent) {
        if let Err(err) = self.publisher.publish(event) {
            tracing::warn!(error = %err, "Hub event delivery reported failures");
        }
    }

    fn subscriptions(&self) -> std::sync::MutexGuard<'_, HashMap<ConnectionId, SubscriptionId>> {
        self.storage_subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::storage::InMemoryDurableStorage;
    use crate::domain::events::HubEventKind;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(ConnectionId, String, Value)>>,
        broadcasts: Mutex<Vec<(String, Value, Option<ConnectionId>)>>,
    }

    impl RecordingTransport {
        fn sent_to(&self, conn: &ConnectionId, event: &str) -> Vec<Value> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(c, e, _)| c == conn && e == event)
                .map(|(_, _, p)| p.clone())
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

        fn broadcast(&self, event: &str, payload: &Value, except: Option<&ConnectionId>) -> usize {
            self.broadcasts
                .lock()
                .unwrap()
                .push((event.to_string(), payload.clone(), except.cloned()));
            3
        }
    }

    struct Fixture {
        bus: Arc<InMemoryEventBus>,
        transport: Arc<RecordingTransport>,
        hub: Hub,
    }

    async fn setup() -> Fixture {
        let bus = Arc::new(InMemoryEventBus::recording());
        let transport = Arc::new(RecordingTransport::default());
        let storage = Arc::new(InMemoryDurableStorage::new());
        let hub = Hub::build(&HubConfig::default(), bus.clone(), storage, transport.clone())
            .await
            .unwrap();
        Fixture {
            bus,
            transport,
            hub,
        }
    }

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::from_string(id)
    }

    #[tokio::test]
    async fn connect_sends_full_device_list() {
        let f = setup().await;
        f.hub.connect(&conn("c1"));

        let lists = f.transport.sent_to(&conn("c1"), DEVICES_LIST);
        assert_eq!(lists.len(), 1);
        assert_eq!(
            lists[0]["devices"].as_array().unwrap().len(),
            DeviceId::ALL.len()
        );
    }

    #[tokio::test]
    async fn fresh_store_is_seeded_with_status_and_timer() {
        let f = setup().await;
        assert_eq!(f.hub.store().get("status").unwrap()["phase"], "idle");
        assert_eq!(
            f.hub.store().get("timer").unwrap()["totalMs"],
            DEFAULT_SESSION_MS
        );
    }

    #[tokio::test]
    async fn storage_subscription_is_replaced_and_dropped_on_disconnect() {
        let f = setup().await;
        let c = conn("c1");

        f.hub.subscribe_storage(&c, None);
        f.hub.subscribe_storage(&c, Some(vec!["a".into()]));
        assert_eq!(f.hub.store().subscriber_count(), 1);

        f.hub
            .modify_storage(json!({"a": 1}), ModifyOptions::default())
            .unwrap();
        let updates = f.transport.sent_to(&c, STORAGE_UPDATE);
        // Two initial snapshots, one change
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[2]["changedKeys"], json!(["a"]));

        f.hub.disconnect(&c);
        assert_eq!(f.hub.store().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn unregister_without_registration_is_unknown_connection() {
        let f = setup().await;
        let err = f.hub.unregister(&conn("nobody")).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownConnection);
    }

    #[tokio::test]
    async fn disconnect_takes_device_offline_and_detaches_monitor() {
        let f = setup().await;
        let c = conn("screen");
        f.hub.register(&c, Registration::new("main-screen")).unwrap();
        f.hub.monitor_subscribe(&c);

        f.hub.disconnect(&c);

        assert!(f.hub.registry().live_sessions(DeviceId::MainScreen, None).is_empty());
        assert_eq!(f.hub.monitor().observer_count(), 0);
    }

    #[tokio::test]
    async fn reset_skips_sender_and_is_recorded() {
        let f = setup().await;
        let sender = conn("admin");

        let relayed = f
            .hub
            .reset(
                Some(&sender),
                ResetRequest {
                    source: Some("admin-ipad".into()),
                    reason: Some("new team".into()),
                    ..ResetRequest::default()
                },
            )
            .unwrap();

        assert_eq!(relayed, 3);
        let broadcasts = f.transport.broadcasts.lock().unwrap();
        let (event, payload, except) = broadcasts.last().unwrap();
        assert_eq!(event, SDK_RESET);
        assert_eq!(payload["source"], "admin-ipad");
        assert_eq!(except.as_ref(), Some(&sender));
        assert!(f.bus.has_event(HubEventKind::SdkReset));
        assert_eq!(f.hub.monitor().history().last().unwrap().channel, "sdk:reset");
    }

    #[tokio::test]
    async fn reset_from_unknown_source_is_rejected() {
        let f = setup().await;
        let err = f
            .hub
            .reset(
                None,
                ResetRequest {
                    source: Some("toaster".into()),
                    ..ResetRequest::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownDevice);
        assert!(!f.bus.has_event(HubEventKind::SdkReset));
    }

    #[tokio::test]
    async fn blank_previous_message_clears_and_broadcasts() {
        let f = setup().await;
        f.hub.set_previous_message("hello", Some("Blue"));
        let cleared = f.hub.set_previous_message("   ", Some("Blue"));

        assert!(cleared.message.is_empty());
        assert!(cleared.team_name.is_empty());
        let broadcasts = f.transport.broadcasts.lock().unwrap();
        assert_eq!(
            broadcasts
                .iter()
                .filter(|(e, _, _)| e == PREVIOUS_MESSAGE)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn hardware_event_is_relayed_and_monitored() {
        let f = setup().await;
        f.hub.hardware_event(
            DeviceId::ButtonsArduino,
            InstanceId::default(),
            "buttons:pressed",
            Some(json!({"button": 2})),
        );

        let broadcasts = f.transport.broadcasts.lock().unwrap();
        assert_eq!(broadcasts[0].0, "buttons:pressed");
        let recorded = f.hub.monitor().history();
        assert_eq!(recorded.last().unwrap().source, "buttons-arduino");
    }
}
