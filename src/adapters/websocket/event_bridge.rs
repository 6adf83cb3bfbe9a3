//! Event bridge fanning registry changes out to every connection.
//!
//! # Event Flow
//!
//! ```text
//! Registry publishes HubEvent
//!          │
//!          ▼
//! ┌──────────────────────┐
//! │ DeviceBroadcastBridge│
//! │  receives event      │
//! └──────────────────────┘
//!          │
//!          ▼
//! ┌──────────────────────┐
//! │  Broadcast to every  │
//! │  open connection     │
//! └──────────────────────┘
//! ```

use std::sync::Arc;

use serde_json::json;

use crate::application::DEVICES_LIST;
use crate::domain::events::{HubEvent, HubEventKind};
use crate::domain::foundation::DomainError;
use crate::ports::{EventHandler, EventSubscriber, Transport};

pub const DEVICES_LATENCY: &str = "devices:latency";
pub const DEVICES_UNREGISTERED: &str = "devices:unregistered";

/// Event kinds the bridge relays.
pub const DEVICE_EVENT_KINDS: &[HubEventKind] = &[
    HubEventKind::DeviceListChanged,
    HubEventKind::DeviceDisconnected,
    HubEventKind::DeviceHeartbeat,
];

pub struct DeviceBroadcastBridge {
    transport: Arc<dyn Transport>,
}

impl DeviceBroadcastBridge {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Create as an Arc (for sharing with event subscriber).
    pub fn new_shared(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self::new(transport))
    }

    /// Register this bridge with an event subscriber.
    pub fn register(self: &Arc<Self>, subscriber: &dyn EventSubscriber) {
        subscriber.subscribe_all(DEVICE_EVENT_KINDS, self.clone());
    }
}

impl EventHandler for DeviceBroadcastBridge {
    fn handle(&self, event: &HubEvent) -> Result<(), DomainError> {
        match event {
            HubEvent::DeviceListChanged { devices } => {
                self.transport
                    .broadcast(DEVICES_LIST, &json!({ "devices": devices }), None);
            }
            HubEvent::DeviceDisconnected {
                device,
                instance_id,
                ..
            } => {
                self.transport.broadcast(
                    DEVICES_UNREGISTERED,
                    &json!({ "device": device, "instanceId": instance_id }),
                    None,
                );
            }
            HubEvent::DeviceHeartbeat {
                device,
                instance_id,
                latency_ms: Some(latency_ms),
                ..
            } => {
                self.transport.broadcast(
                    DEVICES_LATENCY,
                    &json!({
                        "device": device,
                        "instanceId": instance_id,
                        "latencyMs": latency_ms,
                    }),
                    None,
                );
            }
            _ => {}
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "DeviceBroadcastBridge"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::websocket::ConnectionManager;
    use crate::application::{DeviceRegistry, Registration};
    use crate::domain::events::DisconnectReason;
    use crate::domain::foundation::ConnectionId;
    use serde_json::Value;

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<String>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(text) = rx.try_recv() {
            frames.push(serde_json::from_str(&text).unwrap());
        }
        frames
    }

    fn setup() -> (Arc<ConnectionManager>, Arc<DeviceRegistry>) {
        let bus = Arc::new(InMemoryEventBus::new());
        let connections = Arc::new(ConnectionManager::new());
        let bridge = DeviceBroadcastBridge::new_shared(connections.clone());
        bridge.register(bus.as_ref());
        (connections, Arc::new(DeviceRegistry::new(bus)))
    }

    #[test]
    fn registration_broadcasts_device_list() {
        let (connections, registry) = setup();
        let (_watcher, mut rx) = connections.open();

        registry
            .register(&ConnectionId::from_string("screen"), Registration::new("main-screen"))
            .unwrap();

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"], DEVICES_LIST);
    }

    #[test]
    fn disconnect_broadcasts_unregistered_then_list() {
        let (connections, registry) = setup();
        let conn = ConnectionId::from_string("screen");
        registry
            .register(&conn, Registration::new("main-screen").instance("a"))
            .unwrap();
        let (_watcher, mut rx) = connections.open();

        registry.disconnect(&conn, DisconnectReason::ChannelClosed);

        let frames = drain(&mut rx);
        assert_eq!(frames[0]["event"], DEVICES_UNREGISTERED);
        assert_eq!(frames[0]["payload"]["device"], "main-screen");
        assert_eq!(frames[0]["payload"]["instanceId"], "a");
        assert_eq!(frames[1]["event"], DEVICES_LIST);
    }

    #[test]
    fn only_heartbeats_with_latency_are_broadcast() {
        let (connections, registry) = setup();
        let conn = ConnectionId::from_string("screen");
        registry
            .register(&conn, Registration::new("main-screen"))
            .unwrap();
        let (_watcher, mut rx) = connections.open();

        registry.heartbeat(&conn, None).unwrap();
        registry.heartbeat(&conn, Some(25)).unwrap();

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"], DEVICES_LATENCY);
        assert_eq!(frames[0]["payload"]["latencyMs"], 25);
    }
}
