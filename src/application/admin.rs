//! Admin state aggregator.

use std::sync::Arc;

use super::{DeviceRegistry, LatencyWindow, MonitorAggregator};
use crate::domain::admin::AdminStateSnapshot;
use crate::domain::foundation::Timestamp;

/// Builds the operator console snapshot on demand. Holds no state of its own.
pub struct AdminStateAggregator {
    registry: Arc<DeviceRegistry>,
    monitor: Arc<MonitorAggregator>,
    latency: Arc<LatencyWindow>,
}

impl AdminStateAggregator {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        monitor: Arc<MonitorAggregator>,
        latency: Arc<LatencyWindow>,
    ) -> Self {
        Self {
            registry,
            monitor,
            latency,
        }
    }

    pub fn snapshot(&self) -> AdminStateSnapshot {
        self.snapshot_at(Timestamp::now())
    }

    pub fn snapshot_at(&self, now: Timestamp) -> AdminStateSnapshot {
        AdminStateSnapshot::derive(
            &self.registry.list_summaries(),
            &self.monitor.history_with_ids(),
            &self.latency.samples(),
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::application::{CommandRouter, Registration, SendOptions};
    use crate::domain::devices::{ConnectionStatus, DeviceId};
    use crate::domain::foundation::ConnectionId;
    use crate::ports::Transport;
    use serde_json::{json, Value};

    struct AcceptingTransport;

    impl Transport for AcceptingTransport {
        fn send(&self, _: &ConnectionId, _: &str, _: &Value) -> bool {
            true
        }

        fn broadcast(&self, _: &str, _: &Value, _: Option<&ConnectionId>) -> usize {
            0
        }
    }

    struct Fixture {
        registry: Arc<DeviceRegistry>,
        router: CommandRouter,
        admin: AdminStateAggregator,
    }

    fn setup() -> Fixture {
        let bus = Arc::new(InMemoryEventBus::new());
        let transport: Arc<dyn Transport> = Arc::new(AcceptingTransport);
        let registry = Arc::new(DeviceRegistry::new(bus.clone()));
        let monitor = Arc::new(MonitorAggregator::new(200, transport.clone()));
        let latency = Arc::new(LatencyWindow::new(50));
        monitor.register(bus.as_ref());
        latency.register(bus.as_ref());

        let router = CommandRouter::new(registry.clone(), transport, bus);
        let admin = AdminStateAggregator::new(registry.clone(), monitor, latency);
        Fixture {
            registry,
            router,
            admin,
        }
    }

    #[test]
    fn snapshot_lists_every_catalog_device() {
        let f = setup();
        let snapshot = f.admin.snapshot();

        assert_eq!(snapshot.devices.len(), DeviceId::ALL.len());
        assert!(snapshot
            .devices
            .iter()
            .all(|d| d.connection_status == ConnectionStatus::Offline));
        assert!(snapshot.events.is_empty());
    }

    #[test]
    fn snapshot_reflects_registry_monitor_and_latency() {
        let f = setup();
        let conn = ConnectionId::from_string("screen");
        f.registry
            .register(&conn, Registration::new("main-screen"))
            .unwrap();
        f.registry.heartbeat(&conn, Some(12)).unwrap();
        f.router
            .send(
                "main-screen",
                "showImage",
                Some(json!({"image": "a.png"})),
                SendOptions::default(),
            )
            .unwrap();

        let snapshot = f.admin.snapshot();
        let screen = snapshot
            .devices
            .iter()
            .find(|d| d.device == DeviceId::MainScreen)
            .unwrap();

        assert_eq!(screen.connection_status, ConnectionStatus::Online);
        assert_eq!(screen.last_command.as_deref(), Some("showImage"));
        assert_eq!(snapshot.events.len(), 1);
        assert_eq!(snapshot.latency_history.len(), 1);
        assert_eq!(snapshot.latency_history[0].latency_ms, 12);
    }

    #[test]
    fn snapshot_is_deterministic_for_fixed_inputs() {
        let f = setup();
        let now = Timestamp::from_millis(1_000);
        assert_eq!(f.admin.snapshot_at(now), f.admin.snapshot_at(now));
    }
}
