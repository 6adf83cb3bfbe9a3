//! Hub events.
//!
//! Every notification that crosses component boundaries is one variant of
//! [`HubEvent`]. Subscribers register for a [`HubEventKind`] and receive
//! events synchronously, in registration order.

use serde_json::Value;

use crate::domain::devices::{
    CommandEnvelope, ConnectionHistoryEntry, DeviceId, DeviceSession, DeviceSummary, TransportMode,
};
use crate::domain::foundation::{ConnectionId, InstanceId, Timestamp};

/// Why a session left the connected state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    ChannelClosed,
    Unregistered,
    HeartbeatTimeout,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::ChannelClosed => "channel-closed",
            DisconnectReason::Unregistered => "unregistered",
            DisconnectReason::HeartbeatTimeout => "heartbeat-timeout",
        }
    }
}

/// One resolved recipient of a routed command.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRecipient {
    pub connection_id: ConnectionId,
    pub instance_id: InstanceId,
    pub transport: TransportMode,
    pub delivered: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    DeviceRegistered {
        session: DeviceSession,
        /// Canonical connection this registration replaced, if any.
        superseded: Option<ConnectionId>,
    },
    DeviceListChanged {
        devices: Vec<DeviceSummary>,
    },
    DeviceDisconnected {
        device: DeviceId,
        instance_id: InstanceId,
        connection_id: ConnectionId,
        reason: DisconnectReason,
        at: Timestamp,
        history: Vec<ConnectionHistoryEntry>,
    },
    DeviceHeartbeat {
        device: DeviceId,
        instance_id: InstanceId,
        latency_ms: Option<u64>,
        at: Timestamp,
    },
    CommandRouted {
        envelope: CommandEnvelope,
        event_name: String,
        recipients: Vec<RouteRecipient>,
        at: Timestamp,
    },
    StorageChanged {
        changed_keys: Vec<String>,
        persisted: bool,
    },
    PersistenceFailed {
        key: String,
        error: String,
        at: Timestamp,
    },
    HardwareEvent {
        device: DeviceId,
        instance_id: InstanceId,
        event: String,
        data: Option<Value>,
        at: Timestamp,
    },
    SdkReset {
        source: Option<DeviceId>,
        source_instance_id: Option<InstanceId>,
        reason: Option<String>,
        at: Timestamp,
    },
}

/// Discriminant used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HubEventKind {
    DeviceRegistered,
    DeviceListChanged,
    DeviceDisconnected,
    DeviceHeartbeat,
    CommandRouted,
    StorageChanged,
    PersistenceFailed,
    HardwareEvent,
    SdkReset,
}

impl HubEventKind {
    pub const ALL: [HubEventKind; 9] = [
        HubEventKind::DeviceRegistered,
        HubEventKind::DeviceListChanged,
        HubEventKind::DeviceDisconnected,
        HubEventKind::DeviceHeartbeat,
        HubEventKind::CommandRouted,
        HubEventKind::StorageChanged,
        HubEventKind::PersistenceFailed,
        HubEventKind::HardwareEvent,
        HubEventKind::SdkReset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HubEventKind::DeviceRegistered => "device.registered",
            HubEventKind::DeviceListChanged => "device.list_changed",
            HubEventKind::DeviceDisconnected => "device.disconnected",
            HubEventKind::DeviceHeartbeat => "device.heartbeat",
            HubEventKind::CommandRouted => "command.routed",
            HubEventKind::StorageChanged => "storage.changed",
            HubEventKind::PersistenceFailed => "storage.persistence_failed",
            HubEventKind::HardwareEvent => "hardware.event",
            HubEventKind::SdkReset => "sdk.reset",
        }
    }
}

impl HubEvent {
    pub fn kind(&self) -> HubEventKind {
        match self {
            HubEvent::DeviceRegistered { .. } => HubEventKind::DeviceRegistered,
            HubEvent::DeviceListChanged { .. } => HubEventKind::DeviceListChanged,
            HubEvent::DeviceDisconnected { .. } => HubEventKind::DeviceDisconnected,
            HubEvent::DeviceHeartbeat { .. } => HubEventKind::DeviceHeartbeat,
            HubEvent::CommandRouted { .. } => HubEventKind::CommandRouted,
            HubEvent::StorageChanged { .. } => HubEventKind::StorageChanged,
            HubEvent::PersistenceFailed { .. } => HubEventKind::PersistenceFailed,
            HubEvent::HardwareEvent { .. } => HubEventKind::HardwareEvent,
            HubEvent::SdkReset { .. } => HubEventKind::SdkReset,
        }
    }
}
