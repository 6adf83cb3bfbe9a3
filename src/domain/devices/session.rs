//! Device sessions, connection history, and list summaries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{DeviceId, DeviceKind, TransportMode};
use crate::domain::foundation::{ConnectionId, InstanceId, Timestamp};

/// Free-form metadata a device reports about itself.
pub type DeviceMetadata = Map<String, Value>;

/// One connect/disconnect span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionHistoryEntry {
    pub connected_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnected_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ConnectionHistoryEntry {
    pub fn open(connected_at: Timestamp) -> Self {
        Self {
            connected_at,
            disconnected_at: None,
            duration_ms: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.disconnected_at.is_none()
    }

    /// Closes the span. Closing twice keeps the first close.
    pub fn close(&mut self, at: Timestamp) {
        if self.is_open() {
            self.disconnected_at = Some(at);
            self.duration_ms = Some(at.millis_since(&self.connected_at));
        }
    }
}

/// Live or last-known connection of one device instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSession {
    pub device: DeviceId,
    pub instance_id: InstanceId,
    pub connection_id: ConnectionId,
    pub connected_at: Timestamp,
    pub last_seen_at: Timestamp,
    pub transport: TransportMode,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: DeviceMetadata,
    pub registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// False once the channel closed or the watchdog demoted it.
    pub connected: bool,
}

impl DeviceSession {
    pub fn new(
        device: DeviceId,
        instance_id: InstanceId,
        connection_id: ConnectionId,
        transport: TransportMode,
        metadata: DeviceMetadata,
        at: Timestamp,
    ) -> Self {
        Self {
            device,
            instance_id,
            connection_id,
            connected_at: at,
            last_seen_at: at,
            transport,
            metadata,
            registered: true,
            latency_ms: None,
            connected: true,
        }
    }

    /// Milliseconds since the last sign of life.
    pub fn silence_ms(&self, now: Timestamp) -> u64 {
        now.millis_since(&self.last_seen_at)
    }
}

/// Online flag as shown to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Online,
    Offline,
}

/// One row of the device list. Identities that never connected get a
/// placeholder row with no session fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub device: DeviceId,
    pub label: &'static str,
    pub kind: DeviceKind,
    pub transport: TransportMode,
    pub instance_id: InstanceId,
    pub status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<Timestamp>,
    pub registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: DeviceMetadata,
    pub history: Vec<ConnectionHistoryEntry>,
}

impl DeviceSummary {
    /// Row for an identity with no known session.
    pub fn placeholder(device: DeviceId) -> Self {
        let descriptor = device.descriptor();
        Self {
            device,
            label: descriptor.label,
            kind: descriptor.kind,
            transport: descriptor.transport,
            instance_id: InstanceId::default(),
            status: ConnectionStatus::Offline,
            connection_id: None,
            connected_at: None,
            last_seen_at: None,
            registered: false,
            latency_ms: None,
            metadata: DeviceMetadata::new(),
            history: Vec::new(),
        }
    }

    pub fn from_session(session: &DeviceSession, history: &[ConnectionHistoryEntry]) -> Self {
        let descriptor = session.device.descriptor();
        Self {
            device: session.device,
            label: descriptor.label,
            kind: descriptor.kind,
            transport: session.transport,
            instance_id: session.instance_id.clone(),
            status: if session.connected {
                ConnectionStatus::Online
            } else {
                ConnectionStatus::Offline
            },
            connection_id: Some(session.connection_id.clone()),
            connected_at: Some(session.connected_at),
            last_seen_at: Some(session.last_seen_at),
            registered: session.registered,
            latency_ms: session.latency_ms,
            metadata: session.metadata.clone(),
            history: history.to_vec(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == ConnectionStatus::Online
    }
}
