//! Operator console read model.
//!
//! The admin snapshot is derived entirely from registry summaries, monitor
//! history, and latency samples. Nothing here is mutated independently.

use serde::Serialize;
use serde_json::Value;

use crate::domain::devices::{
    ConnectionStatus, DeviceId, DeviceKind, DeviceMetadata, DeviceSummary, TransportMode,
};
use crate::domain::foundation::{InstanceId, Timestamp};
use crate::domain::monitor::{LatencySample, MonitorEvent, MonitorEventKind};

/// One device row on the operator console.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDeviceSnapshot {
    pub device: DeviceId,
    pub label: &'static str,
    pub kind: DeviceKind,
    pub instance_id: InstanceId,
    pub transport: TransportMode,
    pub connection_status: ConnectionStatus,
    pub registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "DeviceMetadata::is_empty")]
    pub metadata: DeviceMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_command_at: Option<Timestamp>,
}

/// One monitor event as shown on the console.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminEventSnapshot {
    pub id: String,
    pub at: Timestamp,
    #[serde(rename = "type")]
    pub kind: MonitorEventKind,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

/// Consolidated console snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStateSnapshot {
    pub devices: Vec<AdminDeviceSnapshot>,
    pub events: Vec<AdminEventSnapshot>,
    pub latency_history: Vec<LatencySample>,
    pub updated_at: Timestamp,
}

impl AdminStateSnapshot {
    /// Derives the snapshot from its inputs.
    ///
    /// `history` pairs each monitor event with its sequence number. The
    /// latest command event aimed at a device row becomes its last command.
    pub fn derive(
        summaries: &[DeviceSummary],
        history: &[(u64, MonitorEvent)],
        latency: &[LatencySample],
        now: Timestamp,
    ) -> Self {
        let devices = summaries
            .iter()
            .map(|summary| {
                let last = last_command_for(summary, history);
                AdminDeviceSnapshot {
                    device: summary.device,
                    label: summary.label,
                    kind: summary.kind,
                    instance_id: summary.instance_id.clone(),
                    transport: summary.transport,
                    connection_status: summary.status,
                    registered: summary.registered,
                    connected_at: summary.connected_at,
                    last_seen_at: summary.last_seen_at,
                    latency_ms: summary.latency_ms,
                    metadata: summary.metadata.clone(),
                    last_command: last.map(|event| event.channel.clone()),
                    last_command_at: last.map(|event| event.at),
                }
            })
            .collect();

        let events = history
            .iter()
            .map(|(seq, event)| AdminEventSnapshot {
                id: format!("evt-{}", seq),
                at: event.at,
                kind: event.kind,
                source: event.source.clone(),
                target: event.target.clone(),
                channel: event.channel.clone(),
                detail: event.detail.clone(),
            })
            .collect();

        Self {
            devices,
            events,
            latency_history: latency.to_vec(),
            updated_at: now,
        }
    }
}

fn last_command_for<'a>(
    summary: &DeviceSummary,
    history: &'a [(u64, MonitorEvent)],
) -> Option<&'a MonitorEvent> {
    history
        .iter()
        .rev()
        .map(|(_, event)| event)
        .filter(|event| event.kind == MonitorEventKind::Command)
        .filter(|event| event.target.as_deref() == Some(summary.device.as_str()))
        .find(|event| match event.detail_str("targetInstanceId") {
            Some(instance) => instance == summary.instance_id.as_str(),
            None => true,
        })
}
