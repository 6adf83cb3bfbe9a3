//! Data transfer objects for the hardware bridge.
//!
//! Field names follow what the controller firmware sends, so the controller
//! id travels as `id` on connect and `arduinoId` afterwards.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::devices::DeviceMetadata;
use crate::domain::foundation::{ConnectionId, DomainError, InstanceId, Timestamp};

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Request body for POST /connect.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    /// Catalog identity of the controller.
    pub id: String,
    pub ip: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<DeviceMetadata>,
}

impl ConnectRequest {
    /// Instance id of the controller. Defaults to its identity.
    pub fn instance(&self) -> InstanceId {
        hardware_instance(self.instance_id.as_deref(), &self.id)
    }
}

/// Request body for POST /heartbeat.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    pub arduino_id: String,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub latency_ms: Option<u64>,
}

impl HeartbeatRequest {
    pub fn connection_id(&self) -> ConnectionId {
        ConnectionId::hardware(&hardware_instance(
            self.instance_id.as_deref(),
            &self.arduino_id,
        ))
    }
}

/// Request body for POST /dispatch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub arduino_id: String,
    #[serde(default)]
    pub instance_id: Option<String>,
    pub event: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl DispatchRequest {
    pub fn connection_id(&self) -> ConnectionId {
        ConnectionId::hardware(&hardware_instance(
            self.instance_id.as_deref(),
            &self.arduino_id,
        ))
    }
}

fn hardware_instance(instance_id: Option<&str>, identity: &str) -> InstanceId {
    match instance_id.map(str::trim) {
        Some(id) if !id.is_empty() => InstanceId::new(id),
        _ => InstanceId::new(identity.trim()),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub status: &'static str,
    pub arduino_id: String,
    pub instance_id: InstanceId,
    pub connection_id: ConnectionId,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatResponse {
    pub status: &'static str,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchResponse {
    pub status: &'static str,
    pub relayed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: Timestamp,
}

/// Error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            details: None,
        }
    }
}

impl From<&DomainError> for ErrorResponse {
    fn from(error: &DomainError) -> Self {
        let details = if error.details.is_empty() {
            None
        } else {
            serde_json::to_value(&error.details).ok()
        };
        Self {
            code: error.code.to_string(),
            message: error.message.clone(),
            details,
        }
    }
}
