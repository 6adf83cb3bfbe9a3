//! WebSocket message types for the hub protocol.
//!
//! Every frame is a JSON text message:
//! - Client → Server: `{event, payload?, ack?}`
//! - Server → Client: `{event, payload, ack?}`
//!
//! A client frame carrying `ack` is answered with an `ack` frame holding the
//! same id and an [`AckPayload`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::devices::{DeviceMetadata, TransportMode};
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::storage::ModifyOptions;

/// Event name of acknowledgement frames.
pub const ACK_EVENT: &str = "ack";

// ============================================
// Frames
// ============================================

/// Frame received from a client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub ack: Option<u64>,
}

/// Frame sent to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerFrame {
    pub event: String,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
}

impl ServerFrame {
    pub fn event(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
            ack: None,
        }
    }

    pub fn ack(id: u64, payload: &AckPayload) -> Self {
        Self {
            event: ACK_EVENT.to_string(),
            payload: serde_json::to_value(payload).unwrap_or(Value::Null),
            ack: Some(id),
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Normalized result of a client request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AckPayload {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AckPayload {
    pub fn success(data: Option<Value>) -> Self {
        Self {
            ok: true,
            code: None,
            message: None,
            data,
        }
    }

    pub fn failure(error: &DomainError) -> Self {
        Self {
            ok: false,
            code: Some(error.code),
            message: Some(error.message.clone()),
            data: None,
        }
    }
}

// ============================================
// Client events
// ============================================

/// Events a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    Register,
    Unregister,
    Heartbeat,
    Execute,
    ModifyStorage,
    SubscribeStorage,
    UnsubscribeStorage,
    MonitorSubscribe,
    MonitorUnsubscribe,
    AdminState,
    PreviousMessageGet,
    PreviousMessageSet,
    Reset,
}

impl ClientEvent {
    pub const ALL: [ClientEvent; 13] = [
        ClientEvent::Register,
        ClientEvent::Unregister,
        ClientEvent::Heartbeat,
        ClientEvent::Execute,
        ClientEvent::ModifyStorage,
        ClientEvent::SubscribeStorage,
        ClientEvent::UnsubscribeStorage,
        ClientEvent::MonitorSubscribe,
        ClientEvent::MonitorUnsubscribe,
        ClientEvent::AdminState,
        ClientEvent::PreviousMessageGet,
        ClientEvent::PreviousMessageSet,
        ClientEvent::Reset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientEvent::Register => "device:register",
            ClientEvent::Unregister => "device:unregister",
            ClientEvent::Heartbeat => "device:heartbeat",
            ClientEvent::Execute => "direct:execute",
            ClientEvent::ModifyStorage => "modify-storage",
            ClientEvent::SubscribeStorage => "subscribe-storage",
            ClientEvent::UnsubscribeStorage => "unsubscribe-storage",
            ClientEvent::MonitorSubscribe => "monitor:subscribe",
            ClientEvent::MonitorUnsubscribe => "monitor:unsubscribe",
            ClientEvent::AdminState => "admin:state",
            ClientEvent::PreviousMessageGet => "previous-message:get",
            ClientEvent::PreviousMessageSet => "previous-message:set",
            ClientEvent::Reset => "sdk:reset",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == name)
    }
}

// ============================================
// Client payloads
// ============================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub device: String,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<DeviceMetadata>,
    #[serde(default)]
    pub transport: Option<TransportMode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeartbeatPayload {
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutePayload {
    pub target: String,
    pub command: String,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_instance_id: Option<String>,
    #[serde(default)]
    pub target_instance_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModifyStoragePayload {
    #[serde(default)]
    pub patch: Value,
    #[serde(flatten)]
    pub options: ModifyOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubscribeStoragePayload {
    pub keys: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviousMessagePayload {
    pub message: String,
    pub team_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetPayload {
    pub source: Option<String>,
    pub source_instance_id: Option<String>,
    pub reason: Option<String>,
    pub metadata: Option<Value>,
}

/// Decodes a client payload. A missing payload reads as an empty object.
pub fn decode_payload<T: DeserializeOwned>(
    event: ClientEvent,
    payload: Value,
) -> Result<T, DomainError> {
    let payload = match payload {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(payload).map_err(|err| {
        DomainError::new(
            ErrorCode::InvalidMessage,
            format!("Malformed {} payload: {}", event.as_str(), err),
        )
        .with_detail("event", event.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_frame_defaults_payload_and_ack() {
        let frame: ClientFrame = serde_json::from_str(r#"{"event":"admin:state"}"#).unwrap();
        assert_eq!(frame.event, "admin:state");
        assert_eq!(frame.payload, Value::Null);
        assert_eq!(frame.ack, None);
    }

    #[test]
    fn event_frames_omit_ack() {
        let text = ServerFrame::event("devices:list", json!({"devices": []}))
            .to_text()
            .unwrap();
        assert_eq!(text, r#"{"event":"devices:list","payload":{"devices":[]}}"#);
    }

    #[test]
    fn failure_ack_carries_code_and_message() {
        let error = DomainError::unknown_device("toaster");
        let frame = ServerFrame::ack(7, &AckPayload::failure(&error));

        assert_eq!(frame.event, ACK_EVENT);
        assert_eq!(frame.ack, Some(7));
        assert_eq!(frame.payload["ok"], false);
        assert_eq!(frame.payload["code"], "UNKNOWN_DEVICE");
        assert!(frame.payload.get("data").is_none());
    }

    #[test]
    fn every_client_event_name_resolves() {
        for event in ClientEvent::ALL {
            assert_eq!(ClientEvent::from_name(event.as_str()), Some(event));
        }
        assert_eq!(ClientEvent::from_name("register"), None);
    }

    #[test]
    fn modify_payload_flattens_options() {
        let payload: ModifyStoragePayload = decode_payload(
            ClientEvent::ModifyStorage,
            json!({"patch": {"a": 1}, "persistKeys": ["a"]}),
        )
        .unwrap();

        assert_eq!(payload.patch, json!({"a": 1}));
        assert_eq!(payload.options.persist_keys, vec!["a".to_string()]);
        assert!(!payload.options.persist);
    }

    #[test]
    fn null_payload_decodes_as_empty_object() {
        let payload: HeartbeatPayload =
            decode_payload(ClientEvent::Heartbeat, Value::Null).unwrap();
        assert_eq!(payload.latency_ms, None);
    }

    #[test]
    fn malformed_payload_is_invalid_message() {
        let err = decode_payload::<ExecutePayload>(ClientEvent::Execute, json!({"target": 3}))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidMessage);
        assert_eq!(err.details.get("event").map(String::as_str), Some("direct:execute"));
    }
}
