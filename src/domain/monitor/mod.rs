//! Monitor telemetry types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::devices::DeviceId;
use crate::domain::foundation::{InstanceId, Timestamp};

/// Default capacity of the monitor history.
pub const MONITOR_HISTORY_CAPACITY: usize = 200;

/// Source recorded for events the hub itself originates.
pub const HUB_SOURCE: &str = "hub";

/// What produced a monitor event. Not part of the wire shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MonitorEventKind {
    Command,
    Hardware,
    Persistence,
    Reset,
    #[default]
    Custom,
}

/// One entry of the monitor history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorEvent {
    pub at: Timestamp,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
    #[serde(skip)]
    pub kind: MonitorEventKind,
}

impl MonitorEvent {
    pub fn new(source: impl Into<String>, channel: impl Into<String>, at: Timestamp) -> Self {
        Self {
            at,
            source: source.into(),
            target: None,
            channel: channel.into(),
            detail: None,
            kind: MonitorEventKind::Custom,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn with_kind(mut self, kind: MonitorEventKind) -> Self {
        self.kind = kind;
        self
    }

    /// Reads a boolean flag from the detail object.
    pub fn detail_flag(&self, key: &str) -> Option<bool> {
        self.detail.as_ref()?.get(key)?.as_bool()
    }

    /// Reads a string field from the detail object.
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.detail.as_ref()?.get(key)?.as_str()
    }
}

/// Live heartbeat, streamed but never kept in history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorHeartbeat {
    pub device: DeviceId,
    pub instance_id: InstanceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    pub at: Timestamp,
}

/// One latency measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySample {
    pub device: DeviceId,
    pub instance_id: InstanceId,
    pub latency_ms: u64,
    pub at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape_omits_kind_and_empty_fields() {
        let event = MonitorEvent::new("tablet-feedback", "tabletActivity", Timestamp::from_millis(7))
            .with_kind(MonitorEventKind::Command);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(
            value,
            json!({"at": 7, "source": "tablet-feedback", "channel": "tabletActivity"})
        );
    }

    #[test]
    fn detail_accessors_read_object_fields() {
        let event = MonitorEvent::new("hub", "start", Timestamp::from_millis(1))
            .with_detail(json!({"delivered": false, "event": "start"}));

        assert_eq!(event.detail_flag("delivered"), Some(false));
        assert_eq!(event.detail_str("event"), Some("start"));
        assert_eq!(event.detail_str("missing"), None);
    }

    #[test]
    fn heartbeat_serializes_camel_case() {
        let beat = MonitorHeartbeat {
            device: DeviceId::ButtonsArduino,
            instance_id: InstanceId::default(),
            latency_ms: Some(40),
            at: Timestamp::from_millis(9),
        };
        let value = serde_json::to_value(&beat).unwrap();
        assert_eq!(value["instanceId"], "default");
        assert_eq!(value["latencyMs"], 40);
    }
}
