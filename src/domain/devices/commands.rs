//! Per-device command table and the command envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DeviceId;
use crate::domain::foundation::{DomainError, ErrorCode, InstanceId};

/// Shape a command payload must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// No payload expected. Anything sent is ignored.
    None,
    /// Any JSON object.
    Object,
    /// A JSON object carrying the listed fields.
    ObjectWith(&'static [&'static str]),
}

/// One entry of a device's command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    /// Event name emitted to the target's channel.
    pub event: &'static str,
    pub payload: PayloadShape,
}

const MAIN_SCREEN_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "tabletActivity",
        event: "tablet-activity",
        payload: PayloadShape::Object,
    },
    CommandSpec {
        name: "showImage",
        event: "show-image",
        payload: PayloadShape::ObjectWith(&["image"]),
    },
];

const TOTEM_COMMANDS: &[CommandSpec] = &[CommandSpec {
    name: "start",
    event: "start",
    payload: PayloadShape::ObjectWith(&["phase"]),
}];

const BUTTONS_GAME_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "setState",
        event: "set-state",
        payload: PayloadShape::ObjectWith(&["buttons"]),
    },
    CommandSpec {
        name: "command",
        event: "command",
        payload: PayloadShape::ObjectWith(&["action"]),
    },
];

const AI_APP_COMMANDS: &[CommandSpec] = &[CommandSpec {
    name: "start",
    event: "start",
    payload: PayloadShape::None,
}];

const BUTTONS_ARDUINO_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "start",
        event: "start",
        payload: PayloadShape::Object,
    },
    CommandSpec {
        name: "reset",
        event: "reset",
        payload: PayloadShape::Object,
    },
];

impl DeviceId {
    /// Commands this device accepts.
    pub fn commands(&self) -> &'static [CommandSpec] {
        match self {
            DeviceId::MainScreen => MAIN_SCREEN_COMMANDS,
            DeviceId::Totem => TOTEM_COMMANDS,
            DeviceId::ButtonsGame => BUTTONS_GAME_COMMANDS,
            DeviceId::AiApp => AI_APP_COMMANDS,
            DeviceId::ButtonsArduino => BUTTONS_ARDUINO_COMMANDS,
            DeviceId::AdminIpad | DeviceId::TabletFeedback => &[],
        }
    }

    pub fn command(&self, name: &str) -> Option<&'static CommandSpec> {
        self.commands().iter().find(|spec| spec.name == name)
    }

    /// Outbound event name for a command, falling back to the command itself.
    pub fn event_name(&self, command: &str) -> String {
        self.command(command)
            .map(|spec| spec.event.to_string())
            .unwrap_or_else(|| command.to_string())
    }
}

impl CommandSpec {
    /// Checks a payload against the declared shape.
    ///
    /// For the devices and tools that produce commands. The router forwards
    /// payloads as given and does not call this.
    pub fn validate(&self, payload: Option<&Value>) -> Result<(), DomainError> {
        let required: &[&str] = match self.payload {
            PayloadShape::None => return Ok(()),
            PayloadShape::Object => &[],
            PayloadShape::ObjectWith(fields) => fields,
        };

        let object = match payload {
            Some(Value::Object(map)) => map,
            None if required.is_empty() => return Ok(()),
            _ => {
                return Err(DomainError::new(
                    ErrorCode::InvalidMessage,
                    format!("Command '{}' expects an object payload", self.name),
                )
                .with_detail("command", self.name))
            }
        };

        match required.iter().find(|field| !object.contains_key(**field)) {
            Some(missing) => Err(DomainError::new(
                ErrorCode::InvalidMessage,
                format!("Command '{}' requires field '{}'", self.name, missing),
            )
            .with_detail("command", self.name)
            .with_detail("field", *missing)),
            None => Ok(()),
        }
    }
}

/// Addressed point-to-point command. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    pub target: DeviceId,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<DeviceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_instance_id: Option<InstanceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_instance_id: Option<InstanceId>,
}

impl CommandEnvelope {
    pub fn new(target: DeviceId, command: impl Into<String>) -> Self {
        Self {
            target,
            command: command.into(),
            payload: None,
            source: None,
            source_instance_id: None,
            target_instance_id: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn from_source(mut self, source: DeviceId, instance_id: Option<InstanceId>) -> Self {
        self.source = Some(source);
        self.source_instance_id = instance_id;
        self
    }

    pub fn to_instance(mut self, instance_id: InstanceId) -> Self {
        self.target_instance_id = Some(instance_id);
        self
    }
}
