//! Fixed device catalog.
//!
//! Every device that may join the experience is known at deployment time.
//! Identity resolution is an exact match against this list.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::DomainError;

/// Closed set of device identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceId {
    AdminIpad,
    MainScreen,
    TabletFeedback,
    Totem,
    ButtonsGame,
    AiApp,
    ButtonsArduino,
}

/// Broad category of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    App,
    Hardware,
    Service,
}

/// How the hub talks to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Persistent bidirectional channel.
    Socket,
    /// Request/response; liveness comes from heartbeats only.
    Http,
}

/// Static description of one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub kind: DeviceKind,
    pub transport: TransportMode,
    pub label: &'static str,
}

impl DeviceId {
    /// All identities in catalog order.
    pub const ALL: [DeviceId; 7] = [
        DeviceId::AdminIpad,
        DeviceId::MainScreen,
        DeviceId::TabletFeedback,
        DeviceId::Totem,
        DeviceId::ButtonsGame,
        DeviceId::AiApp,
        DeviceId::ButtonsArduino,
    ];

    /// Wire name of the identity.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceId::AdminIpad => "admin-ipad",
            DeviceId::MainScreen => "main-screen",
            DeviceId::TabletFeedback => "tablet-feedback",
            DeviceId::Totem => "totem",
            DeviceId::ButtonsGame => "buttons-game",
            DeviceId::AiApp => "ai-app",
            DeviceId::ButtonsArduino => "buttons-arduino",
        }
    }

    pub fn descriptor(&self) -> DeviceDescriptor {
        let (kind, transport, label) = match self {
            DeviceId::AdminIpad => (DeviceKind::App, TransportMode::Socket, "Admin iPad"),
            DeviceId::MainScreen => (DeviceKind::App, TransportMode::Socket, "Main Screen"),
            DeviceId::TabletFeedback => {
                (DeviceKind::App, TransportMode::Socket, "Tablet Feedback")
            }
            DeviceId::Totem => (DeviceKind::App, TransportMode::Socket, "Totem"),
            DeviceId::ButtonsGame => (DeviceKind::App, TransportMode::Socket, "Buttons Game"),
            DeviceId::AiApp => (DeviceKind::App, TransportMode::Socket, "AI App"),
            DeviceId::ButtonsArduino => {
                (DeviceKind::Hardware, TransportMode::Http, "Buttons Arduino")
            }
        };
        DeviceDescriptor {
            id: *self,
            kind,
            transport,
            label,
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.descriptor().kind
    }

    /// Transport mode declared by the catalog.
    pub fn transport(&self) -> TransportMode {
        self.descriptor().transport
    }

    pub fn label(&self) -> &'static str {
        self.descriptor().label
    }

    /// Position in catalog order.
    pub fn ordinal(&self) -> usize {
        Self::ALL
            .iter()
            .position(|id| id == self)
            .unwrap_or(Self::ALL.len())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| DomainError::unknown_device(s))
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Socket => f.write_str("socket"),
            TransportMode::Http => f.write_str("http"),
        }
    }
}
