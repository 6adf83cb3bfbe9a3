//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Instance id used when a device registers without one.
pub const DEFAULT_INSTANCE_ID: &str = "default";

const HARDWARE_PREFIX: &str = "hw:";

/// Unique identifier for one physical channel.
///
/// Socket channels get a random UUID on connect. Hardware controllers have no
/// persistent channel, so their id is derived from the instance id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Creates a new random socket ConnectionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates the connection id for a request/response hardware controller.
    pub fn hardware(instance_id: &InstanceId) -> Self {
        Self(format!("{}{}", HARDWARE_PREFIX, instance_id.as_str()))
    }

    /// Creates a ConnectionId from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// True for ids minted by [`ConnectionId::hardware`].
    pub fn is_hardware(&self) -> bool {
        self.0.starts_with(HARDWARE_PREFIX)
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Disambiguates physical units that share one device identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Resolves an optional wire value, falling back to the default sentinel.
    ///
    /// Blank strings count as omitted.
    pub fn resolve(id: Option<&str>) -> Self {
        match id.map(str::trim) {
            Some(s) if !s.is_empty() => Self(s.to_string()),
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self(DEFAULT_INSTANCE_ID.to_string())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn hardware_connection_id_is_derived_from_instance() {
        let conn = ConnectionId::hardware(&InstanceId::new("arduino-1"));
        assert_eq!(conn.as_str(), "hw:arduino-1");
        assert!(conn.is_hardware());
        assert!(!ConnectionId::new().is_hardware());
    }

    #[test]
    fn instance_id_defaults_to_sentinel() {
        assert_eq!(InstanceId::resolve(None).as_str(), DEFAULT_INSTANCE_ID);
        assert_eq!(InstanceId::resolve(Some("  ")).as_str(), DEFAULT_INSTANCE_ID);
        assert_eq!(InstanceId::resolve(Some("left")).as_str(), "left");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&InstanceId::new("a")).unwrap();
        assert_eq!(json, "\"a\"");
    }
}
