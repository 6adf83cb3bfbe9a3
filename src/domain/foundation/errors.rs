//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use serde::Serialize;

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Catalog errors
    UnknownDevice,
    UnknownTarget,

    // Routing errors
    NoLiveSession,
    UnknownConnection,

    // Storage errors
    InvalidPatch,
    PersistenceFailure,

    // Boundary errors
    InvalidMessage,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::UnknownDevice => "UNKNOWN_DEVICE",
            ErrorCode::UnknownTarget => "UNKNOWN_TARGET",
            ErrorCode::NoLiveSession => "NO_LIVE_SESSION",
            ErrorCode::UnknownConnection => "UNKNOWN_CONNECTION",
            ErrorCode::InvalidPatch => "INVALID_PATCH",
            ErrorCode::PersistenceFailure => "PERSISTENCE_FAILURE",
            ErrorCode::InvalidMessage => "INVALID_MESSAGE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Identity is not part of the device catalog.
    pub fn unknown_device(identity: impl Into<String>) -> Self {
        let identity = identity.into();
        Self::new(
            ErrorCode::UnknownDevice,
            format!("Device '{}' is not in the catalog", identity),
        )
        .with_detail("device", identity)
    }

    /// Command target is not part of the device catalog.
    pub fn unknown_target(identity: impl Into<String>) -> Self {
        let identity = identity.into();
        Self::new(
            ErrorCode::UnknownTarget,
            format!("Target '{}' is not in the catalog", identity),
        )
        .with_detail("target", identity)
    }

    /// Storage patch was rejected before any merge happened.
    pub fn invalid_patch(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPatch, reason)
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::NoLiveSession, "Nobody home");
        assert_eq!(format!("{}", err), "[NO_LIVE_SESSION] Nobody home");
    }

    #[test]
    fn unknown_device_carries_identity_detail() {
        let err = DomainError::unknown_device("toaster");
        assert_eq!(err.code, ErrorCode::UnknownDevice);
        assert_eq!(err.details.get("device"), Some(&"toaster".to_string()));
        assert!(err.message.contains("toaster"));
    }

    #[test]
    fn unknown_target_uses_its_own_code() {
        let err = DomainError::unknown_target("toaster");
        assert_eq!(err.code, ErrorCode::UnknownTarget);
        assert_eq!(err.details.get("target"), Some(&"toaster".to_string()));
    }

    #[test]
    fn error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::InvalidPatch).unwrap();
        assert_eq!(json, "\"INVALID_PATCH\"");
    }

    #[test]
    fn error_code_display_matches_serialization() {
        for code in [
            ErrorCode::UnknownDevice,
            ErrorCode::UnknownTarget,
            ErrorCode::NoLiveSession,
            ErrorCode::UnknownConnection,
            ErrorCode::InvalidPatch,
            ErrorCode::PersistenceFailure,
            ErrorCode::InvalidMessage,
            ErrorCode::InternalError,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code));
        }
    }
}
