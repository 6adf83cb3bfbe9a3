//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind host: {0}")]
    InvalidHost(String),

    #[error("Data directory must not be empty")]
    EmptyDataDir,

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("Watchdog interval ({interval_ms}ms) exceeds heartbeat timeout ({timeout_ms}ms)")]
    WatchdogSlowerThanTimeout { interval_ms: u64, timeout_ms: u64 },
}
