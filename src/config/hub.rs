//! Hub configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::error::ValidationError;

/// Hub tuning: persistence location, heartbeat policy and buffer sizes.
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Directory holding durable records
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Silence after which a hardware session is demoted
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,

    /// Watchdog scan period
    #[serde(default = "default_watchdog_interval_ms")]
    pub watchdog_interval_ms: u64,

    /// Monitor history capacity
    #[serde(default = "default_monitor_capacity")]
    pub monitor_capacity: usize,

    /// Latency samples kept for the admin view
    #[serde(default = "default_latency_window")]
    pub latency_window: usize,

    /// Request timeout for commands sent to hardware
    #[serde(default = "default_hardware_command_timeout_ms")]
    pub hardware_command_timeout_ms: u64,
}

impl HubConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn hardware_command_timeout(&self) -> Duration {
        Duration::from_millis(self.hardware_command_timeout_ms)
    }

    /// Validate hub configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ValidationError::EmptyDataDir);
        }
        if self.heartbeat_timeout_ms == 0 {
            return Err(ValidationError::ZeroValue("heartbeat_timeout_ms"));
        }
        if self.watchdog_interval_ms == 0 {
            return Err(ValidationError::ZeroValue("watchdog_interval_ms"));
        }
        if self.monitor_capacity == 0 {
            return Err(ValidationError::ZeroValue("monitor_capacity"));
        }
        if self.latency_window == 0 {
            return Err(ValidationError::ZeroValue("latency_window"));
        }
        if self.hardware_command_timeout_ms == 0 {
            return Err(ValidationError::ZeroValue("hardware_command_timeout_ms"));
        }
        if self.watchdog_interval_ms > self.heartbeat_timeout_ms {
            return Err(ValidationError::WatchdogSlowerThanTimeout {
                interval_ms: self.watchdog_interval_ms,
                timeout_ms: self.heartbeat_timeout_ms,
            });
        }
        Ok(())
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            watchdog_interval_ms: default_watchdog_interval_ms(),
            monitor_capacity: default_monitor_capacity(),
            latency_window: default_latency_window(),
            hardware_command_timeout_ms: default_hardware_command_timeout_ms(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_heartbeat_timeout_ms() -> u64 {
    30_000
}

fn default_watchdog_interval_ms() -> u64 {
    10_000
}

fn default_monitor_capacity() -> usize {
    crate::domain::monitor::MONITOR_HISTORY_CAPACITY
}

fn default_latency_window() -> usize {
    200
}

fn default_hardware_command_timeout_ms() -> u64 {
    10_000
}
