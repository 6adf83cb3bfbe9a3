//! Heartbeat timeout watchdog.
//!
//! Periodically demotes hardware sessions whose last heartbeat is older than
//! the configured timeout. The registry publishes the disconnection, so
//! every bus subscriber (device list fan-out, monitor) hears about it.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 10s | How often to scan |
//! | `timeout` | 30s | Silence after which a session is demoted |

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use super::DeviceRegistry;
use crate::domain::devices::DeviceSession;
use crate::domain::foundation::Timestamp;

#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10_000),
            timeout: Duration::from_millis(30_000),
        }
    }
}

impl WatchdogConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct HeartbeatWatchdog {
    registry: Arc<DeviceRegistry>,
    config: WatchdogConfig,
}

impl HeartbeatWatchdog {
    pub fn new(registry: Arc<DeviceRegistry>, config: WatchdogConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// Runs one scan at `now`, returning the demoted sessions.
    pub fn scan_at(&self, now: Timestamp) -> Vec<DeviceSession> {
        let timeout_ms = u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX);
        self.registry.demote_stale(now, timeout_ms)
    }

    /// Scans on every tick until the shutdown channel flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        tracing::info!(
            interval_ms = self.config.interval.as_millis() as u64,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "Heartbeat watchdog started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Heartbeat watchdog stopped");
                        return;
                    }
                }
                _ = interval.tick() => {
                    let demoted = self.scan_at(Timestamp::now());
                    if !demoted.is_empty() {
                        tracing::debug!(count = demoted.len(), "Watchdog scan demoted sessions");
                    }
                }
            }
        }
    }
}
