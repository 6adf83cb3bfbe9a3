//! Application layer - the hub's stateful components.
//!
//! Each component owns its state behind a lock and publishes what happened
//! on the event bus. [`Hub`] assembles them for the transport adapters.

mod admin;
mod hub;
mod monitor;
mod persistence;
mod previous_message;
mod registry;
mod router;
mod storage;
mod watchdog;

pub use admin::AdminStateAggregator;
pub use hub::{Hub, ResetRequest, DEVICES_LIST, PREVIOUS_MESSAGE, SDK_RESET, STORAGE_UPDATE};
pub use monitor::{
    LatencyWindow, MonitorAggregator, MONITOR_EVENT, MONITOR_HEARTBEAT, MONITOR_HISTORY,
};
pub use persistence::{PersistenceWriter, WriterState};
pub use previous_message::PreviousMessageStore;
pub use registry::{DeviceRegistry, Registration};
pub use router::{CommandRouter, RouteOutcome, SendOptions};
pub use storage::{SharedStateStore, StorageSubscriber, SubscriptionId};
pub use watchdog::{HeartbeatWatchdog, WatchdogConfig};
