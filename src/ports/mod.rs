//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the hub and the outside world. Adapters implement these ports.
//!
//! ## Event Ports
//!
//! - `EventPublisher` - Port for publishing hub events
//! - `EventSubscriber` - Port for subscribing to hub events
//! - `EventHandler` - Handler that processes incoming events
//!
//! ## Delivery and Storage
//!
//! - `Transport` - Named message delivery to device channels
//! - `DurableStorage` - Keyed byte records that survive restarts

mod durable_storage;
mod event_publisher;
mod event_subscriber;
mod transport;

pub use durable_storage::{DurableStorage, StorageError};
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
pub use transport::Transport;
