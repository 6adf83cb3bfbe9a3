//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the hub to external systems:
//! - `events` - In-process event bus
//! - `storage` - Durable record storage (file, in-memory)
//! - `websocket` - Socket transport for application devices
//! - `hardware` - HTTP transport for hardware controllers
//! - `http` - Request/response endpoints for hardware controllers

pub mod events;
pub mod hardware;
pub mod http;
pub mod storage;
pub mod websocket;

pub use events::InMemoryEventBus;
