//! HTTP adapters - REST endpoints.
//!
//! Only hardware controllers use plain HTTP; everything else talks over
//! the WebSocket adapter.

pub mod hardware;

pub use hardware::{hardware_routes, HardwareHandlers};
