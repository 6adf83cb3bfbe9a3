//! Fleet Hub - Coordination hub for a fleet of interactive devices
//!
//! Touch displays, a tablet, an operator console and embedded hardware
//! controllers connect to one hub that tracks their sessions, routes
//! commands between them, shares a key-value store and keeps a bounded
//! monitor history for the operator.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod server;
