//! Domain layer containing hub vocabulary and pure rules.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, errors)
//! - `devices` - Device catalog, command table, sessions
//! - `events` - Closed set of hub events carried by the bus
//! - `storage` - Patch validation and merge for the shared state store
//! - `monitor` - Monitor events, heartbeats, latency samples
//! - `admin` - Derived operator console snapshot
//! - `previous_message` - Small durable "previous message" record

pub mod admin;
pub mod devices;
pub mod events;
pub mod foundation;
pub mod monitor;
pub mod previous_message;
pub mod storage;
