//! Devices module - catalog, command table, and session model.

mod catalog;
mod commands;
mod session;

pub use catalog::{DeviceDescriptor, DeviceId, DeviceKind, TransportMode};
pub use commands::{CommandEnvelope, CommandSpec, PayloadShape};
pub use session::{
    ConnectionHistoryEntry, ConnectionStatus, DeviceMetadata, DeviceSession, DeviceSummary,
};
