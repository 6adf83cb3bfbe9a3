//! Transport port - Named message delivery to device channels.
//!
//! The hub never touches sockets or HTTP clients directly. Every outbound
//! message goes through this port, addressed by connection id.

use serde_json::Value;

use crate::domain::foundation::ConnectionId;

/// Port for delivering named messages to connected channels.
///
/// Sends are fire-and-forget. A `true` result means the message was handed
/// to a live channel, not that the device processed it.
pub trait Transport: Send + Sync {
    /// Sends one named message to one channel.
    ///
    /// Returns `false` when the channel is unknown or already closed.
    fn send(&self, connection_id: &ConnectionId, event: &str, payload: &Value) -> bool;

    /// Sends one named message to every channel except `except`.
    ///
    /// Returns the number of channels the message was handed to.
    fn broadcast(&self, event: &str, payload: &Value, except: Option<&ConnectionId>) -> usize;
}
