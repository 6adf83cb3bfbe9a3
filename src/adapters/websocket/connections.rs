//! Live WebSocket connections.
//!
//! Each open socket owns an unbounded outbound queue. Sending never blocks:
//! the frame is serialized and queued, and the socket's writer task drains
//! the queue. A send to a closed or unknown connection reports `false`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde_json::Value;
use tokio::sync::mpsc;

use super::messages::ServerFrame;
use crate::domain::foundation::ConnectionId;
use crate::ports::Transport;

/// Outbound queue of one connection.
pub type Outbox = mpsc::UnboundedReceiver<String>;

/// Registry of open sockets, keyed by connection id.
#[derive(Default)]
pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a connection id and its outbound queue.
    pub fn open(&self) -> (ConnectionId, Outbox) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), tx);
        tracing::debug!(connection_id = %id, "Connection opened");
        (id, rx)
    }

    /// Forgets a connection. Returns false if it was already gone.
    pub fn close(&self, id: &ConnectionId) -> bool {
        let removed = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some();
        if removed {
            tracing::debug!(connection_id = %id, "Connection closed");
        }
        removed
    }

    pub fn is_open(&self, id: &ConnectionId) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queues a prepared frame for one connection.
    pub fn send_frame(&self, id: &ConnectionId, frame: &ServerFrame) -> bool {
        let text = match frame.to_text() {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(event = %frame.event, error = %err, "Frame serialization failed");
                return false;
            }
        };
        let connections = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        connections
            .get(id)
            .map(|tx| tx.send(text).is_ok())
            .unwrap_or(false)
    }
}

impl Transport for ConnectionManager {
    fn send(&self, connection_id: &ConnectionId, event: &str, payload: &Value) -> bool {
        self.send_frame(connection_id, &ServerFrame::event(event, payload.clone()))
    }

    fn broadcast(&self, event: &str, payload: &Value, except: Option<&ConnectionId>) -> usize {
        let text = match ServerFrame::event(event, payload.clone()).to_text() {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(event = %event, error = %err, "Frame serialization failed");
                return 0;
            }
        };
        let connections = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        connections
            .iter()
            .filter(|(id, _)| Some(*id) != except)
            .filter(|(_, tx)| tx.send(text.clone()).is_ok())
            .count()
    }
}
