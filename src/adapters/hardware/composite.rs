//! Transport that splits traffic between sockets and hardware controllers.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::foundation::ConnectionId;
use crate::ports::Transport;

/// Routes addressed sends by connection id and broadcasts to sockets only.
pub struct CompositeTransport {
    sockets: Arc<dyn Transport>,
    hardware: Arc<dyn Transport>,
}

impl CompositeTransport {
    pub fn new(sockets: Arc<dyn Transport>, hardware: Arc<dyn Transport>) -> Self {
        Self { sockets, hardware }
    }

    fn route(&self, connection_id: &ConnectionId) -> &Arc<dyn Transport> {
        if connection_id.is_hardware() {
            &self.hardware
        } else {
            &self.sockets
        }
    }
}

impl Transport for CompositeTransport {
    fn send(&self, connection_id: &ConnectionId, event: &str, payload: &Value) -> bool {
        self.route(connection_id).send(connection_id, event, payload)
    }

    fn broadcast(&self, event: &str, payload: &Value, except: Option<&ConnectionId>) -> usize {
        self.sockets.broadcast(event, payload, except)
    }
}
