//! WebSocket upgrade handler for hub connections.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Allocate a connection id and outbound queue
//! 2. Send the current device list
//! 3. Dispatch client frames until disconnect
//! 4. Release every registration, subscription and observer of the channel

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};

use super::{
    connections::ConnectionManager,
    dispatch::MessageDispatcher,
    messages::ClientFrame,
};
use crate::application::Hub;

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub connections: Arc<ConnectionManager>,
    pub dispatcher: MessageDispatcher,
}

impl WebSocketState {
    pub fn new(connections: Arc<ConnectionManager>, hub: Arc<Hub>) -> Self {
        Self {
            connections,
            dispatcher: MessageDispatcher::new(hub),
        }
    }
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WebSocketState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Runs for the lifetime of one connection.
async fn handle_socket(socket: WebSocket, state: WebSocketState) {
    let (mut sender, mut receiver) = socket.split();
    let (connection_id, mut outbox) = state.connections.open();
    let hub = state.dispatcher.hub().clone();

    tracing::info!(connection_id = %connection_id, "Client connected");
    hub.connect(&connection_id);

    // Forward queued frames to the socket
    let mut send_task = {
        let connection_id = connection_id.clone();
        tokio::spawn(async move {
            while let Some(text) = outbox.recv().await {
                if let Err(e) = sender.send(Message::Text(text)).await {
                    tracing::debug!(
                        connection_id = %connection_id,
                        "Send error, closing connection: {}",
                        e
                    );
                    break;
                }
            }
        })
    };

    // Dispatch incoming frames
    let mut recv_task = {
        let connection_id = connection_id.clone();
        let connections = state.connections.clone();
        let dispatcher = state.dispatcher.clone();
        tokio::spawn(async move {
            while let Some(result) = receiver.next().await {
                match result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                        Ok(frame) => {
                            if let Some(ack) = dispatcher.dispatch(&connection_id, frame) {
                                connections.send_frame(&connection_id, &ack);
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                connection_id = %connection_id,
                                "Ignoring malformed frame: {}",
                                e
                            );
                        }
                    },
                    Ok(Message::Binary(_)) => {
                        tracing::warn!(
                            connection_id = %connection_id,
                            "Received unsupported binary message"
                        );
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(_)) => {
                        tracing::debug!(
                            connection_id = %connection_id,
                            "Client sent close frame"
                        );
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(
                            connection_id = %connection_id,
                            "Receive error: {}",
                            e
                        );
                        break;
                    }
                }
            }
        })
    };

    // Wait for either side to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.connections.close(&connection_id);
    hub.disconnect(&connection_id);
    tracing::info!(connection_id = %connection_id, "Client disconnected");
}

/// Create axum router for the WebSocket endpoint.
pub fn websocket_router(state: WebSocketState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}
