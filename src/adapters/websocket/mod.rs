//! WebSocket transport for hub clients.
//!
//! This module provides the concrete transport the hub runs on: one
//! WebSocket per device or console, JSON frames in both directions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        ws_handler (per socket)                       │
//! │   - Opens a connection in ConnectionManager                         │
//! │   - Decodes ClientFrame → MessageDispatcher → Hub                   │
//! │   - Writes ack frames back on the same connection                   │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ hub operations
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                               Hub                                    │
//! │   registry │ router │ store │ monitor │ admin │ previous message    │
//! └─────────────────────────────────────────────────────────────────────┘
//!                    │                                 │
//!                    │ Transport::send / broadcast     │ HubEvent
//!                    ▼                                 ▼
//! ┌──────────────────────────────────┐   ┌──────────────────────────────┐
//! │        ConnectionManager         │◄──│    DeviceBroadcastBridge     │
//! │  conn-a ─► outbox ─► socket      │   │  devices:list / latency /    │
//! │  conn-b ─► outbox ─► socket      │   │  unregistered                │
//! └──────────────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`messages`] - Frame and payload types
//! - [`connections`] - Open sockets and their outbound queues
//! - [`dispatch`] - Client event → hub operation mapping
//! - [`handler`] - Axum WebSocket upgrade handler
//! - [`event_bridge`] - Bus → broadcast relay for registry changes

pub mod connections;
pub mod dispatch;
pub mod event_bridge;
pub mod handler;
pub mod messages;

pub use connections::{ConnectionManager, Outbox};
pub use dispatch::{MessageDispatcher, ADMIN_STATE};
pub use event_bridge::{
    DeviceBroadcastBridge, DEVICES_LATENCY, DEVICES_UNREGISTERED, DEVICE_EVENT_KINDS,
};
pub use handler::{websocket_router, ws_handler, WebSocketState};
pub use messages::{AckPayload, ClientEvent, ClientFrame, ServerFrame, ACK_EVENT};
