//! Process assembly.
//!
//! Wires one hub to the socket and hardware transports and exposes the
//! combined axum router. The binary owns the listener and shutdown; tests
//! drive [`assemble`] directly with in-memory storage.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::adapters::events::InMemoryEventBus;
use crate::adapters::hardware::{CompositeTransport, HttpHardwareTransport};
use crate::adapters::http::hardware::{hardware_routes, HardwareHandlers};
use crate::adapters::websocket::{
    websocket_router, ConnectionManager, DeviceBroadcastBridge, WebSocketState,
};
use crate::application::Hub;
use crate::config::{AppConfig, ConfigError, ServerConfig, ValidationError};
use crate::ports::{DurableStorage, StorageError, Transport};

/// Errors that stop the process from starting or serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to load durable state: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to create hardware HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A fully wired hub and the router serving it.
pub struct HubServer {
    pub hub: Arc<Hub>,
    pub connections: Arc<ConnectionManager>,
    pub hardware: Arc<HttpHardwareTransport>,
    pub router: Router,
}

/// Builds the hub, its transports and the HTTP surface.
pub async fn assemble(
    config: &AppConfig,
    storage: Arc<dyn DurableStorage>,
) -> Result<HubServer, ServerError> {
    let bus = Arc::new(InMemoryEventBus::new());
    let connections = Arc::new(ConnectionManager::new());
    let hardware = Arc::new(HttpHardwareTransport::new(
        config.hub.hardware_command_timeout(),
    )?);
    let transport: Arc<dyn Transport> = Arc::new(CompositeTransport::new(
        connections.clone(),
        hardware.clone(),
    ));

    let bridge = DeviceBroadcastBridge::new_shared(connections.clone());
    bridge.register(bus.as_ref());

    let hub = Arc::new(Hub::build(&config.hub, bus, storage, transport).await?);

    let router = Router::new()
        .merge(websocket_router(WebSocketState::new(
            connections.clone(),
            hub.clone(),
        )))
        .merge(hardware_routes(HardwareHandlers::new(
            hub.clone(),
            hardware.clone(),
        )))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server));

    tracing::info!(
        devices = hub.registry().list_summaries().len(),
        data_dir = %config.hub.data_dir.display(),
        "Hub assembled"
    );

    Ok(HubServer {
        hub,
        connections,
        hardware,
        router,
    })
}

/// CORS policy. No configured origins means any origin.
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins_list()
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::InMemoryDurableStorage;

    #[tokio::test]
    async fn assemble_seeds_storage_and_lists_catalog() {
        let storage = Arc::new(InMemoryDurableStorage::new());
        let server = assemble(&AppConfig::default(), storage).await.unwrap();

        assert!(server.hub.store().get("status").is_some());
        assert!(server.hub.store().get("timer").is_some());
        assert_eq!(server.hub.registry().list_summaries().len(), 7);
        assert!(server.connections.is_empty());
    }
}
