//! HTTP routes for the hardware bridge.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{connect, dispatch, health, heartbeat, HardwareHandlers};

/// Creates the hardware bridge router.
pub fn hardware_routes(handlers: HardwareHandlers) -> Router {
    Router::new()
        .route("/connect", post(connect))
        .route("/heartbeat", post(heartbeat))
        .route("/dispatch", post(dispatch))
        .route("/health", get(health))
        .with_state(handlers)
}
