//! HTTP handlers for the hardware bridge.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::hardware::{HardwareAddress, HttpHardwareTransport};
use crate::application::{Hub, Registration};
use crate::domain::devices::TransportMode;
use crate::domain::foundation::{ConnectionId, DomainError, ErrorCode, Timestamp};

use super::dto::{
    ConnectRequest, ConnectResponse, DispatchRequest, DispatchResponse, ErrorResponse,
    HealthResponse, HeartbeatRequest, HeartbeatResponse,
};

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct HardwareHandlers {
    hub: Arc<Hub>,
    transport: Arc<HttpHardwareTransport>,
}

impl HardwareHandlers {
    pub fn new(hub: Arc<Hub>, transport: Arc<HttpHardwareTransport>) -> Self {
        Self { hub, transport }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// POST /connect - Register a controller and remember its address
pub async fn connect(
    State(handlers): State<HardwareHandlers>,
    Json(req): Json<ConnectRequest>,
) -> Response {
    let instance_id = req.instance();
    let connection_id = ConnectionId::hardware(&instance_id);

    let mut registration = Registration::new(req.id.clone())
        .instance(instance_id.clone())
        .transport(TransportMode::Http);
    if let Some(metadata) = req.metadata.clone() {
        registration = registration.metadata(metadata);
    }

    match handlers.hub.register(&connection_id, registration) {
        Ok(_) => {
            handlers
                .transport
                .remember(connection_id.clone(), HardwareAddress::new(req.ip, req.port));
            let response = ConnectResponse {
                status: "registered",
                arduino_id: req.id,
                instance_id,
                connection_id,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => handle_domain_error(e),
    }
}

/// POST /heartbeat - Refresh a controller's liveness
pub async fn heartbeat(
    State(handlers): State<HardwareHandlers>,
    Json(req): Json<HeartbeatRequest>,
) -> Response {
    match handlers.hub.heartbeat(&req.connection_id(), req.latency_ms) {
        Ok(session) => {
            let response = HeartbeatResponse {
                status: "alive",
                timestamp: session.last_seen_at,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => handle_domain_error(e),
    }
}

/// POST /dispatch - Relay an event raised by a controller
pub async fn dispatch(
    State(handlers): State<HardwareHandlers>,
    Json(req): Json<DispatchRequest>,
) -> Response {
    let connection_id = req.connection_id();
    let registry = handlers.hub.registry();

    let Some(session) = registry.find_by_connection_id(&connection_id) else {
        return handle_domain_error(
            DomainError::new(ErrorCode::UnknownConnection, "Controller is not registered")
                .with_detail("arduinoId", req.arduino_id),
        );
    };
    registry.touch(&connection_id);

    tracing::debug!(
        device = %session.device,
        instance_id = %session.instance_id,
        event = %req.event,
        "Hardware event received"
    );
    let relayed = handlers.hub.hardware_event(
        session.device,
        session.instance_id,
        &req.event,
        req.data,
    );

    let response = DispatchResponse {
        status: "received",
        relayed,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// GET /health - Liveness probe
pub async fn health() -> Response {
    let response = HealthResponse {
        status: "ok",
        timestamp: Timestamp::now(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

// ════════════════════════════════════════════════════════════════════════════
// Error handling
// ════════════════════════════════════════════════════════════════════════════

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::UnknownDevice
        | ErrorCode::UnknownTarget
        | ErrorCode::InvalidPatch
        | ErrorCode::InvalidMessage => StatusCode::BAD_REQUEST,
        ErrorCode::NoLiveSession | ErrorCode::UnknownConnection => StatusCode::NOT_FOUND,
        ErrorCode::PersistenceFailure | ErrorCode::InternalError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn handle_domain_error(error: DomainError) -> Response {
    let status = status_for(error.code);
    if status.is_server_error() {
        tracing::error!(code = %error.code, message = %error.message, "Hardware request failed");
        return (status, Json(ErrorResponse::internal(error.message))).into_response();
    }
    (status, Json(ErrorResponse::from(&error))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_device_maps_to_400() {
        let response = handle_domain_error(DomainError::unknown_device("toaster"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unregistered_controller_maps_to_404() {
        let error = DomainError::new(ErrorCode::UnknownConnection, "Controller is not registered");
        assert_eq!(handle_domain_error(error).status(), StatusCode::NOT_FOUND);

        let error = DomainError::new(ErrorCode::NoLiveSession, "Superseded");
        assert_eq!(handle_domain_error(error).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_errors_map_to_500() {
        let error = DomainError::new(ErrorCode::InternalError, "boom");
        assert_eq!(
            handle_domain_error(error).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
