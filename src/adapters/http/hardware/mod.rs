//! HTTP adapter for hardware controllers.

mod dto;
mod handlers;
mod routes;

pub use dto::{
    ConnectRequest, ConnectResponse, DispatchRequest, DispatchResponse, ErrorResponse,
    HealthResponse, HeartbeatRequest, HeartbeatResponse,
};
pub use handlers::HardwareHandlers;
pub use routes::hardware_routes;
