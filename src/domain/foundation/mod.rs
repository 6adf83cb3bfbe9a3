//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, and error types
//! that form the vocabulary of the hub.

mod errors;
mod ids;
mod timestamp;

pub use errors::{DomainError, ErrorCode};
pub use ids::{ConnectionId, InstanceId, DEFAULT_INSTANCE_ID};
pub use timestamp::Timestamp;
