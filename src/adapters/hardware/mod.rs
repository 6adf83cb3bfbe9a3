//! Hardware controller adapters.
//!
//! Controllers have no persistent channel. Commands reach them over HTTP
//! ([`HttpHardwareTransport`]), and [`CompositeTransport`] lets the hub treat
//! them and socket clients as one transport.

mod composite;
mod http_transport;

pub use composite::CompositeTransport;
pub use http_transport::{HardwareAddress, HttpHardwareTransport, DEFAULT_HARDWARE_PORT};
