//! Outbound delivery to hardware controllers over HTTP.
//!
//! Controllers expose a single `POST /control` endpoint that takes
//! `{command, payload}`. Delivery is fire-and-forget: `send` reports whether
//! the controller's address is known, and the request itself runs on a
//! spawned task whose failures are only logged.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::domain::foundation::ConnectionId;
use crate::ports::Transport;

/// Port used when a controller registers without one.
pub const DEFAULT_HARDWARE_PORT: u16 = 8080;

/// Network address of one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareAddress {
    pub ip: String,
    pub port: u16,
}

impl HardwareAddress {
    pub fn new(ip: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            ip: ip.into(),
            port: port.unwrap_or(DEFAULT_HARDWARE_PORT),
        }
    }

    /// Builds the command endpoint URL.
    pub fn control_url(&self) -> String {
        format!("http://{}:{}/control", self.ip, self.port)
    }
}

#[derive(Debug, Serialize)]
struct ControlRequest<'a> {
    command: &'a str,
    payload: &'a Value,
}

/// HTTP transport for hardware sessions.
pub struct HttpHardwareTransport {
    client: Client,
    timeout: Duration,
    addresses: RwLock<HashMap<ConnectionId, HardwareAddress>>,
}

impl HttpHardwareTransport {
    /// Creates a transport whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            timeout,
            addresses: RwLock::new(HashMap::new()),
        })
    }

    /// Records where a controller can be reached, replacing any earlier address.
    pub fn remember(&self, connection_id: ConnectionId, address: HardwareAddress) {
        tracing::debug!(
            connection_id = %connection_id,
            url = %address.control_url(),
            "Hardware address recorded"
        );
        self.addresses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connection_id, address);
    }

    pub fn forget(&self, connection_id: &ConnectionId) -> Option<HardwareAddress> {
        self.addresses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(connection_id)
    }

    pub fn address(&self, connection_id: &ConnectionId) -> Option<HardwareAddress> {
        self.addresses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(connection_id)
            .cloned()
    }

    async fn post_command(client: Client, url: String, timeout: Duration, body: Value) {
        match client.post(&url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(url = %url, "Hardware command delivered");
            }
            Ok(response) => {
                tracing::warn!(
                    url = %url,
                    status = %response.status(),
                    "Hardware controller rejected command"
                );
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!(
                    url = %url,
                    timeout_ms = timeout.as_millis() as u64,
                    "Hardware command timed out"
                );
            }
            Err(e) if e.is_connect() => {
                tracing::warn!(url = %url, error = %e, "Hardware controller unreachable");
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Hardware command failed");
            }
        }
    }
}

impl Transport for HttpHardwareTransport {
    fn send(&self, connection_id: &ConnectionId, event: &str, payload: &Value) -> bool {
        let Some(address) = self.address(connection_id) else {
            tracing::debug!(connection_id = %connection_id, "No address for hardware channel");
            return false;
        };

        let body = match serde_json::to_value(ControlRequest {
            command: event,
            payload,
        }) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(event = %event, error = %e, "Control request serialization failed");
                return false;
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(Self::post_command(
                    self.client.clone(),
                    address.control_url(),
                    self.timeout,
                    body,
                ));
                true
            }
            Err(_) => {
                tracing::error!(
                    connection_id = %connection_id,
                    "No runtime available, hardware command dropped"
                );
                false
            }
        }
    }

    /// Hardware controllers only receive addressed commands.
    fn broadcast(&self, _event: &str, _payload: &Value, _except: Option<&ConnectionId>) -> usize {
        0
    }
}
