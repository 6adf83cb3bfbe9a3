//! Command router.
//!
//! Delivers an addressed command to every canonical live session of the
//! target. Delivery is fail-soft: an offline target is a normal outcome,
//! reported as zero deliveries and recorded on the bus like any other attempt.

use std::sync::Arc;

use serde_json::Value;

use super::DeviceRegistry;
use crate::domain::devices::{CommandEnvelope, DeviceId};
use crate::domain::events::{HubEvent, RouteRecipient};
use crate::domain::foundation::{ConnectionId, DomainError, InstanceId, Timestamp};
use crate::ports::{EventPublisher, Transport};

/// Outcome of one routing attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteOutcome {
    pub event_name: String,
    pub recipients: Vec<RouteRecipient>,
}

impl RouteOutcome {
    /// Number of channels the command was handed to.
    pub fn delivered(&self) -> usize {
        self.recipients.iter().filter(|r| r.delivered).count()
    }

    pub fn is_delivered(&self) -> bool {
        self.delivered() > 0
    }
}

/// Optional addressing for [`CommandRouter::send`].
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub source: Option<String>,
    pub source_instance_id: Option<InstanceId>,
    pub target_instance_id: Option<InstanceId>,
}

pub struct CommandRouter {
    registry: Arc<DeviceRegistry>,
    transport: Arc<dyn Transport>,
    publisher: Arc<dyn EventPublisher>,
}

impl CommandRouter {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        transport: Arc<dyn Transport>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            registry,
            transport,
            publisher,
        }
    }

    /// Sends a command by wire identity.
    ///
    /// # Errors
    ///
    /// `UnknownTarget` when the target is not in the catalog, `UnknownDevice`
    /// when a source is given and is not in the catalog. No event is
    /// published for rejected calls.
    pub fn send(
        &self,
        target: &str,
        command: &str,
        payload: Option<Value>,
        options: SendOptions,
    ) -> Result<RouteOutcome, DomainError> {
        let target: DeviceId = target
            .parse()
            .map_err(|_| DomainError::unknown_target(target))?;
        let source = options
            .source
            .as_deref()
            .map(str::parse::<DeviceId>)
            .transpose()?;

        let envelope = CommandEnvelope {
            target,
            command: command.to_string(),
            payload,
            source,
            source_instance_id: options.source_instance_id,
            target_instance_id: options.target_instance_id,
        };
        Ok(self.route(envelope, None))
    }

    /// Routes an already validated envelope.
    ///
    /// `sender` is the channel the envelope arrived on, if any. Its session
    /// counts as seen.
    pub fn route(&self, envelope: CommandEnvelope, sender: Option<&ConnectionId>) -> RouteOutcome {
        let event_name = envelope.target.event_name(&envelope.command);
        let payload = envelope.payload.clone().unwrap_or(Value::Null);

        // Instance-agnostic commands fan out to every instance of the target
        let sessions = self
            .registry
            .live_sessions(envelope.target, envelope.target_instance_id.as_ref());

        let recipients: Vec<RouteRecipient> = sessions
            .into_iter()
            .map(|session| {
                let delivered = self
                    .transport
                    .send(&session.connection_id, &event_name, &payload);
                RouteRecipient {
                    connection_id: session.connection_id,
                    instance_id: session.instance_id,
                    transport: session.transport,
                    delivered,
                }
            })
            .collect();

        let outcome = RouteOutcome {
            event_name,
            recipients,
        };

        if outcome.is_delivered() {
            tracing::debug!(
                device = %envelope.target,
                command = %envelope.command,
                delivered = outcome.delivered(),
                "Command routed"
            );
        } else {
            tracing::info!(
                device = %envelope.target,
                command = %envelope.command,
                instance_id = envelope.target_instance_id.as_ref().map(|i| i.as_str()),
                "Command not delivered, no live session"
            );
        }

        if let Err(err) = self.publisher.publish(HubEvent::CommandRouted {
            envelope,
            event_name: outcome.event_name.clone(),
            recipients: outcome.recipients.clone(),
            at: Timestamp::now(),
        }) {
            tracing::warn!(error = %err, "Command event delivery reported failures");
        }

        if let Some(sender) = sender {
            self.registry.touch(sender);
        }

        outcome
    }
}
