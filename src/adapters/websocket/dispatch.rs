//! Maps client frames onto hub operations.
//!
//! Every request produces a normalized [`AckPayload`]. Failures never close
//! the connection; they come back as `ok: false` with an error code.

use std::sync::Arc;

use serde_json::{json, Value};

use super::messages::{
    decode_payload, AckPayload, ClientEvent, ClientFrame, ExecutePayload, HeartbeatPayload,
    ModifyStoragePayload, PreviousMessagePayload, RegisterPayload, ResetPayload, ServerFrame,
    SubscribeStoragePayload,
};
use crate::application::{Hub, Registration, ResetRequest, SendOptions, PREVIOUS_MESSAGE};
use crate::domain::devices::DeviceSummary;
use crate::domain::foundation::{ConnectionId, DomainError, ErrorCode, InstanceId};

/// Server event carrying the admin snapshot.
pub const ADMIN_STATE: &str = "admin:state";

#[derive(Clone)]
pub struct MessageDispatcher {
    hub: Arc<Hub>,
}

impl MessageDispatcher {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Handles one frame and returns the ack frame, if one was requested.
    pub fn dispatch(&self, connection_id: &ConnectionId, frame: ClientFrame) -> Option<ServerFrame> {
        let ack = frame.ack;
        let result = match ClientEvent::from_name(&frame.event) {
            Some(event) => self.handle(connection_id, event, frame.payload),
            None => Err(DomainError::new(
                ErrorCode::InvalidMessage,
                format!("Unknown event: {}", frame.event),
            )
            .with_detail("event", frame.event.as_str())),
        };

        let payload = match result {
            Ok(data) => AckPayload::success(data),
            Err(err) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    event = %frame.event,
                    code = %err.code,
                    message = %err.message,
                    "Client request rejected"
                );
                AckPayload::failure(&err)
            }
        };
        ack.map(|id| ServerFrame::ack(id, &payload))
    }

    fn handle(
        &self,
        connection_id: &ConnectionId,
        event: ClientEvent,
        payload: Value,
    ) -> Result<Option<Value>, DomainError> {
        let hub = &self.hub;
        match event {
            ClientEvent::Register => {
                let payload: RegisterPayload = decode_payload(event, payload)?;
                let mut registration = Registration::new(payload.device);
                if let Some(instance) = payload.instance_id {
                    registration = registration.instance(InstanceId::resolve(Some(&instance)));
                }
                if let Some(metadata) = payload.metadata {
                    registration = registration.metadata(metadata);
                }
                if let Some(transport) = payload.transport {
                    registration = registration.transport(transport);
                }

                let session = hub.register(connection_id, registration)?;
                let history = hub.registry().history(session.device, &session.instance_id);
                to_data(&DeviceSummary::from_session(&session, &history))
            }
            ClientEvent::Unregister => {
                let session = hub.unregister(connection_id)?;
                Ok(Some(json!({
                    "device": session.device,
                    "instanceId": session.instance_id,
                })))
            }
            ClientEvent::Heartbeat => {
                let payload: HeartbeatPayload = decode_payload(event, payload)?;
                let session = hub.heartbeat(connection_id, payload.latency_ms)?;
                Ok(Some(json!({ "lastSeenAt": session.last_seen_at })))
            }
            ClientEvent::Execute => {
                let payload: ExecutePayload = decode_payload(event, payload)?;
                let options = SendOptions {
                    source: payload.source,
                    source_instance_id: payload
                        .source_instance_id
                        .map(|id| InstanceId::resolve(Some(&id))),
                    target_instance_id: payload
                        .target_instance_id
                        .map(|id| InstanceId::resolve(Some(&id))),
                };
                let outcome = hub.execute(
                    connection_id,
                    &payload.target,
                    &payload.command,
                    payload.payload,
                    options,
                )?;
                Ok(Some(json!({
                    "delivered": outcome.is_delivered(),
                    "deliveredCount": outcome.delivered(),
                    "event": outcome.event_name,
                })))
            }
            ClientEvent::ModifyStorage => {
                let payload: ModifyStoragePayload = decode_payload(event, payload)?;
                let update = hub.modify_storage(payload.patch, payload.options)?;
                Ok(Some(json!({ "changedKeys": update.changed_keys })))
            }
            ClientEvent::SubscribeStorage => {
                let payload: SubscribeStoragePayload = decode_payload(event, payload)?;
                hub.subscribe_storage(connection_id, payload.keys);
                Ok(None)
            }
            ClientEvent::UnsubscribeStorage => {
                let removed = hub.unsubscribe_storage(connection_id);
                Ok(Some(json!({ "removed": removed })))
            }
            ClientEvent::MonitorSubscribe => {
                hub.monitor_subscribe(connection_id);
                Ok(None)
            }
            ClientEvent::MonitorUnsubscribe => {
                let removed = hub.monitor_unsubscribe(connection_id);
                Ok(Some(json!({ "removed": removed })))
            }
            ClientEvent::AdminState => {
                let snapshot = to_value(&hub.admin_state())?;
                hub.transport()
                    .send(connection_id, ADMIN_STATE, &snapshot);
                Ok(Some(snapshot))
            }
            ClientEvent::PreviousMessageGet => {
                let record = to_value(&hub.previous_message())?;
                hub.transport()
                    .send(connection_id, PREVIOUS_MESSAGE, &record);
                Ok(Some(record))
            }
            ClientEvent::PreviousMessageSet => {
                let payload: PreviousMessagePayload = decode_payload(event, payload)?;
                let record =
                    hub.set_previous_message(&payload.message, payload.team_name.as_deref());
                to_data(&record)
            }
            ClientEvent::Reset => {
                let payload: ResetPayload = decode_payload(event, payload)?;
                let relayed = hub.reset(
                    Some(connection_id),
                    ResetRequest {
                        source: payload.source,
                        source_instance_id: payload.source_instance_id,
                        reason: payload.reason,
                        metadata: payload.metadata,
                    },
                )?;
                Ok(Some(json!({ "relayed": relayed })))
            }
        }
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, DomainError> {
    serde_json::to_value(value)
        .map_err(|err| DomainError::new(ErrorCode::InternalError, err.to_string()))
}

fn to_data<T: serde::Serialize>(value: &T) -> Result<Option<Value>, DomainError> {
    to_value(value).map(Some)
}
