//! Device registry.
//!
//! Tracks one canonical session per (device, instance) pair plus the
//! connection history of that pair. Rows are never deleted: a device that
//! disconnects stays listed as offline.
//!
//! ```text
//! channels:  ConnectionId ──▶ (DeviceId, InstanceId)
//! records:   (DeviceId, InstanceId) ──▶ { canonical session, history }
//! ```
//!
//! A later registration for the same pair moves the canonical pointer to the
//! new channel. The superseded channel stays mapped until it closes on its
//! own, and its close only drops the mapping.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::devices::{
    ConnectionHistoryEntry, DeviceId, DeviceMetadata, DeviceSession, DeviceSummary,
    TransportMode,
};
use crate::domain::events::{DisconnectReason, HubEvent};
use crate::domain::foundation::{ConnectionId, DomainError, ErrorCode, InstanceId, Timestamp};
use crate::ports::EventPublisher;

type InstanceKey = (DeviceId, InstanceId);

/// Registration request as received from a device.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    /// Wire identity, validated against the catalog.
    pub device: String,
    pub instance_id: Option<InstanceId>,
    pub metadata: DeviceMetadata,
    /// Overrides the catalog transport when set.
    pub transport: Option<TransportMode>,
}

impl Registration {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Self::default()
        }
    }

    pub fn instance(mut self, instance_id: impl Into<InstanceId>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    pub fn metadata(mut self, metadata: DeviceMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn transport(mut self, transport: TransportMode) -> Self {
        self.transport = Some(transport);
        self
    }
}

struct InstanceRecord {
    session: DeviceSession,
    history: Vec<ConnectionHistoryEntry>,
}

impl InstanceRecord {
    fn close_open_entry(&mut self, at: Timestamp) {
        if let Some(entry) = self.history.last_mut() {
            entry.close(at);
        }
    }
}

#[derive(Default)]
struct RegistryState {
    channels: HashMap<ConnectionId, InstanceKey>,
    records: BTreeMap<InstanceKey, InstanceRecord>,
}

impl RegistryState {
    fn canonical(&self, connection_id: &ConnectionId) -> Option<&InstanceRecord> {
        let key = self.channels.get(connection_id)?;
        self.records
            .get(key)
            .filter(|record| &record.session.connection_id == connection_id)
    }

    fn canonical_mut(&mut self, connection_id: &ConnectionId) -> Option<&mut InstanceRecord> {
        let key = self.channels.get(connection_id)?;
        self.records
            .get_mut(key)
            .filter(|record| &record.session.connection_id == connection_id)
    }

    fn summaries(&self) -> Vec<DeviceSummary> {
        let mut rows = Vec::with_capacity(DeviceId::ALL.len());
        for device in DeviceId::ALL {
            let before = rows.len();
            rows.extend(
                self.records
                    .iter()
                    .filter(|((id, _), _)| *id == device)
                    .map(|(_, record)| DeviceSummary::from_session(&record.session, &record.history)),
            );
            if rows.len() == before {
                rows.push(DeviceSummary::placeholder(device));
            }
        }
        rows
    }

    /// Marks the canonical session of `connection_id` disconnected.
    fn demote(
        &mut self,
        connection_id: &ConnectionId,
        reason: DisconnectReason,
        at: Timestamp,
    ) -> Option<HubEvent> {
        let record = self.canonical_mut(connection_id)?;
        if !record.session.connected {
            return None;
        }
        record.session.connected = false;
        record.close_open_entry(at);

        Some(HubEvent::DeviceDisconnected {
            device: record.session.device,
            instance_id: record.session.instance_id.clone(),
            connection_id: connection_id.clone(),
            reason,
            at,
            history: record.history.clone(),
        })
    }
}

/// Registry of device sessions.
///
/// Events are published while the state lock is held, so bus handlers must
/// not call back into the registry.
pub struct DeviceRegistry {
    state: Mutex<RegistryState>,
    publisher: Arc<dyn EventPublisher>,
}

impl DeviceRegistry {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            publisher,
        }
    }

    /// Registers a channel as the canonical session of a device instance.
    ///
    /// # Errors
    ///
    /// `UnknownDevice` when the identity is not in the catalog. Nothing
    /// changes in that case.
    pub fn register(
        &self,
        connection_id: &ConnectionId,
        registration: Registration,
    ) -> Result<DeviceSession, DomainError> {
        self.register_at(connection_id, registration, Timestamp::now())
    }

    pub fn register_at(
        &self,
        connection_id: &ConnectionId,
        registration: Registration,
        now: Timestamp,
    ) -> Result<DeviceSession, DomainError> {
        let device: DeviceId = registration.device.parse()?;
        let instance_id = registration.instance_id.unwrap_or_default();
        let transport = registration.transport.unwrap_or_else(|| device.transport());
        let key = (device, instance_id.clone());

        let mut events = Vec::new();
        let (session, superseded) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

            // A channel that switches identity leaves its previous pair first
            if let Some(previous) = state.channels.get(connection_id).cloned() {
                if previous != key {
                    events.extend(state.demote(connection_id, DisconnectReason::Unregistered, now));
                    state.channels.remove(connection_id);
                }
            }

            let record = state.records.get_mut(&key);
            let (session, superseded) = match record {
                Some(record)
                    if &record.session.connection_id == connection_id
                        && record.session.connected =>
                {
                    let session = &mut record.session;
                    session.metadata = registration.metadata;
                    session.transport = transport;
                    session.registered = true;
                    session.last_seen_at = now;
                    (session.clone(), None)
                }
                Some(record) => {
                    let superseded = Some(record.session.connection_id.clone())
                        .filter(|_| record.session.connected);
                    record.close_open_entry(now);
                    record.history.push(ConnectionHistoryEntry::open(now));
                    record.session = DeviceSession::new(
                        device,
                        instance_id.clone(),
                        connection_id.clone(),
                        transport,
                        registration.metadata,
                        now,
                    );
                    (record.session.clone(), superseded)
                }
                None => {
                    let session = DeviceSession::new(
                        device,
                        instance_id.clone(),
                        connection_id.clone(),
                        transport,
                        registration.metadata,
                        now,
                    );
                    state.records.insert(
                        key.clone(),
                        InstanceRecord {
                            session: session.clone(),
                            history: vec![ConnectionHistoryEntry::open(now)],
                        },
                    );
                    (session, None)
                }
            };
            state.channels.insert(connection_id.clone(), key);

            events.push(HubEvent::DeviceRegistered {
                session: session.clone(),
                superseded: superseded.clone(),
            });
            events.push(HubEvent::DeviceListChanged {
                devices: state.summaries(),
            });
            // Publish under the lock so listeners observe registry changes in order
            self.emit(std::mem::take(&mut events));
            (session, superseded)
        };

        tracing::info!(
            device = %session.device,
            instance_id = %session.instance_id,
            connection_id = %connection_id,
            superseded = superseded.as_ref().map(|c| c.as_str()),
            "Device registered"
        );

        Ok(session)
    }

    /// Records a heartbeat for the canonical session owning `connection_id`.
    ///
    /// A hardware session the watchdog demoted comes back online here, with a
    /// fresh history entry.
    ///
    /// # Errors
    ///
    /// `UnknownConnection` when the channel never registered, `NoLiveSession`
    /// when it was superseded.
    pub fn heartbeat(
        &self,
        connection_id: &ConnectionId,
        latency_ms: Option<u64>,
    ) -> Result<DeviceSession, DomainError> {
        self.heartbeat_at(connection_id, latency_ms, Timestamp::now())
    }

    pub fn heartbeat_at(
        &self,
        connection_id: &ConnectionId,
        latency_ms: Option<u64>,
        now: Timestamp,
    ) -> Result<DeviceSession, DomainError> {
        let mut events = Vec::new();
        let session = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.channels.contains_key(connection_id) {
                return Err(unknown_connection(connection_id));
            }
            let record = state.canonical_mut(connection_id).ok_or_else(|| {
                DomainError::new(
                    ErrorCode::NoLiveSession,
                    "Connection was superseded by a newer registration",
                )
                .with_detail("connection_id", connection_id.as_str())
            })?;

            let revived = !record.session.connected;
            let session = &mut record.session;
            session.last_seen_at = now;
            if latency_ms.is_some() {
                session.latency_ms = latency_ms;
            }
            if revived {
                session.connected = true;
                session.connected_at = now;
                record.history.push(ConnectionHistoryEntry::open(now));
            }
            let session = record.session.clone();

            if revived {
                events.push(HubEvent::DeviceRegistered {
                    session: session.clone(),
                    superseded: None,
                });
            }
            events.push(HubEvent::DeviceHeartbeat {
                device: session.device,
                instance_id: session.instance_id.clone(),
                latency_ms,
                at: now,
            });
            if revived {
                events.push(HubEvent::DeviceListChanged {
                    devices: state.summaries(),
                });
            }
            self.emit(std::mem::take(&mut events));
            session
        };

        Ok(session)
    }

    /// Handles a channel going away.
    ///
    /// Returns the session that went offline, or `None` when the channel was
    /// unknown or no longer canonical.
    pub fn disconnect(
        &self,
        connection_id: &ConnectionId,
        reason: DisconnectReason,
    ) -> Option<DeviceSession> {
        self.disconnect_at(connection_id, reason, Timestamp::now())
    }

    pub fn disconnect_at(
        &self,
        connection_id: &ConnectionId,
        reason: DisconnectReason,
        now: Timestamp,
    ) -> Option<DeviceSession> {
        let session = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let demoted = state.demote(connection_id, reason, now);
            let session = state
                .canonical(connection_id)
                .map(|record| record.session.clone())
                .filter(|_| demoted.is_some());
            state.channels.remove(connection_id);

            let mut events: Vec<HubEvent> = demoted.into_iter().collect();
            if !events.is_empty() {
                events.push(HubEvent::DeviceListChanged {
                    devices: state.summaries(),
                });
            }
            self.emit(events);
            session
        };

        match &session {
            Some(session) => tracing::info!(
                device = %session.device,
                instance_id = %session.instance_id,
                connection_id = %connection_id,
                reason = reason.as_str(),
                "Device disconnected"
            ),
            None => tracing::debug!(
                connection_id = %connection_id,
                "Non-canonical channel closed"
            ),
        }

        session
    }

    /// Demotes every connected request/response session silent for longer
    /// than `timeout_ms`. Each session is demoted once; it needs a heartbeat
    /// to come back.
    pub fn demote_stale(&self, now: Timestamp, timeout_ms: u64) -> Vec<DeviceSession> {
        let demoted = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let stale: Vec<ConnectionId> = state
                .records
                .values()
                .map(|record| &record.session)
                .filter(|s| s.transport == TransportMode::Http && s.connected)
                .filter(|s| s.silence_ms(now) > timeout_ms)
                .map(|s| s.connection_id.clone())
                .collect();

            let mut events = Vec::new();
            let mut demoted = Vec::new();
            for connection_id in stale {
                if let Some(event) =
                    state.demote(&connection_id, DisconnectReason::HeartbeatTimeout, now)
                {
                    events.push(event);
                    if let Some(record) = state.canonical(&connection_id) {
                        demoted.push(record.session.clone());
                    }
                }
            }
            if !events.is_empty() {
                events.push(HubEvent::DeviceListChanged {
                    devices: state.summaries(),
                });
            }
            self.emit(events);
            demoted
        };

        for session in &demoted {
            tracing::warn!(
                device = %session.device,
                instance_id = %session.instance_id,
                silence_ms = session.silence_ms(now),
                "Heartbeat timeout, marking device offline"
            );
        }

        demoted
    }

    /// Refreshes last-seen for the canonical session of a channel.
    pub fn touch(&self, connection_id: &ConnectionId) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(record) = state.canonical_mut(connection_id) {
            record.session.last_seen_at = Timestamp::now();
        }
    }

    /// Canonical session owned by a channel.
    pub fn find_by_connection_id(&self, connection_id: &ConnectionId) -> Option<DeviceSession> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .canonical(connection_id)
            .map(|record| record.session.clone())
    }

    /// Connected canonical sessions of a device, optionally for one instance.
    pub fn live_sessions(
        &self,
        device: DeviceId,
        instance_id: Option<&InstanceId>,
    ) -> Vec<DeviceSession> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .records
            .iter()
            .filter(|((id, instance), _)| {
                *id == device && instance_id.map_or(true, |wanted| instance == wanted)
            })
            .map(|(_, record)| &record.session)
            .filter(|session| session.connected)
            .cloned()
            .collect()
    }

    /// One row per known instance, in catalog order, with a placeholder row
    /// for identities that never connected.
    pub fn list_summaries(&self) -> Vec<DeviceSummary> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summaries()
    }

    /// Connection history of a device instance, oldest first.
    pub fn history(&self, device: DeviceId, instance_id: &InstanceId) -> Vec<ConnectionHistoryEntry> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .records
            .get(&(device, instance_id.clone()))
            .map(|record| record.history.clone())
            .unwrap_or_default()
    }

    fn emit(&self, events: Vec<HubEvent>) {
        if events.is_empty() {
            return;
        }
        if let Err(err) = self.publisher.publish_all(events) {
            tracing::warn!(error = %err, "Registry event delivery reported failures");
        }
    }
}

fn unknown_connection(connection_id: &ConnectionId) -> DomainError {
    DomainError::new(
        ErrorCode::UnknownConnection,
        format!("Connection '{}' has not registered", connection_id),
    )
    .with_detail("connection_id", connection_id.as_str())
}
