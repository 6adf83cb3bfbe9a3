//! Coalescing durable writer.
//!
//! At most one write per key is in flight. Requests arriving during a write
//! replace the pending payload; when the write finishes, the latest payload
//! is written once. Intermediate payloads are skipped.
//!
//! ## States
//!
//! - **Idle**: nothing in flight
//! - **Writing**: one write in flight, nothing newer queued
//! - **WritingPending**: one write in flight, a newer payload queued
//!
//! ## Transitions
//!
//! ```text
//! Idle --[request]--> Writing
//! Writing --[request]--> WritingPending
//! WritingPending --[request]--> WritingPending (payload replaced)
//! Writing --[write done]--> Idle
//! WritingPending --[write done]--> Writing (queued payload written)
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;

use crate::domain::events::HubEvent;
use crate::domain::foundation::Timestamp;
use crate::ports::{DurableStorage, EventPublisher};

/// Writer states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Idle,
    Writing,
    WritingPending,
}

struct WriterInner {
    state: WriterState,
    pending: Option<Vec<u8>>,
}

/// Background writer for one durable key.
pub struct PersistenceWriter {
    key: String,
    storage: Arc<dyn DurableStorage>,
    publisher: Arc<dyn EventPublisher>,
    inner: Mutex<WriterInner>,
    idle: Notify,
}

impl PersistenceWriter {
    pub fn new(
        key: impl Into<String>,
        storage: Arc<dyn DurableStorage>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            key: key.into(),
            storage,
            publisher,
            inner: Mutex::new(WriterInner {
                state: WriterState::Idle,
                pending: None,
            }),
            idle: Notify::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> WriterState {
        self.lock().state
    }

    /// Queues `bytes` for writing. Never blocks.
    ///
    /// Must be called from within a tokio runtime; outside one the request
    /// is dropped and logged.
    pub fn request(self: &Arc<Self>, bytes: Vec<u8>) {
        let mut inner = self.lock();
        inner.pending = Some(bytes);

        match inner.state {
            WriterState::Idle => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    inner.state = WriterState::Writing;
                    handle.spawn(Arc::clone(self).drain());
                }
                Err(_) => {
                    inner.pending = None;
                    tracing::error!(key = %self.key, "No runtime available, durable write dropped");
                }
            },
            WriterState::Writing => inner.state = WriterState::WritingPending,
            WriterState::WritingPending => {}
        }
    }

    /// Resolves once no write is in flight or queued.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.state() == WriterState::Idle {
                return;
            }
            notified.await;
        }
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let bytes = {
                let mut inner = self.lock();
                match inner.pending.take() {
                    Some(bytes) => bytes,
                    None => {
                        inner.state = WriterState::Idle;
                        drop(inner);
                        self.idle.notify_waiters();
                        return;
                    }
                }
            };

            match self.storage.write(&self.key, &bytes).await {
                Ok(()) => tracing::debug!(key = %self.key, "Durable snapshot written"),
                Err(err) => {
                    // In-memory state stays authoritative; the next request rewrites everything
                    tracing::error!(key = %self.key, error = %err, "Durable write failed");
                    let event = HubEvent::PersistenceFailed {
                        key: self.key.clone(),
                        error: err.to_string(),
                        at: Timestamp::now(),
                    };
                    if let Err(publish_err) = self.publisher.publish(event) {
                        tracing::warn!(error = %publish_err, "Persistence failure event not fully delivered");
                    }
                }
            }

            let mut inner = self.lock();
            if inner.state == WriterState::WritingPending {
                inner.state = WriterState::Writing;
            } else {
                inner.state = WriterState::Idle;
                inner.pending = None;
                drop(inner);
                self.idle.notify_waiters();
                return;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WriterInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::storage::InMemoryDurableStorage;
    use crate::domain::events::HubEventKind;
    use std::time::Duration;

    fn setup() -> (Arc<InMemoryDurableStorage>, Arc<InMemoryEventBus>, Arc<PersistenceWriter>) {
        let storage = Arc::new(InMemoryDurableStorage::new());
        let bus = Arc::new(InMemoryEventBus::recording());
        let writer = Arc::new(PersistenceWriter::new("storage", storage.clone(), bus.clone()));
        (storage, bus, writer)
    }

    #[tokio::test]
    async fn single_request_is_written() {
        let (storage, _bus, writer) = setup();

        writer.request(b"{\"a\":1}".to_vec());
        writer.wait_idle().await;

        assert_eq!(writer.state(), WriterState::Idle);
        assert_eq!(storage.json("storage").await.unwrap()["a"], 1);
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test]
    async fn requests_during_a_write_coalesce_to_latest() {
        let (storage, _bus, writer) = setup();
        storage.set_write_delay(Duration::from_millis(30));

        writer.request(b"{\"v\":1}".to_vec());
        // Let the drain task pick up the first payload
        tokio::task::yield_now().await;

        writer.request(b"{\"v\":2}".to_vec());
        assert_eq!(writer.state(), WriterState::WritingPending);
        writer.request(b"{\"v\":3}".to_vec());
        writer.request(b"{\"v\":4}".to_vec());

        writer.wait_idle().await;

        assert_eq!(storage.json("storage").await.unwrap()["v"], 4);
        assert_eq!(storage.write_count(), 2);
    }

    #[tokio::test]
    async fn failed_write_publishes_event_and_next_write_recovers() {
        let (storage, bus, writer) = setup();
        storage.set_fail_writes(true);

        writer.request(b"{\"v\":1}".to_vec());
        writer.wait_idle().await;

        assert!(bus.has_event(HubEventKind::PersistenceFailed));
        assert!(storage.json("storage").await.is_none());

        storage.set_fail_writes(false);
        writer.request(b"{\"v\":2}".to_vec());
        writer.wait_idle().await;

        assert_eq!(storage.json("storage").await.unwrap()["v"], 2);
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_when_idle() {
        let (_storage, _bus, writer) = setup();
        tokio::time::timeout(Duration::from_millis(100), writer.wait_idle())
            .await
            .unwrap();
    }

    #[test]
    fn request_outside_runtime_is_dropped() {
        let (_storage, _bus, writer) = setup();
        writer.request(b"{}".to_vec());
        assert_eq!(writer.state(), WriterState::Idle);
    }
}
