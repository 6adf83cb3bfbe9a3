//! Previous message store.

use std::sync::{Arc, Mutex, PoisonError};

use super::PersistenceWriter;
use crate::domain::foundation::Timestamp;
use crate::domain::previous_message::{PreviousMessage, PREVIOUS_MESSAGE_KEY};
use crate::ports::{DurableStorage, EventPublisher, StorageError};

/// Holds the previous message and mirrors every change to durable storage.
pub struct PreviousMessageStore {
    current: Mutex<PreviousMessage>,
    writer: Arc<PersistenceWriter>,
}

impl PreviousMessageStore {
    pub fn new(storage: Arc<dyn DurableStorage>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            current: Mutex::new(PreviousMessage::default()),
            writer: Arc::new(PersistenceWriter::new(
                PREVIOUS_MESSAGE_KEY,
                storage,
                publisher,
            )),
        }
    }

    /// Loads the stored record. A missing or unreadable record is replaced
    /// by an empty one, which is written back.
    pub async fn load(
        storage: Arc<dyn DurableStorage>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Self, StorageError> {
        let store = Self::new(storage.clone(), publisher);

        let loaded = match storage.read(PREVIOUS_MESSAGE_KEY).await? {
            Some(bytes) => match serde_json::from_slice::<PreviousMessage>(&bytes) {
                Ok(record) => Some(record.sanitized()),
                Err(err) => {
                    tracing::error!(error = %err, "Previous message is unreadable, resetting");
                    None
                }
            },
            None => None,
        };

        match loaded {
            Some(record) => *store.lock() = record,
            None => store.persist(&PreviousMessage::default()),
        }
        Ok(store)
    }

    pub fn get(&self) -> PreviousMessage {
        self.lock().clone()
    }

    /// Replaces the record. Both strings are trimmed.
    pub fn set(&self, message: &str, team_name: Option<&str>) -> PreviousMessage {
        self.replace(PreviousMessage::new(message, team_name, Timestamp::now()))
    }

    pub fn clear(&self) -> PreviousMessage {
        self.replace(PreviousMessage::cleared(Timestamp::now()))
    }

    /// Resolves once pending durable writes have finished.
    pub async fn flushed(&self) {
        self.writer.wait_idle().await
    }

    fn replace(&self, record: PreviousMessage) -> PreviousMessage {
        {
            let mut current = self.lock();
            *current = record.clone();
            // Request under the lock so the last writer is also the last persisted
            self.persist(&current);
        }
        record
    }

    fn persist(&self, record: &PreviousMessage) {
        match serde_json::to_vec(record) {
            Ok(bytes) => self.writer.request(bytes),
            Err(err) => tracing::error!(error = %err, "Could not serialize previous message"),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PreviousMessage> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::storage::InMemoryDurableStorage;
    use serde_json::json;

    fn backend() -> (Arc<InMemoryDurableStorage>, Arc<InMemoryEventBus>) {
        (
            Arc::new(InMemoryDurableStorage::new()),
            Arc::new(InMemoryEventBus::new()),
        )
    }

    #[tokio::test]
    async fn missing_record_is_written_back_empty() {
        let (storage, bus) = backend();
        let store = PreviousMessageStore::load(storage.clone(), bus).await.unwrap();
        store.flushed().await;

        assert_eq!(store.get(), PreviousMessage::default());
        let written = storage.json(PREVIOUS_MESSAGE_KEY).await.unwrap();
        assert_eq!(written["message"], "");
        assert_eq!(written["teamName"], "");
    }

    #[tokio::test]
    async fn existing_record_is_loaded_and_trimmed() {
        let (storage, bus) = backend();
        storage
            .insert(
                PREVIOUS_MESSAGE_KEY,
                serde_json::to_vec(&json!({"message": " hi ", "teamName": "Blue", "updatedAt": 5}))
                    .unwrap(),
            )
            .await;

        let store = PreviousMessageStore::load(storage.clone(), bus).await.unwrap();
        let record = store.get();

        assert_eq!(record.message, "hi");
        assert_eq!(record.team_name, "Blue");
        assert_eq!(record.updated_at, Some(Timestamp::from_millis(5)));
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test]
    async fn set_and_clear_persist() {
        let (storage, bus) = backend();
        let store = PreviousMessageStore::new(storage.clone(), bus);

        store.set("  good luck ", Some(" Red "));
        store.flushed().await;
        let written = storage.json(PREVIOUS_MESSAGE_KEY).await.unwrap();
        assert_eq!(written["message"], "good luck");
        assert_eq!(written["teamName"], "Red");

        let cleared = store.clear();
        store.flushed().await;
        assert!(cleared.message.is_empty());
        assert!(cleared.updated_at.is_some());
        assert_eq!(storage.json(PREVIOUS_MESSAGE_KEY).await.unwrap()["message"], "");
    }

    #[tokio::test]
    async fn rapid_sets_end_with_the_last_one_persisted() {
        let (storage, bus) = backend();
        let store = PreviousMessageStore::new(storage.clone(), bus);

        for n in 0..10 {
            store.set(&format!("message {}", n), None);
        }
        store.flushed().await;

        assert_eq!(
            storage.json(PREVIOUS_MESSAGE_KEY).await.unwrap()["message"],
            "message 9"
        );
    }
}
