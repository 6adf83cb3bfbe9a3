//! Shared state store.
//!
//! One in-memory snapshot mutated only through patches. Every effective
//! change is fanned out to subscribers before `modify` returns, so a caller
//! that saw its write acknowledged can never be overtaken by an older value.
//! A declared subset of keys is mirrored to durable storage through a
//! coalescing writer.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use super::PersistenceWriter;
use crate::domain::events::HubEvent;
use crate::domain::foundation::DomainError;
use crate::domain::storage::{
    merge_patch, persist_targets, validate_patch, ModifyOptions, PersistedState,
    StorageSnapshot, StorageUpdate, STORAGE_DURABLE_KEY,
};
use crate::ports::{DurableStorage, EventPublisher, StorageError};

/// Receives store updates.
pub trait StorageSubscriber: Send + Sync {
    fn on_update(&self, update: &StorageUpdate);
}

impl<F> StorageSubscriber for F
where
    F: Fn(&StorageUpdate) + Send + Sync,
{
    fn on_update(&self, update: &StorageUpdate) {
        self(update)
    }
}

/// Handle returned by [`SharedStateStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    /// Advisory only; every update carries the full snapshot.
    keys: Option<Vec<String>>,
    subscriber: Arc<dyn StorageSubscriber>,
}

#[derive(Default)]
struct StoreState {
    snapshot: StorageSnapshot,
    persistent_keys: BTreeSet<String>,
    subscriptions: Vec<Subscription>,
    next_subscription: u64,
}

impl StoreState {
    fn persisted_bytes(&self) -> Result<Vec<u8>, StorageError> {
        let record = PersistedState {
            keys: self.persistent_keys.iter().cloned().collect(),
            state: self
                .persistent_keys
                .iter()
                .filter_map(|key| self.snapshot.get(key).map(|v| (key.clone(), v.clone())))
                .collect(),
        };
        serde_json::to_vec_pretty(&record)
            .map_err(|e| StorageError::SerializationFailed(e.to_string()))
    }
}

pub struct SharedStateStore {
    state: Mutex<StoreState>,
    writer: Arc<PersistenceWriter>,
    publisher: Arc<dyn EventPublisher>,
}

impl SharedStateStore {
    pub fn new(storage: Arc<dyn DurableStorage>, publisher: Arc<dyn EventPublisher>) -> Self {
        let writer = Arc::new(PersistenceWriter::new(
            STORAGE_DURABLE_KEY,
            storage,
            publisher.clone(),
        ));
        Self {
            state: Mutex::new(StoreState::default()),
            writer,
            publisher,
        }
    }

    /// Builds a store seeded from the persisted subset in `storage`.
    ///
    /// A missing record yields an empty store. An unreadable one is logged
    /// and ignored.
    pub async fn load(
        storage: Arc<dyn DurableStorage>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Self, StorageError> {
        let store = Self::new(storage.clone(), publisher);

        if let Some(bytes) = storage.read(STORAGE_DURABLE_KEY).await? {
            match serde_json::from_slice::<PersistedState>(&bytes) {
                Ok(persisted) => {
                    let mut state = store.lock();
                    state.persistent_keys = persisted
                        .keys
                        .into_iter()
                        .filter(|key| !key.is_empty())
                        .collect();
                    state.snapshot = persisted.state;
                    tracing::info!(
                        keys = state.persistent_keys.len(),
                        "Loaded persisted storage state"
                    );
                }
                Err(err) => {
                    tracing::error!(error = %err, "Persisted storage state is unreadable, starting empty");
                }
            }
        }

        Ok(store)
    }

    /// Merges a patch into the snapshot.
    ///
    /// A patch that changes nothing is not fanned out, but may still promote
    /// keys to durable storage.
    ///
    /// # Errors
    ///
    /// `InvalidPatch` when the patch is not an object or has an empty key.
    /// The snapshot is untouched in that case.
    pub fn modify(&self, patch: Value, options: ModifyOptions) -> Result<StorageUpdate, DomainError> {
        let patch = validate_patch(patch)?;
        let targets = persist_targets(&patch, &options);

        let update = {
            let mut state = self.lock();
            state.persistent_keys.extend(targets.iter().cloned());
            let changed_keys = merge_patch(&mut state.snapshot, patch);

            let update = StorageUpdate {
                state: state.snapshot.clone(),
                changed_keys,
            };

            let touches_durable = update
                .changed_keys
                .iter()
                .any(|key| state.persistent_keys.contains(key));
            if touches_durable || !targets.is_empty() {
                // Request under the lock so the newest snapshot is the last one queued
                match state.persisted_bytes() {
                    Ok(bytes) => self.writer.request(bytes),
                    Err(err) => {
                        tracing::error!(error = %err, "Could not serialize persisted storage state")
                    }
                }
            }

            if !update.changed_keys.is_empty() {
                // Fan out under the lock so subscribers observe modify order
                for subscription in &state.subscriptions {
                    subscription.subscriber.on_update(&update);
                }
            }
            update
        };

        if !update.changed_keys.is_empty() {
            tracing::debug!(changed = ?update.changed_keys, "Storage modified");
            if let Err(err) = self.publisher.publish(HubEvent::StorageChanged {
                changed_keys: update.changed_keys.clone(),
                persisted: !targets.is_empty(),
            }) {
                tracing::warn!(error = %err, "Storage event delivery reported failures");
            }
        }

        Ok(update)
    }

    /// Registers a subscriber and immediately hands it the full snapshot.
    pub fn subscribe(
        &self,
        subscriber: Arc<dyn StorageSubscriber>,
        keys: Option<Vec<String>>,
    ) -> SubscriptionId {
        let mut state = self.lock();
        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);

        let initial = StorageUpdate {
            state: state.snapshot.clone(),
            changed_keys: Vec::new(),
        };
        subscriber.on_update(&initial);

        state.subscriptions.push(Subscription {
            id,
            keys: keys.filter(|keys| !keys.is_empty()),
            subscriber,
        });
        id
    }

    /// Removes a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.lock();
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.id != id);
        state.subscriptions.len() != before
    }

    /// Keys a subscriber said it cares about.
    pub fn subscription_keys(&self, id: SubscriptionId) -> Option<Vec<String>> {
        self.lock()
            .subscriptions
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| s.keys.clone())
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscriptions.len()
    }

    pub fn snapshot(&self) -> StorageSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().snapshot.get(key).cloned()
    }

    pub fn persistent_keys(&self) -> Vec<String> {
        self.lock().persistent_keys.iter().cloned().collect()
    }

    /// Resolves once pending durable writes have finished.
    pub async fn flushed(&self) {
        self.writer.wait_idle().await
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::storage::InMemoryDurableStorage;
    use crate::domain::events::HubEventKind;
    use crate::domain::foundation::ErrorCode;
    use serde_json::json;

    struct Fixture {
        storage: Arc<InMemoryDurableStorage>,
        bus: Arc<InMemoryEventBus>,
        store: SharedStateStore,
    }

    fn setup() -> Fixture {
        let storage = Arc::new(InMemoryDurableStorage::new());
        let bus = Arc::new(InMemoryEventBus::recording());
        let store = SharedStateStore::new(storage.clone(), bus.clone());
        Fixture {
            storage,
            bus,
            store,
        }
    }

    fn collector() -> (Arc<Mutex<Vec<StorageUpdate>>>, Arc<dyn StorageSubscriber>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscriber: Arc<dyn StorageSubscriber> =
            Arc::new(move |update: &StorageUpdate| sink.lock().unwrap().push(update.clone()));
        (seen, subscriber)
    }

    #[test]
    fn subscribe_delivers_initial_snapshot() {
        let f = setup();
        f.store.modify(json!({"a": 1}), ModifyOptions::default()).unwrap();

        let (seen, subscriber) = collector();
        f.store.subscribe(subscriber, Some(vec!["b".into()]));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].state["a"], 1);
        assert!(seen[0].changed_keys.is_empty());
    }

    #[test]
    fn sequential_modifies_are_observed_in_order() {
        let f = setup();
        let (seen, subscriber) = collector();
        f.store.subscribe(subscriber, None);

        f.store.modify(json!({"a": 1}), ModifyOptions::default()).unwrap();
        f.store.modify(json!({"a": 2}), ModifyOptions::default()).unwrap();

        let seen = seen.lock().unwrap();
        // initial snapshot + two updates
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].state["a"], 1);
        assert_eq!(seen[2].state["a"], 2);
        assert_eq!(f.store.get("a"), Some(json!(2)));
    }

    #[test]
    fn keys_filter_does_not_narrow_updates() {
        let f = setup();
        let (seen, subscriber) = collector();
        f.store.subscribe(subscriber, Some(vec!["other".into()]));

        f.store.modify(json!({"a": 1, "b": 2}), ModifyOptions::default()).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].state.len(), 2);
        assert_eq!(seen[1].changed_keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn invalid_patch_changes_nothing() {
        let f = setup();
        f.store.modify(json!({"a": 1}), ModifyOptions::default()).unwrap();

        let err = f.store.modify(json!("nope"), ModifyOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPatch);

        let err = f
            .store
            .modify(json!({"a": 5, "": 1}), ModifyOptions::default())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPatch);
        assert_eq!(f.store.get("a"), Some(json!(1)));
    }

    #[test]
    fn no_op_patch_skips_fan_out() {
        let f = setup();
        f.store.modify(json!({"a": 1}), ModifyOptions::default()).unwrap();
        let (seen, subscriber) = collector();
        f.store.subscribe(subscriber, None);
        f.bus.clear();

        let update = f.store.modify(json!({"a": 1}), ModifyOptions::default()).unwrap();

        assert!(update.changed_keys.is_empty());
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(!f.bus.has_event(HubEventKind::StorageChanged));
    }

    #[test]
    fn unsubscribe_stops_updates() {
        let f = setup();
        let (seen, subscriber) = collector();
        let id = f.store.subscribe(subscriber, None);

        assert!(f.store.unsubscribe(id));
        assert!(!f.store.unsubscribe(id));
        f.store.modify(json!({"a": 1}), ModifyOptions::default()).unwrap();

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(f.store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn persisted_subset_is_written() {
        let f = setup();
        f.store
            .modify(
                json!({"score": 10, "scratch": "x"}),
                ModifyOptions {
                    persist: false,
                    persist_keys: vec!["score".into()],
                },
            )
            .unwrap();
        f.store.flushed().await;

        let written = f.storage.json(STORAGE_DURABLE_KEY).await.unwrap();
        assert_eq!(written["keys"], json!(["score"]));
        assert_eq!(written["state"], json!({"score": 10}));
    }

    #[tokio::test]
    async fn later_changes_to_durable_keys_are_persisted() {
        let f = setup();
        f.store
            .modify(json!({"score": 1}), ModifyOptions::persisted())
            .unwrap();
        f.store.flushed().await;

        f.store.modify(json!({"score": 2}), ModifyOptions::default()).unwrap();
        f.store.flushed().await;

        let written = f.storage.json(STORAGE_DURABLE_KEY).await.unwrap();
        assert_eq!(written["state"]["score"], 2);
    }

    #[tokio::test]
    async fn volatile_changes_do_not_touch_storage() {
        let f = setup();
        f.store.modify(json!({"a": 1}), ModifyOptions::default()).unwrap();
        f.store.flushed().await;

        assert_eq!(f.storage.write_count(), 0);
    }

    #[tokio::test]
    async fn load_restores_persisted_subset() {
        let storage = Arc::new(InMemoryDurableStorage::new());
        storage
            .insert(
                STORAGE_DURABLE_KEY,
                br#"{"keys":["score"],"state":{"score":7}}"#.to_vec(),
            )
            .await;
        let bus = Arc::new(InMemoryEventBus::new());

        let store = SharedStateStore::load(storage, bus).await.unwrap();

        assert_eq!(store.get("score"), Some(json!(7)));
        assert_eq!(store.persistent_keys(), vec!["score".to_string()]);
    }

    #[tokio::test]
    async fn load_ignores_corrupt_record() {
        let storage = Arc::new(InMemoryDurableStorage::new());
        storage.insert(STORAGE_DURABLE_KEY, b"not json".to_vec()).await;

        let store = SharedStateStore::load(storage, Arc::new(InMemoryEventBus::new()))
            .await
            .unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_keeps_memory_authoritative() {
        let f = setup();
        f.storage.set_fail_writes(true);

        f.store
            .modify(json!({"score": 3}), ModifyOptions::persisted())
            .unwrap();
        f.store.flushed().await;

        assert_eq!(f.store.get("score"), Some(json!(3)));
        assert!(f.bus.has_event(HubEventKind::PersistenceFailed));

        f.storage.set_fail_writes(false);
        f.store.modify(json!({"other": 1}), ModifyOptions::persisted()).unwrap();
        f.store.flushed().await;

        let written = f.storage.json(STORAGE_DURABLE_KEY).await.unwrap();
        assert_eq!(written["state"], json!({"other": 1, "score": 3}));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_modifies_leave_durable_state_equal_to_memory() {
        for _ in 0..20 {
            let storage = Arc::new(InMemoryDurableStorage::new());
            let store = Arc::new(SharedStateStore::new(
                storage.clone(),
                Arc::new(InMemoryEventBus::new()),
            ));

            let writers: Vec<_> = (0..4)
                .map(|n| {
                    let store = store.clone();
                    tokio::task::spawn_blocking(move || {
                        for i in 0..50 {
                            let mut patch = serde_json::Map::new();
                            patch.insert(format!("k{}", n), json!(i));
                            store
                                .modify(Value::Object(patch), ModifyOptions::persisted())
                                .unwrap();
                        }
                    })
                })
                .collect();
            for writer in writers {
                writer.await.unwrap();
            }

            store.flushed().await;
            let written = storage.json(STORAGE_DURABLE_KEY).await.unwrap();
            assert_eq!(written["state"], Value::Object(store.snapshot()));
            assert_eq!(
                written["state"],
                json!({"k0": 49, "k1": 49, "k2": 49, "k3": 49})
            );
        }
    }
}
