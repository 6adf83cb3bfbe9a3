//! Shared state store vocabulary.
//!
//! The store holds a flat map of top-level keys. Mutation happens only through
//! patches; a declared subset of keys is mirrored to durable storage.

mod patch;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use patch::{merge_patch, persist_targets, validate_patch};

/// Full in-memory state.
pub type StorageSnapshot = Map<String, Value>;

/// Durable key under which the persisted subset lives.
pub const STORAGE_DURABLE_KEY: &str = "storage";

/// Options accepted by a modify call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModifyOptions {
    /// Every key in the patch becomes durable.
    pub persist: bool,
    /// Explicit durable keys. Takes precedence over `persist`.
    pub persist_keys: Vec<String>,
}

impl ModifyOptions {
    pub fn persisted() -> Self {
        Self {
            persist: true,
            persist_keys: Vec::new(),
        }
    }

    pub fn wants_persistence(&self) -> bool {
        self.persist || !self.persist_keys.is_empty()
    }
}

/// Payload fanned out to subscribers after every effective change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUpdate {
    pub state: StorageSnapshot,
    pub changed_keys: Vec<String>,
}

/// On-disk layout of the persisted subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub keys: Vec<String>,
    pub state: StorageSnapshot,
}
