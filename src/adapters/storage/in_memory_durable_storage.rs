//! In-Memory Durable Storage Adapter
//!
//! Keeps records in memory, with switches for failure and latency injection.
//! Useful for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::ports::{DurableStorage, StorageError};

/// In-memory durable storage
#[derive(Debug, Clone, Default)]
pub struct InMemoryDurableStorage {
    records: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
    write_delay_ms: Arc<AtomicU64>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryDurableStorage {
    /// Create a new empty in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record before the hub starts.
    pub async fn insert(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        self.records.write().await.insert(key.to_string(), bytes.into());
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delay every subsequent write.
    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of write attempts so far, failed ones included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current contents of a record parsed as JSON.
    pub async fn json(&self, key: &str) -> Option<serde_json::Value> {
        let records = self.records.read().await;
        records
            .get(key)
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }
}

#[async_trait]
impl DurableStorage for InMemoryDurableStorage {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::IoError("simulated write failure".to_string()));
        }

        self.records
            .write()
            .await
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}
