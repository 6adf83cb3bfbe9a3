//! Durable Storage Port - Interface for persisting small keyed blobs.
//!
//! The hub stores two records: the persisted subset of the shared state and
//! the previous message. Both are opaque bytes to this port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors that can occur during durable storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Failed to serialize record: {0}")]
    SerializationFailed(String),

    #[error("Failed to deserialize record: {0}")]
    DeserializationFailed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err.to_string())
    }
}

impl From<StorageError> for DomainError {
    fn from(err: StorageError) -> Self {
        DomainError::new(ErrorCode::PersistenceFailure, err.to_string())
    }
}

/// Port for reading and writing keyed records.
#[async_trait]
pub trait DurableStorage: Send + Sync {
    /// Reads a record.
    ///
    /// # Returns
    /// `None` when nothing was ever written under `key`.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replaces a record.
    ///
    /// # Errors
    /// Returns `StorageError` if the write fails. The previous contents may
    /// or may not survive, depending on the adapter.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
}
