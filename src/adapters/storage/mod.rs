//! Storage Adapters
//!
//! Implementations of the DurableStorage port.
//!
//! ## Available Adapters
//!
//! - **FileDurableStorage** - Stores each record as a JSON file on disk
//! - **InMemoryDurableStorage** - Stores records in memory (testing/development)
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::storage::{FileDurableStorage, InMemoryDurableStorage};
//!
//! // Production: file-based storage
//! let storage = FileDurableStorage::new("./data");
//!
//! // Testing: in-memory storage
//! let storage = InMemoryDurableStorage::new();
//! ```

mod file_durable_storage;
mod in_memory_durable_storage;

pub use file_durable_storage::FileDurableStorage;
pub use in_memory_durable_storage::InMemoryDurableStorage;
