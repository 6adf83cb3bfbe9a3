//! Event bus adapters.
//!
//! - `InMemoryEventBus` - Synchronous, in-process bus delivering events to
//!   handlers in registration order

mod in_memory;

pub use in_memory::InMemoryEventBus;
