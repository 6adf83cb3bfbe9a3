//! EventSubscriber port - Interface for subscribing to hub events.
//!
//! This port defines how aggregators and bridges register interest in hub
//! events without knowing who publishes them.

use std::sync::Arc;

use crate::domain::events::{HubEvent, HubEventKind};
use crate::domain::foundation::DomainError;

/// Handler for processing hub events.
///
/// Implementations should be:
/// - **Quick** - handlers run inline on the publisher's call
/// - **Isolated** - errors don't affect other handlers
///
/// # Example
///
/// ```ignore
/// struct MonitorRecorder { /* ... */ }
///
/// impl EventHandler for MonitorRecorder {
///     fn handle(&self, event: &HubEvent) -> Result<(), DomainError> {
///         // Append to history...
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "MonitorRecorder"
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Process an event.
    fn handle(&self, event: &HubEvent) -> Result<(), DomainError>;

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}

/// Port for subscribing to hub events.
pub trait EventSubscriber: Send + Sync {
    /// Subscribe handler to a specific event kind.
    fn subscribe(&self, kind: HubEventKind, handler: Arc<dyn EventHandler>);

    /// Subscribe handler to multiple event kinds.
    ///
    /// The same handler instance is invoked for any matching kind.
    fn subscribe_all(&self, kinds: &[HubEventKind], handler: Arc<dyn EventHandler>);
}

/// Combined trait for event bus implementations.
pub trait EventBus: super::EventPublisher + EventSubscriber {}

// Blanket implementation - any type that implements both traits is an EventBus
impl<T: super::EventPublisher + EventSubscriber> EventBus for T {}
