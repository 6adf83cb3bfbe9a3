//! EventPublisher port - Interface for publishing hub events.
//!
//! Publishing is synchronous: when `publish` returns, every subscribed
//! handler has seen the event.

use crate::domain::events::HubEvent;
use crate::domain::foundation::DomainError;

/// Port for publishing hub events.
///
/// Implementations must ensure:
/// - Handlers run in registration order
/// - A failing handler does not stop delivery to the rest
/// - Handler failures are reported back to the caller
///
/// # Example
///
/// ```ignore
/// publisher.publish(HubEvent::StorageChanged { changed_keys, persisted: false })?;
/// ```
pub trait EventPublisher: Send + Sync {
    /// Publish a single event to every matching handler.
    fn publish(&self, event: HubEvent) -> Result<(), DomainError>;

    /// Publish several events in order.
    fn publish_all(&self, events: Vec<HubEvent>) -> Result<(), DomainError> {
        let mut first_error = None;
        for event in events {
            if let Err(err) = self.publish(event) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
