//! In-process event bus.
//!
//! Delivers every published event synchronously to the handlers registered
//! for its kind, in registration order. Nothing crosses the process boundary.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::events::{HubEvent, HubEventKind};
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{EventHandler, EventPublisher, EventSubscriber};

/// In-process event bus.
///
/// Features:
/// - Synchronous delivery (deterministic ordering)
/// - Optional event capture for assertions
/// - Handler failures are collected, never short-circuit delivery
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::recording());
///
/// bus.publish(HubEvent::StorageChanged { changed_keys, persisted: false })?;
///
/// assert_eq!(bus.event_count(), 1);
/// assert!(bus.has_event(HubEventKind::StorageChanged));
/// ```
pub struct InMemoryEventBus {
    handlers: RwLock<HashMap<HubEventKind, Vec<Arc<dyn EventHandler>>>>,
    published: Option<RwLock<Vec<HubEvent>>>,
}

impl InMemoryEventBus {
    /// Creates a bus that delivers without keeping events.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            published: None,
        }
    }

    /// Creates a bus that also keeps every published event.
    pub fn recording() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            published: Some(RwLock::new(Vec::new())),
        }
    }

    // === Test Helpers ===

    /// Returns all captured events. Empty unless built with `recording()`.
    pub fn published_events(&self) -> Vec<HubEvent> {
        match &self.published {
            Some(published) => published
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            None => Vec::new(),
        }
    }

    /// Returns captured events of a specific kind.
    pub fn events_of_kind(&self, kind: HubEventKind) -> Vec<HubEvent> {
        self.published_events()
            .into_iter()
            .filter(|e| e.kind() == kind)
            .collect()
    }

    /// Clears captured events.
    pub fn clear(&self) {
        if let Some(published) = &self.published {
            published
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
    }

    /// Returns count of captured events.
    pub fn event_count(&self) -> usize {
        match &self.published {
            Some(published) => published
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            None => 0,
        }
    }

    /// Checks if an event of the given kind was captured.
    pub fn has_event(&self, kind: HubEventKind) -> bool {
        match &self.published {
            Some(published) => published
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .any(|e| e.kind() == kind),
            None => false,
        }
    }

    /// Number of handlers registered for a kind.
    pub fn handler_count(&self, kind: HubEventKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish(&self, event: HubEvent) -> Result<(), DomainError> {
        if let Some(published) = &self.published {
            published
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        }

        // Clone handlers so a handler may subscribe or publish re-entrantly
        let kind_handlers: Vec<Arc<dyn EventHandler>> = {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            handlers.get(&event.kind()).cloned().unwrap_or_default()
        };

        let mut errors = Vec::new();
        for handler in kind_handlers {
            if let Err(e) = handler.handle(&event) {
                tracing::warn!(
                    handler = handler.name(),
                    event = event.kind().as_str(),
                    error = %e,
                    "Event handler failed"
                );
                errors.push(format!("{}: {}", handler.name(), e));
            }
        }

        if !errors.is_empty() {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Handler errors: {}", errors.join(", ")),
            ));
        }

        Ok(())
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, kind: HubEventKind, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.entry(kind).or_default().push(handler);
    }

    fn subscribe_all(&self, kinds: &[HubEventKind], handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        for kind in kinds {
            handlers.entry(*kind).or_default().push(Arc::clone(&handler));
        }
    }
}
