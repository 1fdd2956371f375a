//! Shared state every alert is wired against

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::events::EventBus;
use crate::notify::{NotificationDispatcher, NotifierRegistry};
use crate::sources::SourceRegistry;

/// Registries, event bus and clock, shared for the lifetime of the process.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct AlertContext {
    pub sources: Arc<SourceRegistry>,
    pub notifiers: Arc<NotifierRegistry>,
    pub bus: Arc<EventBus>,
    pub clock: Arc<dyn Clock>,
}

impl AlertContext {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sources: Arc::new(SourceRegistry::new()),
            notifiers: Arc::new(NotifierRegistry::new()),
            bus: Arc::new(EventBus::new()),
            clock,
        }
    }

    pub fn dispatcher(&self) -> NotificationDispatcher {
        NotificationDispatcher::new(Arc::clone(&self.bus), Arc::clone(&self.notifiers))
    }

    /// Forget every source, notifier and subscription
    pub fn clear(&self) {
        self.sources.clear();
        self.notifiers.clear();
        self.bus.clear();
    }
}

impl Default for AlertContext {
    fn default() -> Self {
        Self::new()
    }
}
