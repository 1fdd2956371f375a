//! Synchronous publish/subscribe keyed by event name

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::EventInfo;
use crate::notify::NotifierError;

/// Callback invoked for every event published under its name
pub type EventHandler = Arc<dyn Fn(&EventInfo) -> Result<(), NotifierError> + Send + Sync>;

/// Token returned by [`EventBus::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    handler: EventHandler,
}

/// Event bus shared by every alert in the process.
///
/// Handlers run on the publishing thread, in subscription order. A handler
/// that errors or panics is logged and skipped; the rest still run.
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe a handler to an event name
    pub fn on(&self, event: &str, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .entry(event.to_string())
            .or_default()
            .push(Subscriber { id, handler });
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let mut removed = false;
        subscribers.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|s| s.id != id);
            removed |= subs.len() != before;
            !subs.is_empty()
        });
        removed
    }

    /// Deliver an event to every handler of `event`.
    ///
    /// Returns the number of handlers that completed successfully.
    pub fn publish(&self, event: &str, info: &EventInfo) -> usize {
        // Snapshot so handlers can (un)subscribe without deadlocking
        let handlers: Vec<(SubscriptionId, EventHandler)> = {
            let subscribers = self.subscribers.read();
            match subscribers.get(event) {
                Some(subs) => subs
                    .iter()
                    .map(|s| (s.id, Arc::clone(&s.handler)))
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(info))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::error!(
                        event = %event,
                        subscription = id.0,
                        error = %e,
                        "Event handler failed"
                    );
                }
                Err(_) => {
                    tracing::error!(
                        event = %event,
                        subscription = id.0,
                        "Event handler panicked"
                    );
                }
            }
        }
        delivered
    }

    /// Number of handlers subscribed to an event name
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.subscribers
            .read()
            .get(event)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Drop every subscription
    pub fn clear(&self) {
        self.subscribers.write().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
