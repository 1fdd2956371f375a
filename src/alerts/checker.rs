//! One poll of an alert: query, count, classify, publish

use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::events::{EventBus, EventInfo, Level};
use crate::query::{self, QueryOptions};
use crate::sources::SourceHandle;

/// Runs an alert's poll and publishes the outcome
pub struct AlertChecker {
    /// Alert name, also the event name
    name: String,
    options: QueryOptions,
    limit: u64,
    source: SourceHandle,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    /// Publishing is allowed only while set; stop clears it under this lock
    active: Mutex<bool>,
}

impl AlertChecker {
    pub fn new(
        name: impl Into<String>,
        options: QueryOptions,
        limit: u64,
        source: SourceHandle,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            options,
            limit,
            source,
            bus,
            clock,
            active: Mutex::new(false),
        }
    }

    pub fn source(&self) -> &SourceHandle {
        &self.source
    }

    pub fn activate(&self) {
        *self.active.lock() = true;
    }

    /// Stop publishing. Once this returns no further event leaves this checker.
    pub fn deactivate(&self) {
        *self.active.lock() = false;
    }

    pub fn is_active(&self) -> bool {
        *self.active.lock()
    }

    /// Poll once. Returns the published event, or None if the search failed
    /// or the checker was deactivated meanwhile.
    pub async fn check(&self) -> Option<EventInfo> {
        let query = query::build(&self.options, self.clock.now());

        let result = match self.source.search(&query).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    alert = %self.name,
                    source = %self.source.name(),
                    error = %e,
                    "Alert poll failed, skipping tick"
                );
                return None;
            }
        };

        let count = result.count();
        let level = Self::evaluate(count, self.limit);
        tracing::debug!(
            alert = %self.name,
            index = %query.index,
            count,
            limit = self.limit,
            level = %level,
            "Alert checked"
        );

        let event = EventInfo::new(level, count)
            .with_extra("alert", self.name.as_str())
            .with_extra("limit", self.limit)
            .with_extra("index", query.index);

        self.publish(&event).then_some(event)
    }

    /// Breach when the count is strictly above the limit
    pub fn evaluate(count: u64, limit: u64) -> Level {
        if count > limit {
            Level::Breach
        } else {
            Level::Info
        }
    }

    fn publish(&self, event: &EventInfo) -> bool {
        // Held across publish so deactivate() can't interleave
        let active = self.active.lock();
        if !*active {
            tracing::debug!(alert = %self.name, "Alert stopped, discarding poll result");
            return false;
        }
        self.bus.publish(&self.name, event);
        true
    }
}
