//! Level-filtered wiring between alert events and notifiers

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{NotifierError, NotifierRegistry};
use crate::config::ConfigError;
use crate::events::{EventBus, EventInfo, LevelFilter, SubscriptionId};

/// Which notifier receives an alert's events, and at which levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationBinding {
    /// Registered notifier name
    #[serde(rename = "type")]
    pub notifier: String,
    /// Levels to forward; `"all"` forwards everything
    pub levels: Vec<LevelFilter>,
}

impl NotificationBinding {
    pub fn new(notifier: impl Into<String>, levels: &[&str]) -> Self {
        Self {
            notifier: notifier.into(),
            levels: levels.iter().map(|l| LevelFilter::from(*l)).collect(),
        }
    }
}

/// Subscribes notifiers to alert events on the bus
#[derive(Clone)]
pub struct NotificationDispatcher {
    bus: Arc<EventBus>,
    notifiers: Arc<NotifierRegistry>,
}

impl NotificationDispatcher {
    pub fn new(bus: Arc<EventBus>, notifiers: Arc<NotifierRegistry>) -> Self {
        Self { bus, notifiers }
    }

    /// Subscribe one filtering handler per binding to `event`.
    ///
    /// Every binding's notifier must already be registered; if one is
    /// missing nothing is subscribed.
    pub fn register_alert_notifications(
        &self,
        event: &str,
        bindings: &[NotificationBinding],
    ) -> Result<Vec<SubscriptionId>, ConfigError> {
        if let Some(missing) = bindings
            .iter()
            .find(|b| !self.notifiers.contains(&b.notifier))
        {
            return Err(ConfigError::UnknownNotifier(missing.notifier.clone()));
        }

        let ids = bindings
            .iter()
            .map(|binding| {
                let notifiers = Arc::clone(&self.notifiers);
                let binding = binding.clone();
                self.bus.on(
                    event,
                    Arc::new(move |info: &EventInfo| {
                        if !LevelFilter::admits(&binding.levels, info.level.as_ref()) {
                            return Ok(());
                        }
                        let notifier = notifiers
                            .get(&binding.notifier)
                            .ok_or_else(|| NotifierError::Unknown(binding.notifier.clone()))?;
                        notifier.notify(info)
                    }),
                )
            })
            .collect();

        tracing::debug!(
            event = %event,
            bindings = bindings.len(),
            "Registered alert notifications"
        );
        Ok(ids)
    }

    /// Remove subscriptions created by [`register_alert_notifications`](Self::register_alert_notifications)
    pub fn unregister(&self, ids: &[SubscriptionId]) {
        for id in ids {
            self.bus.off(*id);
        }
    }
}
