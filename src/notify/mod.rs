//! Notification channels for alert events
//!
//! A [`Notifier`] delivers an [`EventInfo`] somewhere (a log line, a mail,
//! a chat message). Notifiers are registered by name in a
//! [`NotifierRegistry`] and wired to alert events by the
//! [`NotificationDispatcher`], which filters on event level.

pub mod dispatch;
pub mod registry;

pub use dispatch::{NotificationBinding, NotificationDispatcher};
pub use registry::NotifierRegistry;

use crate::events::{EventInfo, Level};

/// Delivery channel for alert events
pub trait Notifier: Send + Sync {
    /// Deliver one event
    fn notify(&self, event: &EventInfo) -> Result<(), NotifierError>;
}

/// Notifier that reports events through `tracing`
///
/// Breaches are logged at warn level, everything else at info.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, event: &EventInfo) -> Result<(), NotifierError> {
        let level = event.level.as_ref().map(Level::as_str).unwrap_or("none");
        let alert = event
            .info
            .extra
            .get("alert")
            .and_then(|v| v.as_str())
            .unwrap_or("-");

        match event.level {
            Some(Level::Breach) => {
                tracing::warn!(
                    alert = %alert,
                    level = %level,
                    errors = event.info.errors,
                    "Alert breached"
                );
            }
            _ => {
                tracing::info!(
                    alert = %alert,
                    level = %level,
                    errors = event.info.errors,
                    "Alert checked"
                );
            }
        }
        Ok(())
    }
}

/// Notifier errors
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Unknown notifier: {0}")]
    Unknown(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}
