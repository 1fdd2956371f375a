//! Threshold alerts over log searches
//!
//! An [`Alert`] polls a source on a schedule, counts matching log entries
//! and publishes a breach or info event under its own name. Notifications
//! bound in its config receive those events.

mod alert;
pub mod checker;
pub mod config;

use thiserror::Error;

use crate::config::ConfigError;

pub use crate::scheduler::ScheduleSpec;
pub use alert::{Alert, AlertPhase};
pub use checker::AlertChecker;
pub use config::AlertConfig;

#[derive(Error, Debug)]
pub enum AlertError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to connect to source '{source_name}': {message}")]
    Connection {
        source_name: String,
        message: String,
    },

    #[error("Alert '{alert}' is {actual}, expected {expected}")]
    InvalidState {
        alert: String,
        expected: AlertPhase,
        actual: AlertPhase,
    },
}
