//! Logwarden: Threshold Alerting over Log Search Backends
//!
//! Periodically runs keyword searches against a log store, counts the
//! matching entries and publishes a breach event when the count goes above
//! an alert's limit. Notifiers bound to an alert receive its events,
//! filtered by level.
//!
//! # Features
//!
//! - **Elasticsearch Source**: Daily-index searches with a time window
//! - **Schedules**: Fixed interval, daily times of day, or manual re-arming
//! - **Event Bus**: Named events with level-filtered notification bindings
//! - **Config File**: JSON with `${VAR}` environment expansion
//!
//! # Example
//!
//! ```no_run
//! use logwarden::{AlertContext, AlertService, AppConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load("logwarden.json")?;
//! let mut service = AlertService::from_config(AlertContext::new(), &config)?;
//! service.start_all().await?;
//!
//! tokio::signal::ctrl_c().await?;
//! service.stop_all();
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod clock;
pub mod config;
pub mod context;
pub mod events;
pub mod notify;
pub mod query;
pub mod scheduler;
pub mod service;
pub mod sources;

// Re-export commonly used types
pub use alerts::{Alert, AlertConfig, AlertError, AlertPhase};
pub use config::{AppConfig, ConfigError};
pub use context::AlertContext;
pub use events::{EventBus, EventInfo, Level, LevelFilter};
pub use notify::{LogNotifier, Notifier, NotifierError};
pub use service::AlertService;
pub use sources::{SearchResult, Source, SourceError};
