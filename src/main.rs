//! Logwarden daemon
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - LOGWARDEN_CONFIG: Path to the JSON config file (default: logwarden.json)
//! - RUST_LOG: Log level (default: logwarden=info)
//!
//! Any `${VAR}` in the config file is replaced with that variable's value.

use logwarden::{AlertContext, AlertService, AppConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logwarden=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path =
        std::env::var("LOGWARDEN_CONFIG").unwrap_or_else(|_| "logwarden.json".to_string());
    let config = AppConfig::load(&config_path)?;

    tracing::info!("Logwarden configuration:");
    tracing::info!("  Config file: {}", config_path);
    tracing::info!("  Sources: {}", config.sources.len());
    for name in config.sources.keys() {
        tracing::info!("    - {}", name);
    }
    tracing::info!("  Alerts: {}", config.alerts.len());
    for (name, alert) in &config.alerts {
        tracing::info!("    - {} (source: {}, limit: {})", name, alert.source, alert.limit);
    }

    let mut service = AlertService::from_config(AlertContext::new(), &config)?;
    service.start_all().await?;
    tracing::info!("Logwarden {} running", env!("CARGO_PKG_VERSION"));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    service.stop_all();

    Ok(())
}
