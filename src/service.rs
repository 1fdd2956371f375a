//! Owns every configured alert for the life of the process

use std::sync::Arc;

use crate::alerts::{Alert, AlertError};
use crate::config::AppConfig;
use crate::context::AlertContext;
use crate::notify::LogNotifier;
use crate::sources;

/// Name the built-in [`LogNotifier`] is registered under
pub const LOG_NOTIFIER: &str = "log";

/// Builds alerts from an [`AppConfig`] and drives their lifecycle
pub struct AlertService {
    ctx: AlertContext,
    alerts: Vec<Alert>,
}

impl AlertService {
    /// Register the configured sources and configure every alert.
    ///
    /// Notifiers other than the built-in `log` one must be registered on
    /// `ctx` beforehand. Alerts are configured in name order; if one fails
    /// the ones before it are stopped and the error is returned.
    pub fn from_config(ctx: AlertContext, config: &AppConfig) -> Result<Self, AlertError> {
        if !ctx.notifiers.contains(LOG_NOTIFIER) {
            ctx.notifiers.register(LOG_NOTIFIER, Arc::new(LogNotifier::new()));
        }

        for (name, source_config) in &config.sources {
            let source = sources::from_config(name, source_config)?;
            ctx.sources.register(name.clone(), source);
            tracing::debug!(source = %name, "Registered source");
        }

        let mut service = Self {
            ctx,
            alerts: Vec::with_capacity(config.alerts.len()),
        };

        for (name, alert_config) in &config.alerts {
            let mut alert = Alert::new(name.clone(), service.ctx.clone());
            if let Err(e) = alert.configure(alert_config.clone()) {
                tracing::error!(alert = %name, error = %e, "Invalid alert configuration");
                service.stop_all();
                return Err(e);
            }
            service.alerts.push(alert);
        }

        tracing::info!(
            sources = config.sources.len(),
            alerts = service.alerts.len(),
            "Alert service configured"
        );
        Ok(service)
    }

    /// Initialise every alert in order. On the first failure all alerts are
    /// stopped and the error is returned.
    pub async fn start_all(&mut self) -> Result<(), AlertError> {
        for i in 0..self.alerts.len() {
            if let Err(e) = self.alerts[i].initialise().await {
                tracing::error!(
                    alert = %self.alerts[i].name(),
                    error = %e,
                    "Failed to start alert"
                );
                self.stop_all();
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn stop_all(&mut self) {
        for alert in &mut self.alerts {
            alert.stop();
        }
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn alert(&self, name: &str) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.name() == name)
    }

    pub fn context(&self) -> &AlertContext {
        &self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertPhase;
    use crate::config::ConfigError;
    use crate::query::SearchQuery;
    use crate::sources::{Hit, SearchResult, Source, SourceError};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticSource {
        hits: usize,
        up: bool,
        searches: AtomicUsize,
    }

    impl StaticSource {
        fn new(hits: usize, up: bool) -> Arc<Self> {
            Arc::new(Self {
                hits,
                up,
                searches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Source for StaticSource {
        fn kind(&self) -> &'static str {
            "static"
        }

        async fn initialise(&self) -> Result<(), SourceError> {
            if self.up {
                Ok(())
            } else {
                Err(SourceError::Connection("down".to_string()))
            }
        }

        async fn search(&self, _query: &SearchQuery) -> Result<SearchResult, SourceError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(SearchResult::from_hits(vec![Hit(Value::Null); self.hits]))
        }
    }

    fn config(raw: &str) -> AppConfig {
        AppConfig::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_service_starts_and_stops_alerts() {
        let ctx = AlertContext::new();
        let source = StaticSource::new(3, true);
        ctx.sources.register("es", source.clone());

        let config = config(
            r#"{
                "alerts": {
                    "a": { "source": "es", "limit": 1, "notifications": [ { "type": "log", "levels": ["all"] } ] },
                    "b": { "source": "es", "limit": 10 }
                }
            }"#,
        );
        let mut service = AlertService::from_config(ctx, &config).unwrap();
        assert!(service.context().notifiers.contains(LOG_NOTIFIER));
        assert_eq!(service.alerts().len(), 2);

        service.start_all().await.unwrap();
        assert_eq!(source.searches.load(Ordering::SeqCst), 2);
        assert_eq!(service.alert("a").unwrap().phase(), AlertPhase::Running);

        service.stop_all();
        assert!(service
            .alerts()
            .iter()
            .all(|a| a.phase() == AlertPhase::Stopped));
        assert_eq!(service.context().bus.subscriber_count("a"), 0);
    }

    #[test]
    fn test_bad_alert_stops_configured_ones() {
        let ctx = AlertContext::new();
        ctx.sources.register("es", StaticSource::new(0, true));

        let config = config(
            r#"{
                "alerts": {
                    "a": { "source": "es", "limit": 1, "notifications": [ { "type": "log", "levels": ["breach"] } ] },
                    "b": { "source": "nowhere", "limit": 1 }
                }
            }"#,
        );
        let bus = Arc::clone(&ctx.bus);
        let err = AlertService::from_config(ctx, &config).err().unwrap();

        assert!(matches!(
            err,
            AlertError::Config(ConfigError::UnknownSource(ref name)) if name == "nowhere"
        ));
        assert_eq!(bus.subscriber_count("a"), 0);
    }

    #[test]
    fn test_invalid_source_url() {
        let config = config(
            r#"{ "sources": { "es": { "type": "elasticsearch", "url": "ftp://logs" } } }"#,
        );
        let err = AlertService::from_config(AlertContext::new(), &config)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AlertError::Config(ConfigError::InvalidSource { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_all_fails_on_unreachable_source() {
        let ctx = AlertContext::new();
        let up = StaticSource::new(0, true);
        ctx.sources.register("up", up.clone());
        ctx.sources.register("down", StaticSource::new(0, false));

        let config = config(
            r#"{
                "alerts": {
                    "a": { "source": "up", "limit": 1 },
                    "b": { "source": "down", "limit": 1 }
                }
            }"#,
        );
        let mut service = AlertService::from_config(ctx, &config).unwrap();

        let err = service.start_all().await.unwrap_err();
        assert!(matches!(err, AlertError::Connection { .. }));
        assert_eq!(service.alert("a").unwrap().phase(), AlertPhase::Stopped);
        assert_eq!(service.alert("b").unwrap().phase(), AlertPhase::Stopped);
    }
}
