//! Application configuration
//!
//! The config file is JSON. `${VAR}` references anywhere in the file are
//! replaced with the environment variable's value before parsing, so
//! credentials can stay out of the file:
//!
//! ```json
//! {
//!   "sources": {
//!     "es": { "type": "elasticsearch", "url": "${ES_URL}" }
//!   },
//!   "alerts": {
//!     "api-errors": {
//!       "source": "es",
//!       "query": "level:error AND service:api",
//!       "time": "10 minutes",
//!       "limit": 5,
//!       "schedule": { "interval": "1 minute" },
//!       "notifications": [ { "type": "log", "levels": ["breach"] } ]
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Deserialize;

use crate::alerts::AlertConfig;
use crate::sources::SourceConfig;

/// Root of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Backend sources by name
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
    /// Alerts by name; the name doubles as the alert's event name
    #[serde(default)]
    pub alerts: BTreeMap<String, AlertConfig>,
}

impl AppConfig {
    /// Read, expand and parse a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw)
    }

    /// Parse config text, expanding `${VAR}` references first
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env(raw)?;
        Ok(serde_json::from_str(&expanded)?)
    }
}

fn env_ref_regex() -> &'static Regex {
    static ENV_REF: OnceLock<Regex> = OnceLock::new();
    ENV_REF.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env reference regex is valid")
    })
}

/// Replace `${VAR}` with the variable's value; unset variables are an error
fn expand_env(raw: &str) -> Result<String, ConfigError> {
    let mut missing = None;
    let expanded = env_ref_regex().replace_all(raw, |caps: &Captures| {
        match std::env::var(&caps[1]) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| caps[1].to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var) => Err(ConfigError::MissingEnvVar(var)),
        None => Ok(expanded.into_owned()),
    }
}

/// Configuration errors. All of them stop an alert before it starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Unknown notifier type: {0}")]
    UnknownNotifier(String),

    #[error("Invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid index date format: {0}")]
    InvalidIndexPattern(String),

    #[error("Invalid source config for '{name}': {reason}")]
    InvalidSource { name: String, reason: String },

    #[error("Environment variable not set: {0}")]
    MissingEnvVar(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::ScheduleSpec;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "sources": {
            "es": { "type": "elasticsearch", "url": "http://localhost:9200" }
        },
        "alerts": {
            "api-errors": {
                "source": "es",
                "query": "level:error",
                "time": "10 minutes",
                "limitResultsTo": 100,
                "limit": 5,
                "schedule": { "interval": "30 seconds" },
                "notifications": [ { "type": "log", "levels": ["breach"] } ]
            }
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.sources.len(), 1);

        let alert = &config.alerts["api-errors"];
        assert_eq!(alert.source, "es");
        assert_eq!(alert.query.as_deref(), Some("level:error"));
        assert_eq!(alert.time.as_deref(), Some("10 minutes"));
        assert_eq!(alert.limit_results_to, Some(100));
        assert_eq!(alert.limit, 5);
        assert_eq!(alert.schedule, ScheduleSpec::Interval("30 seconds".to_string()));
        assert_eq!(alert.notifications.len(), 1);
    }

    #[test]
    fn test_load_from_file_with_env_expansion() {
        std::env::set_var("LOGWARDEN_TEST_ES_URL", "http://es.internal:9200");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "sources": {{ "es": {{ "type": "elasticsearch", "url": "${{LOGWARDEN_TEST_ES_URL}}" }} }} }}"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        match &config.sources["es"] {
            SourceConfig::Elasticsearch(es) => assert_eq!(es.url, "http://es.internal:9200"),
        }
    }

    #[test]
    fn test_missing_env_var() {
        let err = AppConfig::parse(r#"{ "sources": { "es": { "type": "elasticsearch", "url": "${LOGWARDEN_TEST_UNSET_VAR}" } } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "LOGWARDEN_TEST_UNSET_VAR"));
    }

    #[test]
    fn test_unknown_alert_field_rejected() {
        let err = AppConfig::parse(
            r#"{ "alerts": { "a": { "source": "es", "limit": 1, "notifications": [], "treshold": 3 } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load("/nonexistent/logwarden.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
