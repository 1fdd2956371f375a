//! Backend sources an alert queries
//!
//! A [`Source`] turns a [`SearchQuery`] into a [`SearchResult`] with exactly
//! one backend call. Sources are built from [`SourceConfig`] and shared
//! between alerts through the [`SourceRegistry`].

pub mod elasticsearch;
pub mod registry;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ConfigError;
use crate::query::SearchQuery;

pub use elasticsearch::{ElasticsearchConfig, ElasticsearchSource};
pub use registry::{SourceHandle, SourceRegistry};

/// Backend query capability
#[async_trait]
pub trait Source: Send + Sync {
    /// Backend kind, for logs
    fn kind(&self) -> &'static str;

    /// Establish and check the backend connection.
    ///
    /// Called at most once per registered source; a failure is final.
    async fn initialise(&self) -> Result<(), SourceError>;

    /// Run one query. Implementations must not retry or cache.
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, SourceError>;
}

/// Backend-agnostic search response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Total matches reported by the backend, if it reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Returned documents (capped by the query's size)
    #[serde(default)]
    pub hits: Vec<Hit>,
}

impl SearchResult {
    pub fn from_hits(hits: Vec<Hit>) -> Self {
        Self { total: None, hits }
    }

    /// Number of matching events: the backend total when known, otherwise
    /// the number of returned hits
    pub fn count(&self) -> u64 {
        self.total.unwrap_or(self.hits.len() as u64)
    }
}

/// A single matching document, opaque to the alerting core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hit(pub Value);

/// Source definition in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Elasticsearch(ElasticsearchConfig),
}

/// Build a source from its config
pub fn from_config(name: &str, config: &SourceConfig) -> Result<Arc<dyn Source>, ConfigError> {
    match config {
        SourceConfig::Elasticsearch(es) => {
            let source = ElasticsearchSource::new(es.clone()).map_err(|e| {
                ConfigError::InvalidSource {
                    name: name.to_string(),
                    reason: e.to_string(),
                }
            })?;
            Ok(Arc::new(source))
        }
    }
}

/// Source errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// Backend unreachable or rejected the connection check
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A single search failed
    #[error("Search failed: {0}")]
    Search(String),

    /// The backend answered with something we can't read
    #[error("Invalid response: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_prefers_total() {
        let hits = vec![Hit(Value::Null), Hit(Value::Null)];
        assert_eq!(SearchResult::from_hits(hits.clone()).count(), 2);

        let result = SearchResult {
            total: Some(250),
            hits,
        };
        assert_eq!(result.count(), 250);
    }

    #[test]
    fn test_source_config_from_json() {
        let config: SourceConfig = serde_json::from_str(
            r#"{ "type": "elasticsearch", "url": "http://localhost:9200", "timeoutSecs": 5 }"#,
        )
        .unwrap();
        let SourceConfig::Elasticsearch(es) = &config;
        assert_eq!(es.url, "http://localhost:9200");
        assert_eq!(es.timeout_secs, 5);

        assert!(from_config("es", &config).is_ok());
    }

    #[test]
    fn test_source_config_rejects_bad_url() {
        let config = SourceConfig::Elasticsearch(ElasticsearchConfig::new("not a url"));
        let err = from_config("es", &config).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidSource { ref name, .. } if name == "es"));
    }
}
