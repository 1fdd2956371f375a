//! Elasticsearch source over the HTTP search API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::{Hit, SearchResult, Source, SourceError};
use crate::query::SearchQuery;

fn default_timeout_secs() -> u64 {
    30
}

/// Connection settings for an Elasticsearch cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchConfig {
    /// Base URL, e.g. `http://localhost:9200`
    pub url: String,
    /// Per-request timeout of the HTTP client
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ElasticsearchConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Source that runs queries against `/{index}/_search`
#[derive(Debug, Clone)]
pub struct ElasticsearchSource {
    base_url: Url,
    http_client: reqwest::Client,
}

impl ElasticsearchSource {
    pub fn new(config: ElasticsearchConfig) -> Result<Self, SourceError> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| SourceError::Connection(format!("invalid url '{}': {}", config.url, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(SourceError::Connection(format!(
                "unsupported scheme '{}'",
                base_url.scheme()
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SourceError::Connection(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Source for ElasticsearchSource {
    fn kind(&self) -> &'static str {
        "elasticsearch"
    }

    async fn initialise(&self) -> Result<(), SourceError> {
        let url = self.endpoint("");
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Connection(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        let info: ClusterInfo = response.json().await.unwrap_or_default();
        tracing::info!(
            url = %self.base_url,
            cluster = info.cluster_name.as_deref().unwrap_or("unknown"),
            version = info.version.and_then(|v| v.number).as_deref().unwrap_or("unknown"),
            "Connected to Elasticsearch"
        );
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, SourceError> {
        let url = self.endpoint(&format!("{}/_search", query.index));

        let response = self
            .http_client
            .post(&url)
            .query(&[("ignore_unavailable", "true")])
            .json(&query.body)
            .send()
            .await
            .map_err(|e| SourceError::Search(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::Search(format!(
                "status {}: {}",
                status, error_text
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        tracing::debug!(index = %query.index, hits = body.hits.hits.len(), "Search completed");

        Ok(SearchResult {
            total: body.hits.total.map(TotalHits::value),
            hits: body.hits.hits,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct ClusterInfo {
    cluster_name: Option<String>,
    version: Option<VersionInfo>,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<Hit>,
}

/// `hits.total` is a bare number before 7.x and an object after
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Count(u64),
    Object { value: u64 },
}

impl TotalHits {
    fn value(self) -> u64 {
        match self {
            TotalHits::Count(n) => n,
            TotalHits::Object { value } => value,
        }
    }
}
