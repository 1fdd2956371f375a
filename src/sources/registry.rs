use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::{SearchResult, Source, SourceError};
use crate::query::SearchQuery;

/// Registered source plus its one-shot initialisation outcome
struct SourceEntry {
    name: String,
    source: Arc<dyn Source>,
    initialised: OnceCell<Result<(), SourceError>>,
}

/// Shared reference to a registered source.
///
/// Alerts hold handles, never sources they built themselves.
#[derive(Clone)]
pub struct SourceHandle {
    entry: Arc<SourceEntry>,
}

impl SourceHandle {
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn kind(&self) -> &'static str {
        self.entry.source.kind()
    }

    /// Run the source's `initialise` once and return its outcome.
    ///
    /// Concurrent callers wait for the same attempt. A failure is cached and
    /// returned to every later caller.
    pub async fn ensure_initialised(&self) -> Result<(), SourceError> {
        self.entry
            .initialised
            .get_or_init(|| async {
                let outcome = self.entry.source.initialise().await;
                match &outcome {
                    Ok(()) => tracing::info!(
                        source = %self.entry.name,
                        kind = self.kind(),
                        "Source initialised"
                    ),
                    Err(e) => tracing::error!(
                        source = %self.entry.name,
                        kind = self.kind(),
                        error = %e,
                        "Source initialisation failed"
                    ),
                }
                outcome
            })
            .await
            .clone()
    }

    pub fn is_initialised(&self) -> bool {
        matches!(self.entry.initialised.get(), Some(Ok(())))
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult, SourceError> {
        self.entry.source.search(query).await
    }
}

/// Sources indexed by name
pub struct SourceRegistry {
    sources: DashMap<String, SourceHandle>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: DashMap::new(),
        }
    }

    /// Register a source, replacing any previous one with the same name.
    ///
    /// Alerts already holding the old handle keep using it.
    pub fn register(&self, name: impl Into<String>, source: Arc<dyn Source>) -> SourceHandle {
        let name = name.into();
        let handle = SourceHandle {
            entry: Arc::new(SourceEntry {
                name: name.clone(),
                source,
                initialised: OnceCell::new(),
            }),
        };
        if self.sources.insert(name.clone(), handle.clone()).is_some() {
            tracing::debug!(source = %name, "Replaced source");
        }
        handle
    }

    /// Get a source by name
    pub fn get(&self, name: &str) -> Option<SourceHandle> {
        self.sources.get(name).map(|h| h.clone())
    }

    /// List registered source names
    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|e| e.key().clone()).collect()
    }

    pub fn clear(&self) {
        self.sources.clear();
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        initialise_calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new(fail: bool) -> Self {
            Self {
                initialise_calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl Source for CountingSource {
        fn kind(&self) -> &'static str {
            "counting"
        }

        async fn initialise(&self) -> Result<(), SourceError> {
            self.initialise_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail {
                Err(SourceError::Connection("refused".to_string()))
            } else {
                Ok(())
            }
        }

        async fn search(&self, _query: &SearchQuery) -> Result<SearchResult, SourceError> {
            Ok(SearchResult::default())
        }
    }

    #[tokio::test]
    async fn test_initialise_runs_once_for_shared_source() {
        let registry = SourceRegistry::new();
        let source = Arc::new(CountingSource::new(false));
        registry.register("es", source.clone());

        let a = registry.get("es").unwrap();
        let b = registry.get("es").unwrap();
        let (ra, rb) = tokio::join!(a.ensure_initialised(), b.ensure_initialised());

        assert!(ra.is_ok() && rb.is_ok());
        assert!(a.is_initialised());
        assert_eq!(source.initialise_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_initialise_is_final() {
        let registry = SourceRegistry::new();
        let source = Arc::new(CountingSource::new(true));
        let handle = registry.register("es", source.clone());

        assert!(matches!(
            handle.ensure_initialised().await,
            Err(SourceError::Connection(_))
        ));
        assert!(matches!(
            handle.ensure_initialised().await,
            Err(SourceError::Connection(_))
        ));
        assert!(!handle.is_initialised());
        assert_eq!(source.initialise_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_and_clear() {
        let registry = SourceRegistry::new();
        assert!(registry.get("es").is_none());

        registry.register("es", Arc::new(CountingSource::new(false)));
        assert_eq!(registry.get("es").unwrap().name(), "es");
        assert_eq!(registry.names(), vec!["es".to_string()]);

        registry.clear();
        assert!(registry.get("es").is_none());
    }

    #[test]
    fn test_replaced_source_keeps_old_handle() {
        let registry = SourceRegistry::new();
        let old = Arc::new(CountingSource::new(false));
        let new = Arc::new(CountingSource::new(false));

        let old_handle = registry.register("es", old.clone());
        registry.register("es", new.clone());

        tokio_test::block_on(old_handle.ensure_initialised()).unwrap();
        assert_eq!(old.initialise_calls.load(Ordering::SeqCst), 1);
        assert_eq!(new.initialise_calls.load(Ordering::SeqCst), 0);
        assert!(!registry.get("es").unwrap().is_initialised());
    }
}
