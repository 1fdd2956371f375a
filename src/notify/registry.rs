use dashmap::DashMap;
use std::sync::Arc;

use super::Notifier;

/// Notifiers indexed by type name
pub struct NotifierRegistry {
    notifiers: DashMap<String, Arc<dyn Notifier>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self {
            notifiers: DashMap::new(),
        }
    }

    /// Register a notifier, replacing any previous one with the same name
    pub fn register(&self, name: impl Into<String>, notifier: Arc<dyn Notifier>) {
        let name = name.into();
        if self.notifiers.insert(name.clone(), notifier).is_some() {
            tracing::debug!(notifier = %name, "Replaced notifier");
        }
    }

    /// Get a notifier by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Notifier>> {
        self.notifiers.get(name).map(|n| Arc::clone(&n))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.notifiers.contains_key(name)
    }

    /// List registered notifier names
    pub fn names(&self) -> Vec<String> {
        self.notifiers.iter().map(|e| e.key().clone()).collect()
    }

    pub fn clear(&self) {
        self.notifiers.clear();
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;

    #[test]
    fn test_register_and_get() {
        let registry = NotifierRegistry::new();
        assert!(registry.get("log").is_none());

        registry.register("log", Arc::new(LogNotifier::new()));
        assert!(registry.get("log").is_some());
        assert!(registry.contains("log"));
        assert_eq!(registry.names(), vec!["log".to_string()]);

        registry.clear();
        assert!(registry.get("log").is_none());
    }
}
