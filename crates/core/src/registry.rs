// crates/core/src/registry.rs
//! Lookup table from backend name to implementation.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::backend::AnalysisBackend;
use crate::error::OrchestratorError;

/// Registry of analysis backends keyed by [`AnalysisBackend::name`].
///
/// Usually populated once at startup and read-only afterwards, but guarded
/// by an `RwLock` so late registration stays safe while jobs resolve.
#[derive(Default)]
pub struct BackendRegistry {
    backends: RwLock<BTreeMap<String, Arc<dyn AnalysisBackend>>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `backend`, replacing any existing entry with the same name.
    pub fn register(&self, backend: Arc<dyn AnalysisBackend>) {
        let name = backend.name().to_string();
        let mut backends = self.backends.write().unwrap_or_else(|e| {
            tracing::error!("RwLock poisoned writing backend registry: {e}");
            e.into_inner()
        });
        if backends.insert(name.clone(), backend).is_some() {
            tracing::warn!(backend = %name, "Replaced existing backend registration");
        } else {
            tracing::debug!(backend = %name, "Registered analysis backend");
        }
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn AnalysisBackend>, OrchestratorError> {
        let backends = self.read();
        backends
            .get(name)
            .cloned()
            .ok_or_else(|| OrchestratorError::UnknownBackend {
                name: name.to_string(),
                available: backends.keys().cloned().collect(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn list_names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Arc<dyn AnalysisBackend>>> {
        self.backends.read().unwrap_or_else(|e| {
            tracing::error!("RwLock poisoned reading backend registry: {e}");
            e.into_inner()
        })
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.list_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::storage::MediaReference;
    use async_trait::async_trait;

    struct Fixed {
        name: &'static str,
        value: u32,
    }

    #[async_trait]
    impl AnalysisBackend for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, _media: &MediaReference) -> Result<serde_json::Value, BackendError> {
            Ok(serde_json::json!({ "value": self.value }))
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = BackendRegistry::new();
        registry.register(Arc::new(Fixed { name: "dummy", value: 1 }));

        let backend = registry.resolve("dummy").unwrap();
        assert_eq!(backend.name(), "dummy");
        assert!(registry.contains("dummy"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_unknown_backend() {
        let registry = BackendRegistry::new();
        registry.register(Arc::new(Fixed { name: "dummy", value: 1 }));

        match registry.resolve("nonexistent") {
            Err(OrchestratorError::UnknownBackend { name, available }) => {
                assert_eq!(name, "nonexistent");
                assert_eq!(available, vec!["dummy".to_string()]);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("resolved an unregistered backend"),
        }
    }

    #[test]
    fn test_list_names_sorted() {
        let registry = BackendRegistry::new();
        registry.register(Arc::new(Fixed { name: "railway_detection", value: 0 }));
        registry.register(Arc::new(Fixed { name: "dummy", value: 0 }));
        registry.register(Arc::new(Fixed { name: "opencv_basic", value: 0 }));

        assert_eq!(
            registry.list_names(),
            vec!["dummy", "opencv_basic", "railway_detection"]
        );
    }

    #[tokio::test]
    async fn test_register_overwrites_same_name() {
        let registry = BackendRegistry::new();
        registry.register(Arc::new(Fixed { name: "dummy", value: 1 }));
        registry.register(Arc::new(Fixed { name: "dummy", value: 2 }));

        assert_eq!(registry.len(), 1);
        let media = MediaReference::new("unused");
        let result = registry.resolve("dummy").unwrap().run(&media).await.unwrap();
        assert_eq!(result["value"], 2);
    }
}
