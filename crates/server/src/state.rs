// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use railvision_analysis::default_registry;
use railvision_core::{LocalStorage, Orchestrator, StorageError};

use crate::config::Config;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Job submission, dispatch and queries.
    pub orchestrator: Orchestrator,
    /// Backend used when an upload names none.
    pub default_backend: String,
    /// Request body cap applied to uploads, in bytes.
    pub upload_limit: usize,
}

impl AppState {
    pub fn new(
        orchestrator: Orchestrator,
        default_backend: impl Into<String>,
        upload_limit: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            orchestrator,
            default_backend: default_backend.into(),
            upload_limit,
        })
    }

    /// Open the upload directory and wire the built-in backends.
    pub async fn from_config(config: &Config) -> Result<Arc<Self>, StorageError> {
        let storage = LocalStorage::open(&config.upload_dir).await?;
        let registry = default_registry(&config.analysis_config());
        let orchestrator = Orchestrator::new(
            Arc::new(registry),
            Arc::new(storage),
            config.orchestrator_config(),
        );
        if !orchestrator.registry().contains(&config.default_model) {
            tracing::warn!(
                default_model = %config.default_model,
                available = ?orchestrator.list_backend_names(),
                "DEFAULT_MODEL is not a registered backend; uploads without model_name will be rejected"
            );
        }
        Ok(Self::new(
            orchestrator,
            config.default_model.clone(),
            config.body_limit(),
        ))
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
