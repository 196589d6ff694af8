// crates/server/src/lib.rs
//! Railvision server library.
//!
//! Axum HTTP transport over the job orchestrator: video upload, job status
//! and result queries, backend listing, health and Prometheus metrics.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::*;
pub use metrics::{init_metrics, render_metrics};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use railvision_core::Orchestrator;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Longest pause between retention sweeps.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Application router with permissive CORS and HTTP request tracing.
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Periodically evict finished jobs older than `max_age`, along with their
/// stored uploads.
pub fn spawn_retention_sweeper(orchestrator: Orchestrator, max_age: Duration) -> JoinHandle<()> {
    let interval = max_age.clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let evicted = orchestrator.evict_expired(max_age).await;
            tracing::debug!(count = evicted.len(), "Retention sweep finished");
        }
    })
}
