// crates/server/src/routes/health.rs
//! Liveness endpoint.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Always "UP" while the process serves requests.
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Registered analysis backends.
    pub backends: usize,
    /// Jobs currently held in memory, terminal ones included.
    pub jobs_tracked: usize,
}

/// GET /api/health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let orchestrator = &state.orchestrator;
    Json(HealthResponse {
        status: "UP".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        backends: orchestrator.registry().len(),
        jobs_tracked: orchestrator.ledger().len(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}
