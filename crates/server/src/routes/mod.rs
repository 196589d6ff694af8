//! API route handlers for the railvision server.

pub mod health;
pub mod metrics;
pub mod video;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined router.
///
/// Routes:
/// - GET  /api/health - Liveness probe
/// - POST /api/video/upload - Submit a video for analysis
/// - GET  /api/video/{job_id}/status - Job status
/// - GET  /api/video/{job_id}/result - Job result
/// - POST /api/video/{job_id}/cancel - Cancel a running job
/// - GET  /api/video/models - Registered backends
/// - GET  /api/video/jobs - Recent jobs
/// - GET  /metrics - Prometheus exposition
pub fn api_routes(state: Arc<AppState>) -> Router {
    let upload_limit = state.upload_limit;
    Router::new()
        .nest("/api", health::router())
        .nest("/api", video::router(upload_limit))
        .merge(metrics::router())
        .with_state(state)
}
