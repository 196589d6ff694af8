//! `GET /metrics`, served outside the `/api` prefix where Prometheus
//! scrapers look for it.

use std::sync::Arc;

use axum::{http::header, response::IntoResponse, routing::get, Router};

use crate::error::{ApiError, ApiResult};
use crate::metrics::render_metrics;
use crate::state::AppState;

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn scrape() -> ApiResult<impl IntoResponse> {
    let body = render_metrics()
        .ok_or_else(|| ApiError::Unavailable("metrics recorder is not installed".into()))?;
    Ok(([(header::CONTENT_TYPE, PROMETHEUS_TEXT)], body))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/metrics", get(scrape))
}
