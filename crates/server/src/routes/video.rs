// crates/server/src/routes/video.rs
//! Video upload and analysis job endpoints.
//!
//! - POST /video/upload: multipart `file` (+ optional `model_name`), returns `{job_id}`
//! - GET  /video/{job_id}/status: status view
//! - GET  /video/{job_id}/result: result view
//! - POST /video/{job_id}/cancel: stop a running job
//! - GET  /video/models: registered backend names
//! - GET  /video/jobs: recent jobs, newest first

use std::io;
use std::pin::pin;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::Field, DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use futures_util::TryStreamExt;
use railvision_core::{JobId, JobResultView, JobStatusView, JobSummary};
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Filename recorded when the client sends none.
const FALLBACK_FILENAME: &str = "upload.mp4";
const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct UploadResponse {
    pub job_id: JobId,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct CancelResponse {
    pub job_id: JobId,
    pub cancelled: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    pub limit: Option<usize>,
}

/// POST /api/video/upload
///
/// When `model_name` precedes `file` in the form, the upload streams straight
/// into storage. Otherwise the file is buffered until the whole form is read,
/// so the backend can be validated before a job exists.
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut model_name: Option<String> = None;
    let mut submitted: Option<JobId> = None;
    let mut buffered: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "model_name" => {
                let text = field.text().await?;
                let text = text.trim();
                if !text.is_empty() && model_name.is_none() {
                    model_name = Some(text.to_string());
                }
            }
            "file" => {
                if submitted.is_some() || buffered.is_some() {
                    return Err(ApiError::BadRequest(
                        "Only one file may be uploaded per request".into(),
                    ));
                }
                ensure_video(field.content_type())?;
                let filename = field
                    .file_name()
                    .filter(|name| !name.is_empty())
                    .unwrap_or(FALLBACK_FILENAME)
                    .to_string();

                match model_name.as_deref() {
                    Some(model) => {
                        submitted = Some(stream_upload(&state, field, model, &filename).await?);
                    }
                    None => buffered = Some((filename, field.bytes().await?)),
                }
            }
            _ => {}
        }
    }

    let job_id = match (submitted, buffered) {
        (Some(id), _) => id,
        (None, Some((filename, data))) => {
            let model = model_name.as_deref().unwrap_or(&state.default_backend);
            let mut reader: &[u8] = &data;
            state
                .orchestrator
                .submit(&mut reader, model, &filename)
                .await?
        }
        (None, None) => {
            return Err(ApiError::BadRequest("Missing required 'file' field".into()));
        }
    };

    Ok(Json(UploadResponse { job_id }))
}

/// Feed a multipart field into the orchestrator without buffering it.
async fn stream_upload(
    state: &AppState,
    field: Field<'_>,
    model: &str,
    filename: &str,
) -> ApiResult<JobId> {
    let stream = field.map_err(|e| io::Error::new(io::ErrorKind::Other, e));
    let mut reader = pin!(StreamReader::new(stream));
    Ok(state.orchestrator.submit(&mut reader, model, filename).await?)
}

fn ensure_video(content_type: Option<&str>) -> ApiResult<()> {
    match content_type {
        Some(ct) if ct.trim().to_ascii_lowercase().starts_with("video/") => Ok(()),
        _ => Err(ApiError::BadRequest("File must be a video".into())),
    }
}

fn parse_job_id(raw: &str) -> ApiResult<JobId> {
    raw.parse().map_err(|_| ApiError::JobNotFound(raw.to_string()))
}

/// GET /api/video/{job_id}/status
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusView>> {
    let id = parse_job_id(&job_id)?;
    state
        .orchestrator
        .status(id)
        .map(Json)
        .ok_or(ApiError::JobNotFound(job_id))
}

/// GET /api/video/{job_id}/result
pub async fn job_result(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobResultView>> {
    let id = parse_job_id(&job_id)?;
    state
        .orchestrator
        .result(id)
        .map(Json)
        .ok_or(ApiError::JobNotFound(job_id))
}

/// POST /api/video/{job_id}/cancel
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let id = parse_job_id(&job_id)?;
    let cancelled = state.orchestrator.cancel(id)?;
    Ok(Json(CancelResponse {
        job_id: id,
        cancelled,
    }))
}

/// GET /api/video/models
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.orchestrator.list_backend_names())
}

/// GET /api/video/jobs?limit=N
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListJobsQuery>,
) -> Json<Vec<JobSummary>> {
    Json(state.orchestrator.list_jobs(list_limit(query.limit)))
}

fn list_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT)
}

/// Build the video router. `upload_limit` caps the upload request body.
pub fn router(upload_limit: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/video/upload",
            post(upload_video).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/video/models", get(list_models))
        .route("/video/jobs", get(list_jobs))
        .route("/video/{job_id}/status", get(job_status))
        .route("/video/{job_id}/result", get(job_result))
        .route("/video/{job_id}/cancel", post(cancel_job))
}
