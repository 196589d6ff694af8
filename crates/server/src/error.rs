// crates/server/src/error.rs
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use railvision_core::OrchestratorError;
use serde::Serialize;
use thiserror::Error;

/// Body of every non-2xx JSON response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Failures surfaced by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Unknown backend: {name}")]
    UnknownBackend { name: String, available: Vec<String> },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::UnknownBackend { name, available } => {
                ApiError::UnknownBackend { name, available }
            }
            OrchestratorError::UnknownJob(id) => ApiError::JobNotFound(id.to_string()),
            OrchestratorError::Ledger(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::JobNotFound(id) => {
                tracing::warn!(job_id = %id, "Job not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Job not found", format!("Job ID: {}", id)),
                )
            }
            ApiError::UnknownBackend { name, available } => {
                tracing::warn!(backend = %name, "Unknown backend requested");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details(
                        "Unknown backend",
                        format!(
                            "Unknown backend: {}. Available backends: {}",
                            name,
                            available.join(", ")
                        ),
                    ),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(reason = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
            ApiError::Multipart(err) => {
                tracing::warn!(error = %err, "Malformed multipart upload");
                (
                    err.status(),
                    ErrorResponse::with_details("Invalid upload", err.body_text()),
                )
            }
            ApiError::Unavailable(msg) => {
                tracing::warn!(reason = %msg, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::with_details("Service unavailable", msg.clone()),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(reason = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
