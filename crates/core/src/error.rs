// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

use crate::job::{JobId, JobStatus};

/// Errors raised by the job ledger.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Job not found: {0}")]
    UnknownJob(JobId),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

/// Errors raised by the media storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No stored media for job {0}")]
    NotFound(JobId),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while an analysis backend runs.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Could not open media file {path}: {reason}")]
    MediaUnreadable { path: PathBuf, reason: String },

    #[error("Frame decoding failed: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

/// Errors surfaced to callers of the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Unknown backend: {name}. Available backends: {available:?}")]
    UnknownBackend {
        name: String,
        available: Vec<String>,
    },

    #[error("Job not found: {0}")]
    UnknownJob(JobId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_display() {
        let id: JobId = "7d4f0c2a-5b1e-4f3a-9c8d-2e6b1a0f9d3c".parse().unwrap();
        let err = LedgerError::UnknownJob(id);
        assert_eq!(
            err.to_string(),
            "Job not found: 7d4f0c2a-5b1e-4f3a-9c8d-2e6b1a0f9d3c"
        );

        let err = LedgerError::InvalidTransition {
            id,
            from: JobStatus::Succeeded,
            to: JobStatus::Failed,
        };
        assert!(err.to_string().contains("SUCCEEDED to FAILED"));
    }

    #[test]
    fn test_unknown_backend_lists_available() {
        let err = OrchestratorError::UnknownBackend {
            name: "nonexistent".into(),
            available: vec!["dummy".into(), "opencv_basic".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("nonexistent"));
        assert!(msg.contains("opencv_basic"));
    }

    #[test]
    fn test_backend_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk error");
        let err: BackendError = io.into();
        assert!(matches!(err, BackendError::Io(_)));
        assert_eq!(err.to_string(), "IO error: disk error");
    }
}
