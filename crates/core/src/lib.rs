// crates/core/src/lib.rs
//! Job orchestration core for the railvision analysis service.
//!
//! - `JobLedger`: authoritative in-memory store of job records
//! - `BackendRegistry`: name → `AnalysisBackend` lookup
//! - `MediaStorage` / `LocalStorage`: persisted uploads, one directory per job
//! - `Orchestrator`: submission, detached dispatch, and outcome recording

pub mod backend;
pub mod error;
pub mod job;
pub mod ledger;
pub mod orchestrator;
pub mod registry;
pub mod storage;

pub use backend::AnalysisBackend;
pub use error::*;
pub use job::{Job, JobId, JobResultView, JobStatus, JobStatusView, JobSummary, Transition};
pub use ledger::JobLedger;
pub use orchestrator::{Orchestrator, OrchestratorConfig, CANCELLED_MESSAGE};
pub use registry::BackendRegistry;
pub use storage::{LocalStorage, MediaReference, MediaStorage};
