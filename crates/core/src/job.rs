// crates/core/src/job.rs
//! Job record, lifecycle status, and the read-only views handed to callers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::MediaReference;

/// Unique identifier for a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Allocate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle status of a job.
///
/// `Pending` is the only initial state; `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change applied to a job, carrying exactly the payload its target status allows.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Media persisted; the backend may now run.
    Running { media_reference: MediaReference },
    Succeeded { result: serde_json::Value },
    Failed { message: String },
}

impl Transition {
    pub fn target(&self) -> JobStatus {
        match self {
            Transition::Running { .. } => JobStatus::Running,
            Transition::Succeeded { .. } => JobStatus::Succeeded,
            Transition::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// One tracked unit of submitted analysis work.
///
/// The ledger owns the authoritative copy; everything else sees clones.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub backend_name: String,
    pub original_filename: String,
    pub media_reference: Option<MediaReference>,
    pub result: Option<serde_json::Value>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation order, breaks ties between identical timestamps.
    pub(crate) seq: u64,
}

impl Job {
    pub(crate) fn new(seq: u64, backend_name: String, original_filename: String) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            backend_name,
            original_filename,
            media_reference: None,
            result: None,
            message: None,
            created_at: Utc::now(),
            completed_at: None,
            seq,
        }
    }

    /// Apply `transition` in place. The caller has already checked legality.
    pub(crate) fn apply(&mut self, transition: Transition) {
        self.status = transition.target();
        match transition {
            Transition::Running { media_reference } => {
                self.media_reference = Some(media_reference);
            }
            Transition::Succeeded { result } => {
                self.result = Some(result);
                self.message = None;
            }
            Transition::Failed { message } => {
                self.result = None;
                self.message = Some(message);
            }
        }
        if self.status.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn status_view(&self) -> JobStatusView {
        JobStatusView {
            job_id: self.id,
            status: self.status,
            message: self.message.clone(),
        }
    }

    pub fn result_view(&self) -> JobResultView {
        JobResultView {
            job_id: self.id,
            status: self.status,
            result: self.result.clone(),
            message: self.message.clone(),
            completed_at: self.completed_at,
        }
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.id,
            status: self.status,
            backend_name: self.backend_name.clone(),
            original_filename: self.original_filename.clone(),
            message: self.message.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

/// Response body for a status poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: Option<String>,
}

/// Response body for a result fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResultView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub result: Option<serde_json::Value>,
    pub message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Row in the recent-jobs listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub status: JobStatus,
    pub backend_name: String,
    pub original_filename: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_transitions_follow_state_machine() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Failed));
        assert!(Running.can_transition_to(Succeeded));
        assert!(Running.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Succeeded));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Running.can_transition_to(Pending));
        assert!(!Running.can_transition_to(Running));
        for terminal in [Succeeded, Failed] {
            for next in [Pending, Running, Succeeded, Failed] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&JobStatus::Succeeded).unwrap();
        assert_eq!(json, "\"SUCCEEDED\"");
        let parsed: JobStatus = serde_json::from_str("\"RUNNING\"").unwrap();
        assert_eq!(parsed, JobStatus::Running);
    }

    #[test]
    fn test_job_id_round_trips_through_string() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }

    #[test]
    fn test_apply_sets_completed_at_only_on_terminal() {
        let mut job = Job::new(0, "dummy".into(), "clip.mp4".into());
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.completed_at.is_none());

        job.apply(Transition::Running {
            media_reference: MediaReference::new(PathBuf::from("uploads/x/video.mp4")),
        });
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.completed_at.is_none());
        assert!(job.media_reference.is_some());

        job.apply(Transition::Succeeded {
            result: serde_json::json!({"objects_detected": 3}),
        });
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(job.completed_at.is_some());
        assert!(job.result.is_some());
        assert!(job.message.is_none());
    }

    #[test]
    fn test_result_view_serializes_job_id_as_string() {
        let job = Job::new(0, "dummy".into(), "clip.mp4".into());
        let json = serde_json::to_value(job.result_view()).unwrap();
        assert_eq!(json["job_id"], job.id.to_string());
        assert_eq!(json["status"], "PENDING");
        assert!(json["result"].is_null());
        assert!(json["completed_at"].is_null());
    }
}
