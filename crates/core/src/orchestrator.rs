// crates/core/src/orchestrator.rs
//! Submission and dispatch pipeline.
//!
//! The orchestrator is the only writer of the [`JobLedger`]. `submit` stores
//! the upload, moves the job to `RUNNING`, and spawns a detached execution
//! unit; callers learn the outcome only by polling `status`/`result`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use tokio::io::AsyncRead;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::OrchestratorError;
use crate::job::{Job, JobId, JobResultView, JobStatusView, JobSummary, Transition};
use crate::ledger::JobLedger;
use crate::registry::BackendRegistry;
use crate::storage::{MediaReference, MediaStorage};

/// Message recorded on jobs stopped through [`Orchestrator::cancel`].
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// Execution limits for dispatched jobs.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Upper bound on simultaneously running backends. `None` dispatches
    /// every accepted job immediately; excess jobs otherwise wait in `RUNNING`
    /// until a slot frees up, in submission order.
    pub max_concurrent_jobs: Option<usize>,
    /// Per-job wall clock limit on the backend invocation.
    pub job_timeout: Option<Duration>,
}

struct Inner {
    ledger: JobLedger,
    registry: Arc<BackendRegistry>,
    storage: Arc<dyn MediaStorage>,
    limiter: Option<Arc<Semaphore>>,
    job_timeout: Option<Duration>,
    /// Cancellation handles for dispatched, unfinished jobs.
    handles: Mutex<HashMap<JobId, CancellationToken>>,
}

/// Mediates submission, dispatch, and state transitions for analysis jobs.
///
/// Cheap to clone; all clones share the same ledger.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<BackendRegistry>,
        storage: Arc<dyn MediaStorage>,
        config: OrchestratorConfig,
    ) -> Self {
        let limiter = config
            .max_concurrent_jobs
            .map(|permits| Arc::new(Semaphore::new(permits.max(1))));
        Self {
            inner: Arc::new(Inner {
                ledger: JobLedger::new(),
                registry,
                storage,
                limiter,
                job_timeout: config.job_timeout,
                handles: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Accept an upload for analysis by `backend_name`.
    ///
    /// Fails only when the backend is unknown, in which case no job is
    /// created. Once the id exists, storage and backend failures are
    /// recorded on the job instead of being returned.
    pub async fn submit<R>(
        &self,
        media: &mut R,
        backend_name: &str,
        original_filename: &str,
    ) -> Result<JobId, OrchestratorError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.inner.registry.resolve(backend_name)?;

        let job_id = self.inner.ledger.create(backend_name, original_filename).id;
        counter!("railvision_jobs_submitted_total", "backend" => backend_name.to_string())
            .increment(1);
        tracing::info!(
            job_id = %job_id,
            backend = backend_name,
            filename = original_filename,
            "Job submitted"
        );

        match self.inner.storage.store(media, job_id, original_filename).await {
            Ok(reference) => {
                self.inner.ledger.transition(
                    job_id,
                    Transition::Running {
                        media_reference: reference.clone(),
                    },
                )?;
                self.dispatch(job_id, backend_name.to_string(), reference);
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to store upload");
                self.inner
                    .finish(job_id, backend_name, Err(format!("Failed to store upload: {e}")));
            }
        }

        Ok(job_id)
    }

    /// Spawn the detached execution unit for a job whose media is stored.
    fn dispatch(&self, job_id: JobId, backend_name: String, media: MediaReference) {
        let token = CancellationToken::new();
        self.inner.handles().insert(job_id, token.clone());

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.execute(job_id, backend_name, media, token).await;
            inner.handles().remove(&job_id);
        });
    }

    /// Request cancellation of a dispatched job.
    ///
    /// Returns `Ok(true)` when a cancellation signal was delivered; the job
    /// becomes `FAILED` shortly afterwards. Returns `Ok(false)` when the job
    /// has already finished or has not been dispatched yet.
    pub fn cancel(&self, id: JobId) -> Result<bool, OrchestratorError> {
        let job = self
            .inner
            .ledger
            .get(id)
            .ok_or(OrchestratorError::UnknownJob(id))?;
        if job.status.is_terminal() {
            return Ok(false);
        }

        match self.inner.handles().get(&id) {
            Some(token) => {
                tracing::info!(job_id = %id, "Cancellation requested");
                token.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Evict terminal jobs older than `max_age` and remove their stored media.
    pub async fn evict_expired(&self, max_age: Duration) -> Vec<JobId> {
        let Ok(age) = chrono::Duration::from_std(max_age) else {
            return Vec::new();
        };
        let evicted = self.inner.ledger.evict_terminal_before(chrono::Utc::now() - age);

        for id in &evicted {
            if let Err(e) = self.inner.storage.cleanup(*id).await {
                tracing::warn!(job_id = %id, error = %e, "Failed to clean up stored media");
            }
        }
        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), "Evicted expired jobs");
        }
        evicted
    }

    pub fn status(&self, id: JobId) -> Option<JobStatusView> {
        self.inner.ledger.get(id).map(|job| job.status_view())
    }

    pub fn result(&self, id: JobId) -> Option<JobResultView> {
        self.inner.ledger.get(id).map(|job| job.result_view())
    }

    pub fn job(&self, id: JobId) -> Option<Job> {
        self.inner.ledger.get(id)
    }

    /// Most recent jobs first, at most `limit`.
    pub fn list_jobs(&self, limit: usize) -> Vec<JobSummary> {
        self.inner
            .ledger
            .list(limit)
            .iter()
            .map(Job::summary)
            .collect()
    }

    pub fn list_backend_names(&self) -> Vec<String> {
        self.inner.registry.list_names()
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.inner.registry
    }

    pub fn ledger(&self) -> &JobLedger {
        &self.inner.ledger
    }
}

impl Inner {
    async fn execute(
        &self,
        job_id: JobId,
        backend_name: String,
        media: MediaReference,
        token: CancellationToken,
    ) {
        let _permit = match &self.limiter {
            Some(limiter) => {
                let acquire = Arc::clone(limiter).acquire_owned();
                tokio::select! {
                    permit = acquire => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => {
                            self.finish(job_id, &backend_name, Err("executor shut down".into()));
                            return;
                        }
                    },
                    _ = token.cancelled() => {
                        self.finish(job_id, &backend_name, Err(CANCELLED_MESSAGE.into()));
                        return;
                    }
                }
            }
            None => None,
        };

        let backend = match self.registry.resolve(&backend_name) {
            Ok(backend) => backend,
            Err(e) => {
                self.finish(job_id, &backend_name, Err(e.to_string()));
                return;
            }
        };

        tracing::debug!(job_id = %job_id, backend = %backend_name, "Running analysis");
        gauge!("railvision_jobs_in_flight").increment(1.0);
        let started = Instant::now();

        // A separate task isolates backend panics from the ledger update below.
        let mut run = tokio::spawn(async move { backend.run(&media).await });
        let timeout = self.job_timeout;
        let outcome = tokio::select! {
            joined = &mut run => match joined {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(e)) => Err(format!("Analysis failed: {e}")),
                Err(e) if e.is_panic() => Err("analysis task panicked".to_string()),
                Err(_) => Err("analysis task aborted".to_string()),
            },
            _ = token.cancelled() => {
                run.abort();
                Err(CANCELLED_MESSAGE.to_string())
            }
            _ = expire(timeout) => {
                run.abort();
                Err(format!(
                    "analysis timed out after {}s",
                    timeout.map(|t| t.as_secs_f64()).unwrap_or_default()
                ))
            }
        };

        gauge!("railvision_jobs_in_flight").decrement(1.0);
        histogram!("railvision_job_duration_seconds", "backend" => backend_name.clone())
            .record(started.elapsed().as_secs_f64());
        self.finish(job_id, &backend_name, outcome);
    }

    /// Commit a terminal outcome to the ledger.
    fn finish(&self, job_id: JobId, backend_name: &str, outcome: Result<serde_json::Value, String>) {
        let transition = match outcome {
            Ok(result) => Transition::Succeeded { result },
            Err(message) => Transition::Failed { message },
        };
        let status = transition.target();

        match self.ledger.transition(job_id, transition) {
            Ok(job) => {
                counter!(
                    "railvision_jobs_completed_total",
                    "backend" => backend_name.to_string(),
                    "status" => status.as_str()
                )
                .increment(1);
                match job.message.as_deref() {
                    Some(message) => tracing::warn!(
                        job_id = %job_id,
                        backend = backend_name,
                        reason = message,
                        "Job failed"
                    ),
                    None => tracing::info!(job_id = %job_id, backend = backend_name, "Job succeeded"),
                }
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to record job outcome");
            }
        }
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<JobId, CancellationToken>> {
        self.handles.lock().unwrap_or_else(|e| {
            tracing::error!("Mutex poisoned on job handles: {e}");
            e.into_inner()
        })
    }
}

/// Resolves after `timeout`, or never when there is none.
async fn expire(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}
