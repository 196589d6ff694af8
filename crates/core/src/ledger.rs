// crates/core/src/ledger.rs
//! In-memory job ledger: the single source of truth for job state.
//!
//! One `RwLock` guards the whole table. Job volumes are modest, so a single
//! lock keeps `create`/`transition` trivially atomic; no lock is ever held
//! across an `.await`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::error::LedgerError;
use crate::job::{Job, JobId, Transition};

#[derive(Default)]
struct Table {
    jobs: HashMap<JobId, Job>,
    /// Creation sequence → id, for newest-first listing.
    order: BTreeMap<u64, JobId>,
}

/// Concurrency-safe store of all job records.
pub struct JobLedger {
    next_seq: AtomicU64,
    table: RwLock<Table>,
}

impl JobLedger {
    pub fn new() -> Self {
        Self {
            next_seq: AtomicU64::new(0),
            table: RwLock::new(Table::default()),
        }
    }

    /// Insert a new `PENDING` job and return a snapshot of it.
    pub fn create(
        &self,
        backend_name: impl Into<String>,
        original_filename: impl Into<String>,
    ) -> Job {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut job = Job::new(seq, backend_name.into(), original_filename.into());

        let mut table = self.write();
        while table.jobs.contains_key(&job.id) {
            job.id = JobId::new();
        }
        table.order.insert(seq, job.id);
        table.jobs.insert(job.id, job.clone());
        job
    }

    /// Atomically apply `transition` to job `id` and return the updated snapshot.
    ///
    /// Terminal jobs are never mutated again: any transition out of
    /// `SUCCEEDED`/`FAILED` is rejected with `InvalidTransition`.
    pub fn transition(&self, id: JobId, transition: Transition) -> Result<Job, LedgerError> {
        let mut table = self.write();
        let job = table.jobs.get_mut(&id).ok_or(LedgerError::UnknownJob(id))?;

        let to = transition.target();
        if !job.status.can_transition_to(to) {
            return Err(LedgerError::InvalidTransition {
                id,
                from: job.status,
                to,
            });
        }
        job.apply(transition);
        Ok(job.clone())
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.read().jobs.get(&id).cloned()
    }

    /// Most recently created jobs first, at most `limit` of them.
    pub fn list(&self, limit: usize) -> Vec<Job> {
        let table = self.read();
        table
            .order
            .values()
            .rev()
            .filter_map(|id| table.jobs.get(id))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove terminal jobs that completed before `cutoff`. Returns the evicted ids.
    pub fn evict_terminal_before(&self, cutoff: DateTime<Utc>) -> Vec<JobId> {
        let mut table = self.write();
        let expired: Vec<(u64, JobId)> = table
            .jobs
            .values()
            .filter(|job| job.status.is_terminal())
            .filter(|job| job.completed_at.is_some_and(|at| at < cutoff))
            .map(|job| (job.seq, job.id))
            .collect();

        for (seq, id) in &expired {
            table.jobs.remove(id);
            table.order.remove(seq);
        }
        expired.into_iter().map(|(_, id)| id).collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, Table> {
        self.table.read().unwrap_or_else(|e| {
            tracing::error!("RwLock poisoned reading job ledger: {e}");
            e.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table> {
        self.table.write().unwrap_or_else(|e| {
            tracing::error!("RwLock poisoned writing job ledger: {e}");
            e.into_inner()
        })
    }
}

impl Default for JobLedger {
    fn default() -> Self {
        Self::new()
    }
}
