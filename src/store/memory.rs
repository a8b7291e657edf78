//! In-memory job store.
//!
//! [`InMemoryJobStore`] keeps job records in a [`DashMap`] keyed by
//! [`JobId`]. Every mutation runs under the record's shard lock, so status
//! validation and the write it guards are atomic with respect to other
//! callers touching the same job.
//!
//! # Examples
//!
//! ```
//! use jobsync::store::memory::InMemoryJobStore;
//! use jobsync::store::JobStore;
//! use jobsync::{Job, JobStatus};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = InMemoryJobStore::new();
//! let job = store.create(Job::new("acct", "cmd", "EV", vec![])).await.unwrap();
//! let job = store.update_status(&job.job_id, JobStatus::InProgress).await.unwrap();
//! assert_eq!(job.status, JobStatus::InProgress);
//! # });
//! ```

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::JobError;
use crate::store::{CancelOutcome, JobStore};
use crate::types::job::{FailureReason, Job, JobId, JobOutcome, JobStatus, Progress};

/// Thread-safe in-memory [`JobStore`].
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<JobId, Job>,
}

impl InMemoryJobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
        }
    }

    /// Returns the number of stored jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns `true` if no jobs are stored.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Runs `f` against the stored record under its shard lock and returns a snapshot.
    fn mutate<F>(&self, job_id: &JobId, f: F) -> Result<Job, JobError>
    where
        F: FnOnce(&mut Job) -> Result<(), JobError>,
    {
        let mut entry = self
            .jobs
            .get_mut(job_id)
            .ok_or(JobError::NotFound { job_id: *job_id })?;
        f(entry.value_mut())?;
        Ok(entry.value().clone())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: Job) -> Result<Job, JobError> {
        if job.status != JobStatus::Pending {
            return Err(JobError::Store(format!(
                "job {} must be created pending, got {}",
                job.job_id, job.status
            )));
        }
        match self.jobs.entry(job.job_id) {
            Entry::Occupied(_) => Err(JobError::Store(format!(
                "job {} already exists",
                job.job_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(job.clone());
                Ok(job)
            },
        }
    }

    async fn get(&self, job_id: &JobId) -> Result<Job, JobError> {
        self.jobs
            .get(job_id)
            .map(|entry| entry.value().clone())
            .ok_or(JobError::NotFound { job_id: *job_id })
    }

    async fn update_status(&self, job_id: &JobId, status: JobStatus) -> Result<Job, JobError> {
        if status.is_terminal() {
            return Err(JobError::Store(format!(
                "terminal status {status} requires an outcome; use finish()"
            )));
        }
        self.mutate(job_id, |job| job.transition(status))
    }

    async fn finish(&self, job_id: &JobId, outcome: JobOutcome) -> Result<Job, JobError> {
        self.mutate(job_id, |job| job.finish(outcome))
    }

    async fn set_progress(&self, job_id: &JobId, progress: Progress) -> Result<Job, JobError> {
        self.mutate(job_id, |job| {
            if job.status != JobStatus::InProgress {
                return Err(JobError::InvalidTransition {
                    job_id: job.job_id,
                    from: job.status,
                    to: JobStatus::InProgress,
                });
            }
            job.progress = Progress {
                percent: progress.percent.min(100),
                message: progress.message,
            };
            Ok(())
        })
    }

    async fn request_cancel(&self, job_id: &JobId) -> Result<CancelOutcome, JobError> {
        let mut entry = self
            .jobs
            .get_mut(job_id)
            .ok_or(JobError::NotFound { job_id: *job_id })?;
        let job = entry.value_mut();
        match job.status {
            JobStatus::Pending => {
                job.finish(JobOutcome::Failed(FailureReason::cancelled()))?;
                job.cancel_requested = true;
                Ok(CancelOutcome::Failed(job.clone()))
            },
            JobStatus::InProgress => {
                job.cancel_requested = true;
                Ok(CancelOutcome::Flagged(job.clone()))
            },
            JobStatus::Succeeded | JobStatus::Failed => {
                Ok(CancelOutcome::AlreadyTerminal(job.clone()))
            },
        }
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Job>, JobError> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| entry.value().owner_id == owner_id)
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::job::FailureKind;
    use serde_json::json;

    fn pending() -> Job {
        Job::new("acct", "cmd", "EV", vec![])
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let store = InMemoryJobStore::new();
        let job = store.create(pending()).await.unwrap();
        let err = store.create(job).await.unwrap_err();
        assert!(matches!(err, JobError::Store(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_non_pending() {
        let store = InMemoryJobStore::new();
        let mut job = pending();
        job.status = JobStatus::InProgress;
        assert!(store.create(job).await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn update_status_refuses_terminal_targets() {
        let store = InMemoryJobStore::new();
        let job = store.create(pending()).await.unwrap();
        assert!(store
            .update_status(&job.job_id, JobStatus::Succeeded)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn progress_requires_in_progress_and_clamps() {
        let store = InMemoryJobStore::new();
        let job = store.create(pending()).await.unwrap();
        let progress = Progress {
            percent: 150,
            message: Some("copying".to_string()),
        };
        assert!(store
            .set_progress(&job.job_id, progress.clone())
            .await
            .is_err());

        store
            .update_status(&job.job_id, JobStatus::InProgress)
            .await
            .unwrap();
        let job = store.set_progress(&job.job_id, progress).await.unwrap();
        assert_eq!(job.progress.percent, 100);
        assert_eq!(job.progress.message.as_deref(), Some("copying"));
    }

    #[tokio::test]
    async fn cancel_pending_fails_job() {
        let store = InMemoryJobStore::new();
        let job = store.create(pending()).await.unwrap();
        let outcome = store.request_cancel(&job.job_id).await.unwrap();
        assert!(matches!(outcome, CancelOutcome::Failed(_)));
        let job = outcome.into_job();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.cancel_requested);
        assert_eq!(job.failure.unwrap().kind, FailureKind::Cancelled);
    }

    #[tokio::test]
    async fn cancel_in_progress_only_flags() {
        let store = InMemoryJobStore::new();
        let job = store.create(pending()).await.unwrap();
        store
            .update_status(&job.job_id, JobStatus::InProgress)
            .await
            .unwrap();
        let outcome = store.request_cancel(&job.job_id).await.unwrap();
        assert!(matches!(outcome, CancelOutcome::Flagged(_)));
        let job = outcome.into_job();
        assert_eq!(job.status, JobStatus::InProgress);
        assert!(job.cancel_requested);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let store = InMemoryJobStore::new();
        let id = JobId::new();
        assert!(store.get(&id).await.unwrap_err().is_not_found());
        assert!(store.request_cancel(&id).await.unwrap_err().is_not_found());
        assert!(store
            .update_status(&id, JobStatus::InProgress)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn list_by_owner_filters() {
        let store = InMemoryJobStore::new();
        store.create(Job::new("alice", "c", "EV", vec![])).await.unwrap();
        store.create(Job::new("bob", "c", "EV", vec![])).await.unwrap();
        store.create(Job::new("alice", "c", "EV", vec![])).await.unwrap();
        let jobs = store.list_by_owner("alice").await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs[0].created_at <= jobs[1].created_at);
        assert!(store.list_by_owner("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_terminal_is_noop() {
        let store = InMemoryJobStore::new();
        let job = store.create(pending()).await.unwrap();
        store
            .update_status(&job.job_id, JobStatus::InProgress)
            .await
            .unwrap();
        store
            .finish(&job.job_id, JobOutcome::Succeeded(json!(1)))
            .await
            .unwrap();
        let outcome = store.request_cancel(&job.job_id).await.unwrap();
        assert!(matches!(outcome, CancelOutcome::AlreadyTerminal(_)));
        let job = outcome.into_job();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(!job.cancel_requested);
    }
}
