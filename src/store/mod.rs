//! Job persistence trait and implementations.
//!
//! [`JobStore`] is the narrow contract through which workers and callers
//! touch job records. It is object safe so the executor can hold an
//! `Arc<dyn JobStore>`; a shared database-backed store for several engine
//! instances only needs to implement this trait.
//!
//! # Contract
//!
//! - Every status change is validated against the
//!   [`JobStatus`] state machine; terminal records are never mutated again.
//! - Lookups of unknown ids fail with [`JobError::NotFound`] rather than
//!   returning a default record.
//! - [`request_cancel`](JobStore::request_cancel) decides atomically between
//!   "fail a pending job" and "flag a running job", so it cannot race with a
//!   worker moving the same job to `InProgress`.
//!
//! # Backends
//!
//! - [`InMemoryJobStore`](memory::InMemoryJobStore) -- `DashMap`-backed store
//!   for a single engine instance.

pub mod memory;

use async_trait::async_trait;

use crate::error::JobError;
use crate::types::job::{Job, JobId, JobOutcome, JobStatus, Progress};

/// What [`JobStore::request_cancel`] did to the job.
#[derive(Debug, Clone)]
pub enum CancelOutcome {
    /// The job was `Pending` and is now `Failed` with a `Cancelled` reason.
    Failed(Job),
    /// The job is `InProgress`; its `cancel_requested` flag is now set.
    Flagged(Job),
    /// The job had already finished and was left untouched.
    AlreadyTerminal(Job),
}

impl CancelOutcome {
    /// The job snapshot after the request.
    pub fn job(&self) -> &Job {
        match self {
            Self::Failed(job) | Self::Flagged(job) | Self::AlreadyTerminal(job) => job,
        }
    }

    /// Consumes the outcome, returning the job snapshot.
    pub fn into_job(self) -> Job {
        match self {
            Self::Failed(job) | Self::Flagged(job) | Self::AlreadyTerminal(job) => job,
        }
    }
}

/// Durable record of job identity, status, result and owning identity.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persists a newly created job. The job must be `Pending`.
    async fn create(&self, job: Job) -> Result<Job, JobError>;

    /// Retrieves a job by id.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] if the job does not exist.
    async fn get(&self, job_id: &JobId) -> Result<Job, JobError>;

    /// Applies a non-terminal transition (in practice `Pending -> InProgress`).
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidTransition`] if the state machine rejects
    /// the change, e.g. because the job was cancelled first.
    async fn update_status(&self, job_id: &JobId, status: JobStatus) -> Result<Job, JobError>;

    /// Moves a job to its terminal status with a result or failure reason.
    async fn finish(&self, job_id: &JobId, outcome: JobOutcome) -> Result<Job, JobError>;

    /// Records progress for an `InProgress` job.
    async fn set_progress(&self, job_id: &JobId, progress: Progress) -> Result<Job, JobError>;

    /// Requests cancellation.
    ///
    /// A `Pending` job becomes `Failed` with a `Cancelled` reason. An
    /// `InProgress` job only has its `cancel_requested` flag set. A terminal
    /// job is returned unchanged.
    async fn request_cancel(&self, job_id: &JobId) -> Result<CancelOutcome, JobError>;

    /// Lists jobs owned by `owner_id`, oldest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Job>, JobError>;
}
