//! Error types for job operations.
//!
//! [`JobError`] covers failures surfaced synchronously to callers of the
//! executor, store and recorder. Failures of the unit of work itself are
//! never returned here: they are captured into the terminal job record as a
//! [`FailureReason`](crate::types::FailureReason).

use thiserror::Error;

use crate::types::job::{JobId, JobStatus};
use crate::types::key::SyncKey;

/// Errors that can occur during job operations.
///
/// # Examples
///
/// ```
/// use jobsync::{JobError, JobId};
///
/// let id = JobId::new();
/// let err = JobError::NotFound { job_id: id };
/// assert!(err.is_not_found());
/// assert!(err.to_string().contains(&id.to_string()));
/// ```
#[derive(Debug, Error)]
pub enum JobError {
    /// No job with the given id exists.
    #[error("job not found: {job_id}")]
    NotFound {
        /// The unknown job id.
        job_id: JobId,
    },

    /// Attempted a status change the job state machine does not allow.
    #[error("invalid transition from {from} to {to} for job {job_id}")]
    InvalidTransition {
        /// The job being transitioned.
        job_id: JobId,
        /// Current status.
        from: JobStatus,
        /// Rejected target status.
        to: JobStatus,
    },

    /// The unit of work was rejected at submission time.
    #[error("invalid unit of work: {0}")]
    InvalidWork(String),

    /// The executor no longer accepts submissions.
    #[error("job executor is shutting down")]
    ShuttingDown,

    /// The command could not name its owning identity.
    ///
    /// Recovered locally by the executor, which substitutes the system owner.
    #[error("owning identity could not be resolved: {0}")]
    OwningIdentityUnresolved(String),

    /// Waiting for a contended key exceeded the configured bound.
    #[error("timed out after {waited_ms}ms waiting for lock on {key}")]
    LockAcquisitionTimeout {
        /// The contended key.
        key: SyncKey,
        /// How long the job waited.
        waited_ms: u64,
    },

    /// Backend storage error.
    #[error("store error: {0}")]
    Store(String),
}

impl JobError {
    /// Returns `true` for [`JobError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
