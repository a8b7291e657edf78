//! Execution context handed to a running unit of work.
//!
//! [`JobContext`] scopes everything a unit of work may touch to its own job:
//! the job id, the owning identity the engine resolved, a cooperative
//! cancellation flag, and progress reporting through the [`JobStore`].
//! Units of work never reach back into the executor.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use jobsync::store::JobStore;
//! use jobsync::{InMemoryJobStore, Job, JobContext, JobStatus};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = Arc::new(InMemoryJobStore::new());
//! let job = store.create(Job::new("acct", "cmd", "EV", vec![])).await.unwrap();
//! store.update_status(&job.job_id, JobStatus::InProgress).await.unwrap();
//!
//! let ctx = JobContext::new(store.clone(), job.job_id, "acct".to_string(), CancellationToken::new());
//! ctx.report_progress(40, Some("copying template")).await.unwrap();
//! assert_eq!(ctx.get().await.unwrap().progress.percent, 40);
//! assert!(!ctx.is_cancelled());
//! # });
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::store::JobStore;
use crate::types::job::{Job, JobId, Progress};

/// Per-job handle passed into [`UnitOfWork::execute`](crate::UnitOfWork::execute).
///
/// `Clone + Send + Sync`; clones refer to the same job and token.
#[derive(Clone)]
pub struct JobContext {
    store: Arc<dyn JobStore>,
    job_id: JobId,
    owner_id: String,
    cancel: CancellationToken,
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job_id)
            .field("owner_id", &self.owner_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl JobContext {
    /// Creates a context scoped to `job_id`.
    pub fn new(
        store: Arc<dyn JobStore>,
        job_id: JobId,
        owner_id: String,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            job_id,
            owner_id,
            cancel,
        }
    }

    /// The job this context belongs to.
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// The owning identity the job is attributed to.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Returns `true` once cancellation was requested.
    ///
    /// Cancellation is advisory: the job stays `InProgress` until the unit
    /// of work returns.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when cancellation is requested. Useful in `tokio::select!`.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// A clone of the underlying cancellation token, for handing to sub-tasks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current snapshot of the job record.
    pub async fn get(&self) -> Result<Job, JobError> {
        self.store.get(&self.job_id).await
    }

    /// Records progress. `percent` is clamped to 100.
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidTransition`] if the job is no longer `InProgress`.
    pub async fn report_progress(
        &self,
        percent: u8,
        message: Option<&str>,
    ) -> Result<(), JobError> {
        let progress = Progress {
            percent: percent.min(100),
            message: message.map(str::to_string),
        };
        self.store.set_progress(&self.job_id, progress).await?;
        tracing::trace!(job_id = %self.job_id, percent, "progress reported");
        Ok(())
    }
}
