//! Synchronization coordinator: run a unit of work while holding its keys.
//!
//! [`SyncCoordinator::run_exclusive`] acquires every declared key from the
//! [`ResourceLockRegistry`] in canonical [`SyncKey`] order, runs the given
//! future, and releases the keys before returning, on success, error, panic
//! unwinding and future cancellation alike (release happens in guard `Drop`).
//!
//! Acquiring in one fixed, caller-independent order means two jobs that
//! share several keys always queue for them in the same sequence, so they
//! cannot deadlock on each other.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::lock::{LockGuard, ResourceLockRegistry};
use crate::types::job::JobId;
use crate::types::key::SyncKey;

/// Why [`SyncCoordinator::run_exclusive`] did not run its future.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExclusiveError {
    /// The wait bound elapsed while queued for `key`.
    #[error("timed out after {}ms waiting for lock on {key}", waited.as_millis())]
    Timeout {
        /// The contended key.
        key: SyncKey,
        /// Total time spent waiting.
        waited: Duration,
    },
    /// The job's cancellation token fired before all keys were held.
    #[error("cancelled while waiting for locks")]
    Cancelled,
}

impl ExclusiveError {
    /// Converts a timeout into [`JobError::LockAcquisitionTimeout`].
    ///
    /// Returns `None` for [`ExclusiveError::Cancelled`], which callers
    /// resolve against the job's own cancellation state.
    pub fn into_job_error(self) -> Option<JobError> {
        match self {
            Self::Timeout { key, waited } => Some(JobError::LockAcquisitionTimeout {
                key,
                waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
            }),
            Self::Cancelled => None,
        }
    }
}

/// Serializes execution on declared [`SyncKey`]s.
///
/// # Examples
///
/// ```
/// use jobsync::{JobId, SyncCoordinator, SyncKey};
/// use tokio_util::sync::CancellationToken;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let coordinator = SyncCoordinator::default();
/// let keys = [SyncKey::new("vm", "7"), SyncKey::new("lb", "42")];
/// let value = coordinator
///     .run_exclusive(JobId::new(), &keys, &CancellationToken::new(), async { 40 + 2 })
///     .await
///     .unwrap();
/// assert_eq!(value, 42);
/// assert!(coordinator.registry().is_empty());
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyncCoordinator {
    registry: ResourceLockRegistry,
    wait_timeout: Option<Duration>,
}

impl SyncCoordinator {
    /// Creates a coordinator over `registry` with no wait bound.
    pub fn new(registry: ResourceLockRegistry) -> Self {
        Self {
            registry,
            wait_timeout: None,
        }
    }

    /// Bounds the total time spent waiting for all keys of one job.
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// The underlying lock registry.
    pub fn registry(&self) -> &ResourceLockRegistry {
        &self.registry
    }

    /// The configured wait bound, if any.
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout
    }

    /// Acquires all `keys` for `job_id` in canonical order.
    ///
    /// Duplicates are collapsed. On error every key acquired so far is
    /// released before returning.
    ///
    /// # Errors
    ///
    /// [`ExclusiveError::Cancelled`] if `cancel` fires first,
    /// [`ExclusiveError::Timeout`] if the wait bound elapses.
    pub async fn acquire_all(
        &self,
        job_id: JobId,
        keys: &[SyncKey],
        cancel: &CancellationToken,
    ) -> Result<Vec<LockGuard>, ExclusiveError> {
        if cancel.is_cancelled() {
            return Err(ExclusiveError::Cancelled);
        }

        let ordered = SyncKey::normalize(keys.to_vec());
        let started = Instant::now();
        let deadline = self.wait_timeout.map(|t| started + t);
        let mut guards = Vec::with_capacity(ordered.len());

        for key in &ordered {
            let acquire = self.registry.acquire(key, job_id);
            let guard = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ExclusiveError::Cancelled),
                acquired = Self::bounded(acquire, deadline) => acquired,
            };
            match guard {
                Some(guard) => guards.push(guard),
                None => {
                    tracing::warn!(%job_id, %key, "lock wait bound exceeded");
                    return Err(ExclusiveError::Timeout {
                        key: key.clone(),
                        waited: started.elapsed(),
                    });
                },
            }
        }
        Ok(guards)
    }

    async fn bounded<F>(acquire: F, deadline: Option<Instant>) -> Option<LockGuard>
    where
        F: Future<Output = LockGuard>,
    {
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, acquire).await.ok(),
            None => Some(acquire.await),
        }
    }

    /// Runs `work` while holding every key in `keys`.
    ///
    /// With no keys, `work` runs immediately without serialization.
    /// Keys are released after `work` completes and before this returns.
    pub async fn run_exclusive<F, T>(
        &self,
        job_id: JobId,
        keys: &[SyncKey],
        cancel: &CancellationToken,
        work: F,
    ) -> Result<T, ExclusiveError>
    where
        F: Future<Output = T>,
    {
        let guards = self.acquire_all(job_id, keys, cancel).await?;
        let output = work.await;
        // Reverse acquisition order.
        for guard in guards.into_iter().rev() {
            guard.release();
        }
        Ok(output)
    }
}
