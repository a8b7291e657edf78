//! Job record and its status state machine.
//!
//! A [`Job`] is the tracked record of one asynchronous execution of a unit
//! of work. Its [`JobStatus`] only ever moves forward:
//!
//! ```text
//! Pending -> InProgress, Failed
//! InProgress -> Succeeded, Failed
//! Succeeded -> (terminal, no transitions)
//! Failed -> (terminal, no transitions)
//! ```
//!
//! `Pending -> Failed` covers jobs that never ran: cancelled before being
//! dequeued, timed out waiting for a lock, or drained at shutdown.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::JobError;
use crate::types::key::SyncKey;

/// Opaque unique job identifier.
///
/// # Examples
///
/// ```
/// use jobsync::JobId;
///
/// let id = JobId::new();
/// let parsed: JobId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Allocates a fresh random job id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Job lifecycle status.
///
/// # Examples
///
/// ```
/// use jobsync::JobStatus;
///
/// assert!(JobStatus::Pending.can_transition_to(&JobStatus::InProgress));
/// assert!(!JobStatus::Pending.can_transition_to(&JobStatus::Succeeded));
/// assert!(JobStatus::Failed.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Recorded and queued; not yet executing.
    Pending,
    /// A worker holds the job's locks and is executing it.
    InProgress,
    /// Finished successfully (terminal).
    Succeeded,
    /// Finished with a failure reason (terminal).
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl JobStatus {
    /// Returns `true` for `Succeeded` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns `true` if moving from this status to `next` is allowed.
    ///
    /// Self-transitions are rejected.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::InProgress | Self::Failed),
            Self::InProgress => matches!(next, Self::Succeeded | Self::Failed),
            Self::Succeeded | Self::Failed => false,
        }
    }

    /// Validates a transition, returning [`JobError::InvalidTransition`] on rejection.
    ///
    /// # Examples
    ///
    /// ```
    /// use jobsync::{JobId, JobStatus};
    ///
    /// let id = JobId::new();
    /// assert!(JobStatus::InProgress.validate_transition(id, &JobStatus::Succeeded).is_ok());
    /// assert!(JobStatus::Succeeded.validate_transition(id, &JobStatus::Failed).is_err());
    /// ```
    pub fn validate_transition(&self, job_id: JobId, next: &Self) -> Result<(), JobError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(JobError::InvalidTransition {
                job_id,
                from: *self,
                to: *next,
            })
        }
    }
}

/// Category of a job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The unit of work returned an error.
    Execution,
    /// The caller cancelled the job before it started.
    Cancelled,
    /// The configured lock wait bound was exceeded.
    LockTimeout,
    /// The unit of work panicked.
    Panicked,
    /// The executor shut down before the job ran.
    Shutdown,
    /// The engine could not record the job's lifecycle.
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execution => write!(f, "execution"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::LockTimeout => write!(f, "lock_timeout"),
            Self::Panicked => write!(f, "panicked"),
            Self::Shutdown => write!(f, "shutdown"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Why a job ended in `Failed`. The message is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable detail.
    pub message: String,
}

impl FailureReason {
    /// Creates a failure reason, substituting the kind name for an empty message.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            kind.to_string()
        } else {
            message
        };
        Self { kind, message }
    }

    /// Failure for a job cancelled while still pending.
    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "cancelled before execution started")
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Progress reported by a running unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Completion percentage, clamped to `0..=100`.
    pub percent: u8,
    /// Optional status line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Terminal outcome handed to [`JobStore::finish`](crate::store::JobStore::finish).
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The work produced a result payload.
    Succeeded(Value),
    /// The work failed or never ran.
    Failed(FailureReason),
}

impl JobOutcome {
    /// The terminal status this outcome maps to.
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Succeeded(_) => JobStatus::Succeeded,
            Self::Failed(_) => JobStatus::Failed,
        }
    }
}

/// A tracked record of one asynchronous execution.
///
/// `result` is set only on `Succeeded`; `failure` only on `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub job_id: JobId,
    /// Account or tenant responsible for the job.
    pub owner_id: String,
    /// Response name of the submitted command.
    pub command: String,
    /// Event type tag used for lifecycle events.
    pub event_type: String,
    /// Description carried by every lifecycle event of the job.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Keys the job serializes on, in acquisition order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sync_keys: Vec<SyncKey>,
    /// Current status.
    pub status: JobStatus,
    /// Latest reported progress.
    #[serde(default)]
    pub progress: Progress,
    /// Result payload (Succeeded only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure reason (Failed only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    /// Whether a caller asked for cancellation.
    #[serde(default)]
    pub cancel_requested: bool,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
    /// When a worker moved the job to `InProgress`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a new `Pending` job with a fresh id.
    ///
    /// Sync keys are stored sorted and deduplicated.
    ///
    /// # Examples
    ///
    /// ```
    /// use jobsync::{Job, JobStatus, SyncKey};
    ///
    /// let job = Job::new(
    ///     "account-1",
    ///     "assigntoloadbalancerruleresponse",
    ///     "LB.ASSIGN.TO.RULE",
    ///     vec![SyncKey::new("vm", "9"), SyncKey::new("lb", "42"), SyncKey::new("lb", "42")],
    /// );
    /// assert_eq!(job.status, JobStatus::Pending);
    /// assert_eq!(job.sync_keys, vec![SyncKey::new("lb", "42"), SyncKey::new("vm", "9")]);
    /// ```
    pub fn new(
        owner_id: impl Into<String>,
        command: impl Into<String>,
        event_type: impl Into<String>,
        sync_keys: Vec<SyncKey>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            owner_id: owner_id.into(),
            command: command.into(),
            event_type: event_type.into(),
            description: String::new(),
            sync_keys: SyncKey::normalize(sync_keys),
            status: JobStatus::Pending,
            progress: Progress::default(),
            result: None,
            failure: None,
            cancel_requested: false,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Sets the description carried by the job's lifecycle events.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns `true` once the job is `Succeeded` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies a non-terminal status transition in place.
    ///
    /// Store implementations call this under their own record lock.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), JobError> {
        self.status.validate_transition(self.job_id, &next)?;
        if next == JobStatus::InProgress {
            self.started_at = Some(Utc::now());
        }
        self.status = next;
        Ok(())
    }

    /// Applies a terminal outcome in place.
    pub fn finish(&mut self, outcome: JobOutcome) -> Result<(), JobError> {
        self.status
            .validate_transition(self.job_id, &outcome.status())?;
        self.status = outcome.status();
        self.completed_at = Some(Utc::now());
        match outcome {
            JobOutcome::Succeeded(value) => {
                self.progress.percent = 100;
                self.result = Some(value);
            },
            JobOutcome::Failed(reason) => self.failure = Some(reason),
        }
        Ok(())
    }
}
