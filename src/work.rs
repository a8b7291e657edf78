//! The unit-of-work boundary between commands and the engine.
//!
//! Each submitted command implements [`UnitOfWork`]: it names its owning
//! identity, its event type and description, the resources it must be
//! serialized on, and how to execute. The engine never inspects concrete
//! command types.
//!
//! [`FnWork`] adapts a closure for commands that do not need their own type.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::JobContext;
use crate::error::JobError;
use crate::types::key::SyncKey;

/// An opaque operation run as one job.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Response name of the command, echoed back in the [`JobHandle`](crate::JobHandle).
    fn name(&self) -> &str;

    /// Resolves the account or tenant that owns the resource acted upon.
    ///
    /// May fail when the referenced resource no longer exists; the engine
    /// then attributes the job to its system owner instead of rejecting it.
    async fn resolve_owning_identity(&self) -> Result<String, JobError>;

    /// Event type tag, e.g. `VM.START` or `LB.ASSIGN.TO.RULE`.
    fn event_type(&self) -> &str;

    /// Description stored on every lifecycle event of the job.
    fn event_description(&self) -> String;

    /// Resources this work must hold exclusively while it runs.
    fn sync_keys(&self) -> Vec<SyncKey> {
        Vec::new()
    }

    /// Submission-time validation. Errors are returned to the submitter
    /// and no job is created.
    fn validate(&self) -> Result<(), JobError> {
        Ok(())
    }

    /// Performs the work. Errors become the job's failure reason.
    async fn execute(&self, ctx: JobContext) -> anyhow::Result<Value>;
}

#[derive(Debug, Clone)]
enum OwnerSource {
    Known(String),
    Unresolved(String),
}

/// Closure-backed [`UnitOfWork`].
///
/// # Examples
///
/// ```
/// use jobsync::{FnWork, SyncKey, UnitOfWork};
/// use serde_json::json;
///
/// let work = FnWork::new("startvirtualmachineresponse", "VM.START", |ctx| async move {
///     Ok(json!({ "job": ctx.job_id().to_string() }))
/// })
/// .with_owner("account-3")
/// .with_description("starting vm 11")
/// .with_sync_key(SyncKey::new("vm", 11));
///
/// assert_eq!(work.event_type(), "VM.START");
/// assert_eq!(work.sync_keys(), vec![SyncKey::new("vm", 11)]);
/// ```
pub struct FnWork<F> {
    name: String,
    event_type: String,
    description: String,
    owner: OwnerSource,
    sync_keys: Vec<SyncKey>,
    run: F,
}

impl<F> fmt::Debug for FnWork<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnWork")
            .field("name", &self.name)
            .field("event_type", &self.event_type)
            .field("owner", &self.owner)
            .field("sync_keys", &self.sync_keys)
            .finish_non_exhaustive()
    }
}

impl<F, Fut> FnWork<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    /// Creates work named `name` emitting `event_type` events.
    ///
    /// Without [`with_owner`](Self::with_owner) the owning identity is
    /// unresolved and the job is attributed to the system owner.
    pub fn new(name: impl Into<String>, event_type: impl Into<String>, run: F) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            event_type: event_type.into(),
            owner: OwnerSource::Unresolved("no owning identity declared".to_string()),
            sync_keys: Vec::new(),
            run,
        }
    }

    /// Sets the owning identity.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = OwnerSource::Known(owner.into());
        self
    }

    /// Makes owner resolution fail with `reason`, as when the target resource is gone.
    pub fn with_unresolved_owner(mut self, reason: impl Into<String>) -> Self {
        self.owner = OwnerSource::Unresolved(reason.into());
        self
    }

    /// Sets the event description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a key to serialize on.
    pub fn with_sync_key(mut self, key: SyncKey) -> Self {
        self.sync_keys.push(key);
        self
    }

    /// Adds several keys to serialize on.
    pub fn with_sync_keys(mut self, keys: impl IntoIterator<Item = SyncKey>) -> Self {
        self.sync_keys.extend(keys);
        self
    }
}

#[async_trait]
impl<F, Fut> UnitOfWork for FnWork<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve_owning_identity(&self) -> Result<String, JobError> {
        match &self.owner {
            OwnerSource::Known(owner) => Ok(owner.clone()),
            OwnerSource::Unresolved(reason) => {
                Err(JobError::OwningIdentityUnresolved(reason.clone()))
            },
        }
    }

    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn event_description(&self) -> String {
        self.description.clone()
    }

    fn sync_keys(&self) -> Vec<SyncKey> {
        self.sync_keys.clone()
    }

    async fn execute(&self, ctx: JobContext) -> anyhow::Result<Value> {
        (self.run)(ctx).await
    }
}
