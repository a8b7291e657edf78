//! Job executor: submission, worker pool and lifecycle management.
//!
//! [`JobExecutor::submit`] appends a job's `Scheduled` event, records it
//! `Pending` and queues it over an mpsc channel, returning a [`JobHandle`]
//! without waiting for execution. A dispatcher task drains the channel and
//! spawns one task per job, which:
//!
//! 1. acquires the job's sync keys through the [`SyncCoordinator`] (the job
//!    stays `Pending` while it waits);
//! 2. claims one of `worker_count` execution slots;
//! 3. moves the job to `InProgress` and appends `Started`;
//! 4. executes the unit of work, capturing errors and panics;
//! 5. stores the terminal status and appends `Completed` or `Failed`;
//! 6. releases the slot and then the keys.
//!
//! A job waiting for a contended key holds no slot, so jobs on other keys
//! keep running. Steps 3 to 5 run while the keys are held, so for two jobs on
//! the same key the second one's `Started` event always follows the first
//! one's terminal event.
//!
//! Shutdown is cooperative: job tasks are signalled through a
//! [`CancellationToken`] and tracked with a [`TaskTracker`]. Jobs still in
//! the channel when the dispatcher stops are failed with a `Shutdown` reason.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn, Instrument};

use crate::config::EngineConfig;
use crate::context::JobContext;
use crate::error::JobError;
use crate::events::{EventRecorder, InMemoryEventRecorder};
use crate::lock::ResourceLockRegistry;
use crate::store::memory::InMemoryJobStore;
use crate::store::{CancelOutcome, JobStore};
use crate::sync::SyncCoordinator;
use crate::types::event::{EventPhase, EventRecord};
use crate::types::job::{FailureKind, FailureReason, Job, JobId, JobOutcome, JobStatus};
use crate::types::key::SyncKey;
use crate::work::UnitOfWork;

/// How often [`JobExecutor::wait`] re-reads the store when no terminal event arrives.
const WAIT_RECHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Immediate response to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    /// Id of the created job.
    pub job_id: JobId,
    /// Response name of the submitted command.
    pub response_name: String,
}

/// Event attribution shared by every lifecycle event of one job.
#[derive(Debug, Clone)]
struct Lifecycle {
    job_id: JobId,
    owner_id: String,
    event_type: String,
    description: String,
    scheduled_event_id: Option<u64>,
}

impl Lifecycle {
    fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.job_id,
            owner_id: job.owner_id.clone(),
            event_type: job.event_type.clone(),
            description: job.description.clone(),
            scheduled_event_id: None,
        }
    }

    fn event(&self, phase: EventPhase) -> EventRecord {
        let event = EventRecord::new(
            self.job_id,
            self.owner_id.clone(),
            self.event_type.clone(),
            self.description.clone(),
            phase,
        );
        match self.scheduled_event_id {
            Some(id) if phase != EventPhase::Scheduled => event.with_start_event_id(id),
            _ => event,
        }
    }
}

struct QueuedJob {
    lifecycle: Lifecycle,
    keys: Vec<SyncKey>,
    cancel: CancellationToken,
    work: Arc<dyn UnitOfWork>,
}

#[derive(Clone)]
struct RunningJob {
    cancel: CancellationToken,
    lifecycle: Lifecycle,
}

struct Inner {
    store: Arc<dyn JobStore>,
    recorder: Arc<dyn EventRecorder>,
    coordinator: SyncCoordinator,
    config: EngineConfig,
    queue_tx: parking_lot::Mutex<Option<mpsc::UnboundedSender<QueuedJob>>>,
    /// Execution slots, one per worker.
    workers: Semaphore,
    /// Jobs submitted but not yet finished.
    running: DashMap<JobId, RunningJob>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    accepting: AtomicBool,
}

/// Builder for [`JobExecutor`].
///
/// Defaults: [`EngineConfig::default`], an [`InMemoryJobStore`], an
/// [`InMemoryEventRecorder`] and a fresh [`ResourceLockRegistry`].
#[derive(Default)]
pub struct JobExecutorBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn JobStore>>,
    recorder: Option<Arc<dyn EventRecorder>>,
    registry: Option<ResourceLockRegistry>,
}

impl fmt::Debug for JobExecutorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobExecutorBuilder")
            .field("config", &self.config)
            .field("custom_store", &self.store.is_some())
            .field("custom_recorder", &self.recorder.is_some())
            .finish_non_exhaustive()
    }
}

impl JobExecutorBuilder {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the number of workers (at least 1).
    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count.max(1);
        self
    }

    /// Bounds the time a job may wait for its sync keys.
    pub fn lock_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.lock_wait_timeout_ms =
            timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Sets the owning identity used when a command cannot resolve its own.
    pub fn system_owner(mut self, owner: impl Into<String>) -> Self {
        self.config.system_owner = owner.into();
        self
    }

    /// Uses `store` for job records.
    pub fn store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses `recorder` for lifecycle events.
    pub fn recorder(mut self, recorder: Arc<dyn EventRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Uses `registry` for resource locks, e.g. to share it with another component.
    pub fn lock_registry(mut self, registry: ResourceLockRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Builds the executor and spawns its dispatcher.
    ///
    /// Out-of-range settings are normalized: zero workers become one and an
    /// empty system owner becomes [`SYSTEM_OWNER`](crate::SYSTEM_OWNER).
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn build(self) -> JobExecutor {
        let mut config = self.config;
        config.worker_count = config.worker_count.max(1);
        if config.system_owner.trim().is_empty() {
            config.system_owner = crate::constants::SYSTEM_OWNER.to_string();
        }

        let recorder = self.recorder.unwrap_or_else(|| {
            Arc::new(InMemoryEventRecorder::with_capacity(
                config.event_channel_capacity,
            ))
        });
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryJobStore::new()));
        let coordinator = SyncCoordinator::new(self.registry.unwrap_or_default())
            .with_wait_timeout(config.lock_wait_timeout());

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            store,
            recorder,
            coordinator,
            queue_tx: parking_lot::Mutex::new(Some(queue_tx)),
            workers: Semaphore::new(config.worker_count),
            running: DashMap::new(),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            accepting: AtomicBool::new(true),
            config,
        });

        inner
            .tracker
            .spawn(dispatch_loop(Arc::clone(&inner), queue_rx));
        debug!(workers = inner.config.worker_count, "job executor started");

        JobExecutor { inner }
    }
}

/// Runs submitted units of work as tracked, serialized jobs.
///
/// Dropping the executor stops it in the background: queued jobs are failed
/// and running ones are signalled. Call [`shutdown`](Self::shutdown) to also
/// wait for that to finish.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use jobsync::{EventPhase, FnWork, JobExecutor};
/// use serde_json::json;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let executor = JobExecutor::builder().build();
/// let work = FnWork::new("startvirtualmachineresponse", "VM.START", |_ctx| async {
///     Ok(json!({ "state": "Running" }))
/// })
/// .with_owner("account-3");
///
/// let handle = executor.submit(Arc::new(work)).await.unwrap();
/// executor.wait(&handle.job_id).await.unwrap();
///
/// let phases: Vec<_> = executor
///     .events_for(&handle.job_id)
///     .await
///     .unwrap()
///     .into_iter()
///     .map(|e| e.phase)
///     .collect();
/// assert_eq!(phases, vec![EventPhase::Scheduled, EventPhase::Started, EventPhase::Completed]);
/// executor.shutdown().await;
/// # });
/// ```
pub struct JobExecutor {
    inner: Arc<Inner>,
}

impl fmt::Debug for JobExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobExecutor")
            .field("config", &self.inner.config)
            .field("queued_or_running", &self.inner.running.len())
            .field("accepting", &self.inner.accepting.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl JobExecutor {
    /// Starts building an executor.
    pub fn builder() -> JobExecutorBuilder {
        JobExecutorBuilder::default()
    }

    /// Builds an executor from `config` with in-memory store and recorder.
    pub fn new(config: EngineConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// The job store.
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.inner.store
    }

    /// The event recorder.
    pub fn recorder(&self) -> &Arc<dyn EventRecorder> {
        &self.inner.recorder
    }

    /// The resource lock registry.
    pub fn lock_registry(&self) -> &ResourceLockRegistry {
        self.inner.coordinator.registry()
    }

    /// The effective configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Submits `work` for asynchronous execution.
    ///
    /// Returns as soon as the job's `Scheduled` event is appended, the job is
    /// recorded `Pending` and it is queued. The event is appended before the
    /// record is stored, so a job visible in the store always has its
    /// `Scheduled` event. If the command cannot resolve its owning identity
    /// the job is attributed to the configured system owner.
    ///
    /// # Errors
    ///
    /// - [`JobError::ShuttingDown`] after [`shutdown`](Self::shutdown).
    /// - [`JobError::InvalidWork`] (or the error from [`UnitOfWork::validate`])
    ///   when the work is rejected; no job is created.
    /// - Recorder errors while appending `Scheduled`; no job is created.
    /// - Store errors while recording the job; its trail is closed with `Failed`.
    pub async fn submit(&self, work: Arc<dyn UnitOfWork>) -> Result<JobHandle, JobError> {
        let inner = &self.inner;
        if !inner.accepting.load(Ordering::Acquire) {
            return Err(JobError::ShuttingDown);
        }

        let response_name = work.name().to_string();
        if response_name.trim().is_empty() {
            return Err(JobError::InvalidWork(
                "command name must not be empty".to_string(),
            ));
        }
        let event_type = work.event_type().to_string();
        if event_type.trim().is_empty() {
            return Err(JobError::InvalidWork(
                "event type must not be empty".to_string(),
            ));
        }
        work.validate()?;

        let owner_id = inner.resolve_owner(work.as_ref()).await;
        let job = Job::new(owner_id, response_name.clone(), event_type, work.sync_keys())
            .with_description(work.event_description());
        let job_id = job.job_id;

        let mut lifecycle = Lifecycle::from_job(&job);
        let scheduled = inner
            .recorder
            .append(lifecycle.event(EventPhase::Scheduled))
            .await
            .inspect_err(|err| error!(%job_id, error = %err, "failed to record scheduled event"))?;
        lifecycle.scheduled_event_id = Some(scheduled.id);

        let cancel = inner.shutdown.child_token();
        inner.running.insert(
            job_id,
            RunningJob {
                cancel: cancel.clone(),
                lifecycle: lifecycle.clone(),
            },
        );
        let job = match inner.store.create(job).await {
            Ok(job) => job,
            Err(err) => {
                error!(%job_id, error = %err, "failed to store scheduled job");
                inner.running.remove(&job_id);
                inner.record(&lifecycle, EventPhase::Failed).await;
                return Err(err);
            },
        };

        let queued = QueuedJob {
            lifecycle,
            keys: job.sync_keys,
            cancel,
            work,
        };
        let rejected = match inner.queue_tx.lock().as_ref() {
            Some(tx) => tx.send(queued).err().map(|e| e.0),
            None => Some(queued),
        };
        if let Some(queued) = rejected {
            inner.running.remove(&job_id);
            let reason = FailureReason::new(
                FailureKind::Shutdown,
                "executor shut down before the job was queued",
            );
            inner.fail_unstarted(&queued.lifecycle, reason).await;
            return Err(JobError::ShuttingDown);
        }

        debug!(%job_id, command = %response_name, "job scheduled");
        Ok(JobHandle {
            job_id,
            response_name,
        })
    }

    /// Current snapshot of a job.
    pub async fn get_status(&self, job_id: &JobId) -> Result<Job, JobError> {
        self.inner.store.get(job_id).await
    }

    /// Requests cancellation of a job.
    ///
    /// A `Pending` job, including one waiting for its sync keys, becomes
    /// `Failed` with a `Cancelled` reason and gets its `Failed` event; it
    /// never starts. An `InProgress` job is only signalled through
    /// [`JobContext::is_cancelled`] and keeps running until its unit of work
    /// returns. A terminal job is returned unchanged.
    pub async fn cancel(&self, job_id: &JobId) -> Result<Job, JobError> {
        let inner = &self.inner;
        let outcome = inner.store.request_cancel(job_id).await?;
        let running = inner.running.get(job_id).map(|entry| entry.value().clone());

        match outcome {
            CancelOutcome::Failed(job) => {
                let lifecycle = match running {
                    Some(running) => {
                        running.cancel.cancel();
                        running.lifecycle
                    },
                    None => Lifecycle::from_job(&job),
                };
                warn!(%job_id, owner = %job.owner_id, "pending job cancelled");
                inner.record(&lifecycle, EventPhase::Failed).await;
                Ok(job)
            },
            CancelOutcome::Flagged(job) => {
                if let Some(running) = running {
                    running.cancel.cancel();
                }
                info!(%job_id, "cancellation requested for running job");
                Ok(job)
            },
            CancelOutcome::AlreadyTerminal(job) => Ok(job),
        }
    }

    /// Waits until the job is `Succeeded` or `Failed` and returns it.
    ///
    /// Listens for the job's terminal event instead of polling, re-reading
    /// the store periodically in case an event was missed.
    pub async fn wait(&self, job_id: &JobId) -> Result<Job, JobError> {
        // Subscribe before the first read so a completion in between is not lost.
        let mut events = self.inner.recorder.subscribe();
        loop {
            let job = self.inner.store.get(job_id).await?;
            if job.is_terminal() {
                return Ok(job);
            }
            wait_for_terminal_event(&mut events, job_id).await;
        }
    }

    /// Jobs attributed to `owner_id`, oldest first.
    pub async fn list_jobs(&self, owner_id: &str) -> Result<Vec<Job>, JobError> {
        self.inner.store.list_by_owner(owner_id).await
    }

    /// The lifecycle events of one job, in append order.
    pub async fn events_for(&self, job_id: &JobId) -> Result<Vec<EventRecord>, JobError> {
        self.inner.recorder.events_for_job(job_id).await
    }

    /// Subscribes to every lifecycle event appended from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventRecord> {
        self.inner.recorder.subscribe()
    }

    /// Stops the executor.
    ///
    /// New submissions are rejected, running units of work are signalled to
    /// cancel and awaited, jobs still waiting for locks, for a worker or in
    /// the queue are failed with a `Shutdown` reason. Calling it again is a
    /// no-op.
    pub async fn shutdown(&self) {
        if self.inner.accepting.load(Ordering::Acquire) {
            info!("job executor shutting down");
        }
        self.inner.stop();
        self.inner.tracker.wait().await;
        debug!("job executor stopped");
    }
}

impl Drop for JobExecutor {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

async fn wait_for_terminal_event(events: &mut broadcast::Receiver<EventRecord>, job_id: &JobId) {
    loop {
        match tokio::time::timeout(WAIT_RECHECK_INTERVAL, events.recv()).await {
            Ok(Ok(event)) if event.job_id == *job_id && event.phase.is_terminal() => return,
            Ok(Ok(_)) => {},
            // Lagged: the terminal event may have been skipped.
            Ok(Err(RecvError::Lagged(_))) | Err(_) => return,
            Ok(Err(RecvError::Closed)) => {
                tokio::time::sleep(WAIT_RECHECK_INTERVAL).await;
                return;
            },
        }
    }
}

async fn dispatch_loop(inner: Arc<Inner>, mut queue: mpsc::UnboundedReceiver<QueuedJob>) {
    debug!(workers = inner.config.worker_count, "dispatcher started");
    loop {
        let next = tokio::select! {
            biased;
            () = inner.shutdown.cancelled() => None,
            job = queue.recv() => job,
        };
        let Some(job) = next else {
            break;
        };
        let span = tracing::info_span!(
            "job",
            job_id = %job.lifecycle.job_id,
            owner = %job.lifecycle.owner_id,
            event_type = %job.lifecycle.event_type,
        );
        let inner_for_job = Arc::clone(&inner);
        inner
            .tracker
            .spawn(async move { inner_for_job.run_job(job).await }.instrument(span));
    }

    // Late sends now fail at the submitter, which fails its own job.
    queue.close();
    while let Ok(job) = queue.try_recv() {
        let reason = FailureReason::new(
            FailureKind::Shutdown,
            "executor shut down before the job started",
        );
        inner.fail_unstarted(&job.lifecycle, reason).await;
        inner.running.remove(&job.lifecycle.job_id);
    }
    debug!("dispatcher stopped");
}

impl Inner {
    async fn resolve_owner(&self, work: &dyn UnitOfWork) -> String {
        match work.resolve_owning_identity().await {
            Ok(owner) if !owner.trim().is_empty() => owner,
            Ok(_) => {
                warn!(
                    command = work.name(),
                    owner = %self.config.system_owner,
                    "empty owning identity; attributing job to system owner"
                );
                self.config.system_owner.clone()
            },
            Err(err) => {
                warn!(
                    command = work.name(),
                    error = %err,
                    owner = %self.config.system_owner,
                    "attributing job to system owner"
                );
                self.config.system_owner.clone()
            },
        }
    }

    /// Rejects new submissions and signals the dispatcher and every job task.
    fn stop(&self) {
        self.accepting.store(false, Ordering::Release);
        drop(self.queue_tx.lock().take());
        self.shutdown.cancel();
        self.tracker.close();
    }

    async fn run_job(&self, job: QueuedJob) {
        let job_id = job.lifecycle.job_id;
        match self
            .coordinator
            .acquire_all(job_id, &job.keys, &job.cancel)
            .await
        {
            Ok(guards) => {
                match self.claim_worker(&job.cancel).await {
                    Some(_slot) => self.execute_locked(&job).await,
                    None => self.fail_unstarted(&job.lifecycle, self.interrupted()).await,
                }
                // Reverse acquisition order.
                for guard in guards.into_iter().rev() {
                    guard.release();
                }
            },
            Err(err) => {
                let reason = match err.into_job_error() {
                    Some(timeout) => {
                        FailureReason::new(FailureKind::LockTimeout, timeout.to_string())
                    },
                    None => self.interrupted(),
                };
                self.fail_unstarted(&job.lifecycle, reason).await;
            },
        }
        self.running.remove(&job_id);
    }

    /// Waits for a free execution slot, or `None` once `cancel` fires.
    async fn claim_worker(&self, cancel: &CancellationToken) -> Option<SemaphorePermit<'_>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            slot = self.workers.acquire() => slot.ok(),
        }
    }

    /// Failure reason for a job whose cancellation token fired before it started.
    fn interrupted(&self) -> FailureReason {
        if self.shutdown.is_cancelled() {
            FailureReason::new(
                FailureKind::Shutdown,
                "executor shut down before the job started",
            )
        } else {
            FailureReason::cancelled()
        }
    }

    /// Steps run while the job's keys and an execution slot are held.
    async fn execute_locked(&self, job: &QueuedJob) {
        let lifecycle = &job.lifecycle;
        let job_id = lifecycle.job_id;

        match self.store.update_status(&job_id, JobStatus::InProgress).await {
            Ok(_) => {},
            Err(JobError::InvalidTransition { from, .. }) => {
                debug!(status = %from, "job no longer pending; not starting");
                return;
            },
            Err(err) => {
                error!(error = %err, "failed to mark job in progress");
                let reason = FailureReason::new(FailureKind::Internal, err.to_string());
                self.fail_unstarted(lifecycle, reason).await;
                return;
            },
        }
        self.record(lifecycle, EventPhase::Started).await;
        debug!("job started");

        let ctx = JobContext::new(
            Arc::clone(&self.store),
            job_id,
            lifecycle.owner_id.clone(),
            job.cancel.clone(),
        );
        let outcome = match AssertUnwindSafe(job.work.execute(ctx)).catch_unwind().await {
            Ok(Ok(value)) => JobOutcome::Succeeded(value),
            Ok(Err(err)) => {
                JobOutcome::Failed(FailureReason::new(FailureKind::Execution, format!("{err:#}")))
            },
            Err(panic) => JobOutcome::Failed(FailureReason::new(
                FailureKind::Panicked,
                panic_message(panic.as_ref()),
            )),
        };

        let phase = match &outcome {
            JobOutcome::Succeeded(_) => EventPhase::Completed,
            JobOutcome::Failed(_) => EventPhase::Failed,
        };
        match self.store.finish(&job_id, outcome).await {
            Ok(finished) => {
                match &finished.failure {
                    None => info!("job succeeded"),
                    Some(reason) => info!(kind = %reason.kind, reason = %reason.message, "job failed"),
                }
                self.record(lifecycle, phase).await;
            },
            Err(err) => error!(error = %err, "failed to store job outcome"),
        }
    }

    /// Fails a job that never started. A job that is already terminal is left alone.
    async fn fail_unstarted(&self, lifecycle: &Lifecycle, reason: FailureReason) {
        let job_id = lifecycle.job_id;
        let kind = reason.kind;
        match self.store.finish(&job_id, JobOutcome::Failed(reason)).await {
            Ok(_) => {
                warn!(%job_id, %kind, "job failed before starting");
                self.record(lifecycle, EventPhase::Failed).await;
            },
            Err(JobError::InvalidTransition { from, .. }) => {
                debug!(%job_id, status = %from, "job already finished");
            },
            Err(err) => error!(%job_id, error = %err, "failed to fail unstarted job"),
        }
    }

    async fn record(&self, lifecycle: &Lifecycle, phase: EventPhase) -> Option<EventRecord> {
        match self.recorder.append(lifecycle.event(phase)).await {
            Ok(event) => Some(event),
            Err(err) => {
                error!(job_id = %lifecycle.job_id, %phase, error = %err, "failed to record event");
                None
            },
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("unit of work panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("unit of work panicked: {message}")
    } else {
        "unit of work panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::FnWork;
    use serde_json::json;

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "unit of work panicked: boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "unit of work panicked: bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unit of work panicked");
    }

    #[test]
    fn scheduled_event_has_no_start_link() {
        let lifecycle = Lifecycle {
            job_id: JobId::new(),
            owner_id: "acct".to_string(),
            event_type: "VM.START".to_string(),
            description: "starting vm".to_string(),
            scheduled_event_id: Some(9),
        };
        assert_eq!(lifecycle.event(EventPhase::Scheduled).start_event_id, None);
        assert_eq!(lifecycle.event(EventPhase::Failed).start_event_id, Some(9));
    }

    #[test]
    fn lifecycle_from_record_keeps_the_event_description() {
        let job = Job::new("acct", "startvirtualmachineresponse", "VM.START", vec![])
            .with_description("starting vm: 3");
        let event = Lifecycle::from_job(&job).event(EventPhase::Failed);
        assert_eq!(event.description, "starting vm: 3");
        assert_eq!(event.event_type, "VM.START");
        assert_eq!(event.start_event_id, None);
    }

    #[tokio::test]
    async fn builder_normalizes_settings() {
        let executor = JobExecutor::builder()
            .worker_count(0)
            .system_owner("")
            .lock_wait_timeout(Some(Duration::from_secs(2)))
            .build();
        assert_eq!(executor.config().worker_count, 1);
        assert_eq!(executor.config().system_owner, "system");
        assert_eq!(executor.config().lock_wait_timeout_ms, Some(2000));
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn empty_event_type_is_rejected_without_a_record() {
        let executor = JobExecutor::builder().build();
        let work = FnWork::new("cmd", "", |_ctx| async { Ok(json!(null)) }).with_owner("a");
        let err = executor.submit(Arc::new(work)).await.unwrap_err();
        assert!(matches!(err, JobError::InvalidWork(_)));
        assert!(executor.list_jobs("a").await.unwrap().is_empty());
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected() {
        let executor = JobExecutor::builder().build();
        executor.shutdown().await;
        let work = FnWork::new("cmd", "EV", |_ctx| async { Ok(json!(null)) });
        assert!(matches!(
            executor.submit(Arc::new(work)).await,
            Err(JobError::ShuttingDown)
        ));
    }
}
