//! Append-only lifecycle event recorder.
//!
//! [`EventRecorder`] is the outbound contract for audit events: records are
//! appended, never updated or deleted. [`InMemoryEventRecorder`] keeps the
//! trail in memory and fans every appended record out on a broadcast
//! channel, which is how callers get notified of completions without polling.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::constants::DEFAULT_EVENT_CHANNEL_CAPACITY;
use crate::error::JobError;
use crate::types::event::EventRecord;
use crate::types::job::JobId;

/// Append-only sink for lifecycle events.
#[async_trait]
pub trait EventRecorder: Send + Sync {
    /// Appends `event`, assigning its id. Returns the stored record.
    async fn append(&self, event: EventRecord) -> Result<EventRecord, JobError>;

    /// Events correlated with `job_id`, in append order.
    async fn events_for_job(&self, job_id: &JobId) -> Result<Vec<EventRecord>, JobError>;

    /// Events attributed to `owner_id`, in append order.
    async fn events_for_owner(&self, owner_id: &str) -> Result<Vec<EventRecord>, JobError>;

    /// Subscribes to records appended from now on.
    fn subscribe(&self) -> broadcast::Receiver<EventRecord>;
}

/// In-memory [`EventRecorder`].
///
/// Ids and timestamps are assigned under the write lock, so id order equals
/// append order and timestamps never go backwards along it.
///
/// # Examples
///
/// ```
/// use jobsync::{EventPhase, EventRecord, EventRecorder, InMemoryEventRecorder, JobId};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let recorder = InMemoryEventRecorder::new();
/// let job_id = JobId::new();
/// let scheduled = recorder
///     .append(EventRecord::new(job_id, "acct", "VM.START", "starting vm 3", EventPhase::Scheduled))
///     .await
///     .unwrap();
/// assert_eq!(scheduled.id, 1);
/// assert_eq!(recorder.events_for_job(&job_id).await.unwrap().len(), 1);
/// # });
/// ```
#[derive(Debug)]
pub struct InMemoryEventRecorder {
    events: RwLock<Vec<EventRecord>>,
    next_id: AtomicU64,
    tx: broadcast::Sender<EventRecord>,
}

impl InMemoryEventRecorder {
    /// Creates an empty recorder with the default broadcast capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }

    /// Creates an empty recorder whose broadcast channel buffers `capacity` records.
    ///
    /// Slow subscribers that fall further behind observe `Lagged`; the
    /// stored trail is unaffected.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            events: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            tx,
        }
    }

    /// Total number of stored records.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns `true` if nothing was appended yet.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Snapshot of the whole trail.
    pub fn all(&self) -> Vec<EventRecord> {
        self.events.read().clone()
    }
}

impl Default for InMemoryEventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventRecorder for InMemoryEventRecorder {
    async fn append(&self, mut event: EventRecord) -> Result<EventRecord, JobError> {
        let mut events = self.events.write();
        event.id = self.next_id.fetch_add(1, Ordering::Relaxed);
        event.timestamp = Utc::now();
        events.push(event.clone());
        // Sent under the lock so subscribers see append order. No subscribers is fine.
        let _ = self.tx.send(event.clone());
        Ok(event)
    }

    async fn events_for_job(&self, job_id: &JobId) -> Result<Vec<EventRecord>, JobError> {
        Ok(self
            .events
            .read()
            .iter()
            .filter(|e| e.job_id == *job_id)
            .cloned()
            .collect())
    }

    async fn events_for_owner(&self, owner_id: &str) -> Result<Vec<EventRecord>, JobError> {
        Ok(self
            .events
            .read()
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::event::EventPhase;

    fn event(job_id: JobId, owner: &str, phase: EventPhase) -> EventRecord {
        EventRecord::new(job_id, owner, "VM.START", "starting vm", phase)
    }

    #[tokio::test]
    async fn ids_increase_in_append_order() {
        let recorder = InMemoryEventRecorder::new();
        let job = JobId::new();
        let a = recorder
            .append(event(job, "o", EventPhase::Scheduled))
            .await
            .unwrap();
        let b = recorder
            .append(event(job, "o", EventPhase::Started).with_start_event_id(a.id))
            .await
            .unwrap();
        assert!(b.id > a.id);
        assert_eq!(b.start_event_id, Some(a.id));
    }

    #[tokio::test]
    async fn timestamps_follow_id_order() {
        let recorder = InMemoryEventRecorder::new();
        let built_first = event(JobId::new(), "o", EventPhase::Scheduled);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let built_second = event(JobId::new(), "o", EventPhase::Scheduled);

        // Appended in the opposite order they were built.
        let first = recorder.append(built_second).await.unwrap();
        let second = recorder.append(built_first).await.unwrap();
        assert!(second.id > first.id);
        assert!(second.timestamp >= first.timestamp);
    }

    #[tokio::test]
    async fn queries_filter_by_job_and_owner() {
        let recorder = InMemoryEventRecorder::new();
        let (j1, j2) = (JobId::new(), JobId::new());
        recorder
            .append(event(j1, "alice", EventPhase::Scheduled))
            .await
            .unwrap();
        recorder
            .append(event(j2, "bob", EventPhase::Scheduled))
            .await
            .unwrap();
        recorder
            .append(event(j1, "alice", EventPhase::Started))
            .await
            .unwrap();

        let trail = recorder.events_for_job(&j1).await.unwrap();
        assert_eq!(
            trail.iter().map(|e| e.phase).collect::<Vec<_>>(),
            vec![EventPhase::Scheduled, EventPhase::Started]
        );
        assert_eq!(recorder.events_for_owner("bob").await.unwrap().len(), 1);
        assert!(recorder.events_for_owner("carol").await.unwrap().is_empty());
        assert_eq!(recorder.len(), 3);
    }

    #[tokio::test]
    async fn subscribers_receive_appended_records() {
        let recorder = InMemoryEventRecorder::with_capacity(4);
        let mut rx = recorder.subscribe();
        let job = JobId::new();
        recorder
            .append(event(job, "o", EventPhase::Scheduled))
            .await
            .unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.job_id, job);
        assert_eq!(received.id, 1);
    }
}
