//! Lifecycle event records.
//!
//! Every job produces an append-only trail: `Scheduled` when submitted,
//! `Started` when a worker begins executing it, then `Completed` or
//! `Failed`. Events after `Scheduled` carry `start_event_id`, the id of the
//! job's `Scheduled` event, so downstream consumers can correlate the trail
//! without joining on the job id.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::job::JobId;

/// Lifecycle phase an event marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPhase {
    /// Job accepted and queued.
    Scheduled,
    /// Worker began executing the job.
    Started,
    /// Job finished successfully.
    Completed,
    /// Job finished with a failure.
    Failed,
}

impl fmt::Display for EventPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Started => write!(f, "started"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl EventPhase {
    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// An audit record marking one job lifecycle transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Recorder-assigned id, strictly increasing in append order. Zero until appended.
    pub id: u64,
    /// Correlated job.
    pub job_id: JobId,
    /// Owning identity the event is attributed to.
    pub owner_id: String,
    /// Event type tag, e.g. `LB.ASSIGN.TO.RULE`.
    pub event_type: String,
    /// Human-readable description supplied by the command.
    pub description: String,
    /// Lifecycle phase.
    pub phase: EventPhase,
    /// Id of the job's `Scheduled` event (absent on the `Scheduled` event itself).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_event_id: Option<u64>,
    /// When the event was recorded. Recorders stamp it on append.
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    /// Builds an unappended event stamped with the current time.
    ///
    /// # Examples
    ///
    /// ```
    /// use jobsync::{EventPhase, EventRecord, JobId};
    ///
    /// let event = EventRecord::new(
    ///     JobId::new(),
    ///     "account-1",
    ///     "LB.ASSIGN.TO.RULE",
    ///     "assigning vm 9 to load balancer 42",
    ///     EventPhase::Scheduled,
    /// );
    /// assert_eq!(event.id, 0);
    /// assert!(event.start_event_id.is_none());
    /// ```
    pub fn new(
        job_id: JobId,
        owner_id: impl Into<String>,
        event_type: impl Into<String>,
        description: impl Into<String>,
        phase: EventPhase,
    ) -> Self {
        Self {
            id: 0,
            job_id,
            owner_id: owner_id.into(),
            event_type: event_type.into(),
            description: description.into(),
            phase,
            start_event_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Links this event to the job's `Scheduled` event.
    pub fn with_start_event_id(mut self, id: u64) -> Self {
        self.start_event_id = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(EventPhase::Completed).unwrap(),
            "completed"
        );
        assert_eq!(EventPhase::Scheduled.to_string(), "scheduled");
    }

    #[test]
    fn start_event_id_omitted_until_linked() {
        let event = EventRecord::new(JobId::new(), "o", "T", "d", EventPhase::Scheduled);
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("start_event_id").is_none());

        let linked = event.with_start_event_id(7);
        let json = serde_json::to_value(&linked).unwrap();
        assert_eq!(json["start_event_id"], 7);
    }
}
