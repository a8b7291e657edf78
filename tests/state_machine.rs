//! Job status state machine tests.
//!
//! Covers the full 4x4 transition matrix: 4 valid transitions, 4
//! self-transition rejections and the remaining invalid moves, including
//! every transition out of a terminal state.

// ─── is_terminal Tests ──────────────────────────────────────────────────────

mod is_terminal {
    use jobsync::JobStatus;

    #[test]
    fn pending_is_not_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[test]
    fn in_progress_is_not_terminal() {
        assert!(!JobStatus::InProgress.is_terminal());
    }

    #[test]
    fn succeeded_is_terminal() {
        assert!(JobStatus::Succeeded.is_terminal());
    }

    #[test]
    fn failed_is_terminal() {
        assert!(JobStatus::Failed.is_terminal());
    }
}

// ─── Valid Transitions (4 total) ────────────────────────────────────────────

mod valid_transitions {
    use jobsync::{JobId, JobStatus};

    fn assert_valid(from: JobStatus, to: JobStatus) {
        assert!(from.can_transition_to(&to), "{from} -> {to}");
        assert!(from.validate_transition(JobId::new(), &to).is_ok());
    }

    #[test]
    fn pending_to_in_progress() {
        assert_valid(JobStatus::Pending, JobStatus::InProgress);
    }

    #[test]
    fn pending_to_failed() {
        assert_valid(JobStatus::Pending, JobStatus::Failed);
    }

    #[test]
    fn in_progress_to_succeeded() {
        assert_valid(JobStatus::InProgress, JobStatus::Succeeded);
    }

    #[test]
    fn in_progress_to_failed() {
        assert_valid(JobStatus::InProgress, JobStatus::Failed);
    }
}

// ─── Invalid Transitions ────────────────────────────────────────────────────

mod invalid_transitions {
    use jobsync::{JobError, JobId, JobStatus};
    use pretty_assertions::assert_eq;

    const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::InProgress,
        JobStatus::Succeeded,
        JobStatus::Failed,
    ];

    fn assert_invalid(from: JobStatus, to: JobStatus) {
        let id = JobId::new();
        assert!(!from.can_transition_to(&to), "{from} -> {to}");
        match from.validate_transition(id, &to) {
            Err(JobError::InvalidTransition {
                job_id,
                from: f,
                to: t,
            }) => {
                assert_eq!(job_id, id);
                assert_eq!(f, from);
                assert_eq!(t, to);
            },
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[test]
    fn self_transitions_are_rejected() {
        for status in ALL {
            assert_invalid(status, status);
        }
    }

    #[test]
    fn pending_cannot_skip_to_succeeded() {
        assert_invalid(JobStatus::Pending, JobStatus::Succeeded);
    }

    #[test]
    fn in_progress_cannot_return_to_pending() {
        assert_invalid(JobStatus::InProgress, JobStatus::Pending);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [JobStatus::Succeeded, JobStatus::Failed] {
            for to in ALL {
                assert_invalid(from, to);
            }
        }
    }

    #[test]
    fn exactly_four_transitions_are_valid() {
        let valid = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (from, to)))
            .filter(|(from, to)| from.can_transition_to(to))
            .count();
        assert_eq!(valid, 4);
    }
}

// ─── Job Record Mutation ────────────────────────────────────────────────────

mod job_record {
    use jobsync::{FailureKind, FailureReason, Job, JobOutcome, JobStatus};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn failure_sets_reason_and_not_result() {
        let mut job = Job::new("acct", "cmd", "EV", vec![]);
        job.transition(JobStatus::InProgress).unwrap();
        job.finish(JobOutcome::Failed(FailureReason::new(
            FailureKind::Execution,
            "disk full",
        )))
        .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());
        assert_eq!(job.failure.as_ref().unwrap().message, "disk full");
    }

    #[test]
    fn pending_job_cannot_succeed_directly() {
        let mut job = Job::new("acct", "cmd", "EV", vec![]);
        assert!(job.finish(JobOutcome::Succeeded(json!(1))).is_err());
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn in_progress_job_cannot_move_back_to_pending() {
        let mut job = Job::new("acct", "cmd", "EV", vec![]);
        job.transition(JobStatus::InProgress).unwrap();
        assert!(job.transition(JobStatus::Pending).is_err());
        assert_eq!(job.status, JobStatus::InProgress);
    }
}
