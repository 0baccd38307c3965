// crates/querygate-core/tests/telemetry.rs
// ============================================================================
// Module: Telemetry Tracker Tests
// Description: Bounded retention, job fan-out, and stop semantics.
// Purpose: Ensure the tracker never evicts live records and stays bounded.
// Dependencies: querygate-core, proptest
// ============================================================================

//! ## Overview
//! Drives the tracker directly with lifecycle events. The property test
//! interleaves opens and finishes and checks that trimming only ever removes
//! finished records, oldest first.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::sync::Arc;

use common::RecordingAuditSink;
use proptest::prelude::*;
use querygate_core::ErrorDetail;
use querygate_core::ExecutionId;
use querygate_core::ExecutionState;
use querygate_core::JobGroupId;
use querygate_core::LifecycleAuditSink;
use querygate_core::LifecycleEventKind;
use querygate_core::RetentionConfig;
use querygate_core::SessionId;
use querygate_core::TelemetryTracker;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn tracker(max_sessions: usize, max_executions: usize) -> TelemetryTracker {
    TelemetryTracker::without_audit(RetentionConfig {
        max_retained_sessions: max_sessions,
        max_retained_executions: max_executions,
    })
}

fn start(tracker: &TelemetryTracker, session: &SessionId, index: usize) -> ExecutionId {
    let execution_id = ExecutionId::new(format!("exec-{index}"));
    tracker.on_statement_start(
        &execution_id,
        session,
        "SELECT 1",
        &JobGroupId::from(&execution_id),
        "alice",
    );
    execution_id
}

// ============================================================================
// SECTION: Retention
// ============================================================================

#[test]
fn unfinished_executions_are_never_evicted() {
    let tracker = tracker(10, 10);
    let session = SessionId::new("s-1");
    tracker.on_session_created(&session, "alice", "10.0.0.1");
    let ids: Vec<ExecutionId> = (0 .. 15).map(|index| start(&tracker, &session, index)).collect();
    assert_eq!(tracker.execution_count(), 15);
    assert_eq!(tracker.total_running_count(), 15);

    tracker.on_statement_finish(&ids[0]);
    assert_eq!(tracker.execution_count(), 14);
    assert!(tracker.execution(&ids[0]).is_none());

    tracker.on_statement_finish(&ids[5]);
    assert_eq!(tracker.execution_count(), 13);
    assert!(tracker.execution(&ids[5]).is_none());
    assert!(tracker.execution(&ids[1]).is_some());
}

#[test]
fn trimming_removes_oldest_finished_first() {
    let tracker = tracker(10, 20);
    let session = SessionId::new("s-1");
    let ids: Vec<ExecutionId> = (0 .. 20).map(|index| start(&tracker, &session, index)).collect();
    for id in &ids {
        tracker.on_statement_finish(id);
    }
    start(&tracker, &session, 20);
    let remaining: Vec<ExecutionId> =
        tracker.execution_list().into_iter().map(|record| record.execution_id).collect();
    assert_eq!(remaining.len(), 19);
    assert_eq!(remaining.first(), Some(&ids[2]));
}

#[test]
fn session_records_trim_after_close() {
    let tracker = tracker(2, 10);
    let sessions: Vec<SessionId> =
        (0 .. 3).map(|index| SessionId::new(format!("s-{index}"))).collect();
    for session in &sessions {
        tracker.on_session_created(session, "alice", "10.0.0.1");
    }
    assert_eq!(tracker.session_count(), 3);
    assert_eq!(tracker.online_session_count(), 3);

    tracker.on_session_closed(&sessions[1]);
    assert_eq!(tracker.session_count(), 2);
    assert!(tracker.session(&sessions[1]).is_none());
    assert_eq!(tracker.online_session_count(), 2);
}

proptest! {
    #[test]
    fn trimming_never_drops_live_records(
        limit in 1usize .. 12,
        ops in prop::collection::vec(any::<(bool, u8)>(), 1 .. 80),
    ) {
        let tracker = tracker(limit, limit);
        let session = SessionId::new("s-prop");
        let mut started: Vec<ExecutionId> = Vec::new();
        let mut finished: Vec<bool> = Vec::new();
        for (is_start, pick) in ops {
            if is_start || started.is_empty() {
                started.push(start(&tracker, &session, started.len()));
                finished.push(false);
            } else {
                let index = usize::from(pick) % started.len();
                tracker.on_statement_finish(&started[index]);
                finished[index] = true;
            }
            for (index, id) in started.iter().enumerate() {
                if !finished[index] {
                    prop_assert!(tracker.execution(id).is_some(), "live {} evicted", id);
                }
            }
            let live = finished.iter().filter(|done| !**done).count();
            prop_assert!(tracker.execution_count() <= limit.max(live) + 1);
        }
        let ordered: Vec<ExecutionId> =
            tracker.execution_list().into_iter().map(|record| record.execution_id).collect();
        let expected: Vec<ExecutionId> =
            started.iter().filter(|id| ordered.contains(id)).cloned().collect();
        prop_assert_eq!(ordered, expected);
    }
}

// ============================================================================
// SECTION: Events
// ============================================================================

#[test]
fn job_start_fans_out_to_every_execution_in_the_group() {
    let tracker = tracker(10, 10);
    let session = SessionId::new("s-1");
    let group = JobGroupId::new("shared");
    let first = ExecutionId::new("a");
    let second = ExecutionId::new("b");
    let other = ExecutionId::new("c");
    tracker.on_statement_start(&first, &session, "SELECT 1", &group, "alice");
    tracker.on_statement_start(&second, &session, "SELECT 2", &group, "alice");
    tracker.on_statement_start(&other, &session, "SELECT 3", &JobGroupId::new("c"), "alice");

    tracker.on_job_start("job-7", &group);
    assert_eq!(tracker.execution(&first).unwrap().job_ids, vec!["job-7".to_string()]);
    assert_eq!(tracker.execution(&second).unwrap().job_ids, vec!["job-7".to_string()]);
    assert!(tracker.execution(&other).unwrap().job_ids.is_empty());

    tracker.on_job_start("job-8", &JobGroupId::new("nobody"));
    assert_eq!(tracker.execution(&first).unwrap().job_ids.len(), 1);
}

#[test]
fn statement_start_counts_session_executions() {
    let tracker = tracker(10, 10);
    let session = SessionId::new("s-1");
    tracker.on_session_created(&session, "alice", "10.0.0.1");
    start(&tracker, &session, 0);
    start(&tracker, &session, 1);
    assert_eq!(tracker.session(&session).unwrap().total_executions, 2);
    assert_eq!(tracker.executions_for_session(&session).len(), 2);
}

#[test]
fn error_and_close_fill_timestamps() {
    let tracker = tracker(10, 10);
    let session = SessionId::new("s-1");
    let id = start(&tracker, &session, 0);
    tracker.on_statement_error(
        &id,
        &ErrorDetail {
            message: "boom".to_string(),
            trace: Some("at engine".to_string()),
        },
    );
    let record = tracker.execution(&id).unwrap();
    assert_eq!(record.state, ExecutionState::Failed);
    assert!(!record.finish_timestamp.is_unset());
    assert_eq!(record.error.unwrap().message, "boom");

    tracker.on_operation_closed(&id);
    let record = tracker.execution(&id).unwrap();
    assert_eq!(record.state, ExecutionState::Closed);
    assert!(record.close_timestamp.as_millis() >= record.finish_timestamp.as_millis());
}

#[test]
fn close_without_finish_sets_finish_timestamp() {
    let tracker = tracker(10, 10);
    let id = start(&tracker, &SessionId::new("s-1"), 0);
    tracker.on_operation_closed(&id);
    let record = tracker.execution(&id).unwrap();
    assert!(!record.finish_timestamp.is_unset());
    assert_eq!(record.finish_timestamp, record.close_timestamp);
}

#[test]
fn events_after_stop_are_dropped() {
    let audit = RecordingAuditSink::new();
    let tracker = TelemetryTracker::new(
        RetentionConfig::default(),
        Arc::clone(&audit) as Arc<dyn LifecycleAuditSink>,
    );
    let session = SessionId::new("s-1");
    tracker.on_session_created(&session, "alice", "10.0.0.1");
    tracker.stop();
    assert!(tracker.is_stopped());

    start(&tracker, &session, 0);
    tracker.on_session_closed(&session);
    assert_eq!(tracker.execution_count(), 0);
    assert!(tracker.session(&session).unwrap().is_open());

    let kinds: Vec<LifecycleEventKind> = audit.events().iter().map(|event| event.kind).collect();
    assert_eq!(kinds, vec![LifecycleEventKind::SessionCreated]);
}
