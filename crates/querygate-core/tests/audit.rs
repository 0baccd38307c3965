// crates/querygate-core/tests/audit.rs
// ============================================================================
// Module: Lifecycle Audit Tests
// Description: JSON-line output of the file audit sink.
// Purpose: Ensure lifecycle events are persisted one object per line.
// Dependencies: querygate-core, serde_json, tempfile
// ============================================================================

//! Lifecycle audit tests: JSON-line output of the file audit sink.

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

use std::sync::Arc;

use querygate_core::ExecutionId;
use querygate_core::FileAuditSink;
use querygate_core::JobGroupId;
use querygate_core::LifecycleAuditSink;
use querygate_core::RetentionConfig;
use querygate_core::SessionId;
use querygate_core::TelemetryTracker;
use serde_json::Value;

#[test]
fn file_sink_writes_one_json_object_per_event() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lifecycle.jsonl");
    let sink = Arc::new(FileAuditSink::new(&path).unwrap());
    let tracker =
        TelemetryTracker::new(RetentionConfig::default(), sink as Arc<dyn LifecycleAuditSink>);

    let session = SessionId::new("session-1");
    let execution = ExecutionId::new("exec-1");
    tracker.on_session_created(&session, "alice", "10.0.0.1");
    tracker.on_statement_start(
        &execution,
        &session,
        "SELECT 1",
        &JobGroupId::from(&execution),
        "alice",
    );
    tracker.on_operation_closed(&execution);

    let contents = std::fs::read_to_string(&path).unwrap();
    let events: Vec<Value> =
        contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|event| event["event"] == "querygate_lifecycle"));
    assert_eq!(events[0]["kind"], "session_created");
    assert_eq!(events[0]["detail"], "10.0.0.1");
    assert_eq!(events[1]["kind"], "statement_start");
    assert_eq!(events[1]["execution_id"], "exec-1");
    assert_eq!(events[2]["kind"], "operation_closed");
    assert_eq!(events[2]["state"], "closed");
}

#[test]
fn file_sink_appends_to_existing_logs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lifecycle.jsonl");
    std::fs::write(&path, "{\"event\":\"earlier\"}\n").unwrap();

    let sink = Arc::new(FileAuditSink::new(&path).unwrap());
    let tracker =
        TelemetryTracker::new(RetentionConfig::default(), sink as Arc<dyn LifecycleAuditSink>);
    tracker.on_session_created(&SessionId::new("session-2"), "bob", "10.0.0.2");

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.starts_with("{\"event\":\"earlier\"}"));
}
