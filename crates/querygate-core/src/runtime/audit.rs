// crates/querygate-core/src/runtime/audit.rs
// ============================================================================
// Module: QueryGate Lifecycle Audit
// Description: Structured lifecycle events and JSON-line audit sinks.
// Purpose: Emit session and execution lifecycle logs without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every lifecycle event applied by the telemetry tracker is also handed to a
//! [`LifecycleAuditSink`]. Sinks write one JSON object per line so deployments
//! can route events to their preferred logging pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::core::identifiers::ExecutionId;
use crate::core::identifiers::SessionId;
use crate::core::state::ExecutionState;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Lifecycle event classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
    /// Session opened.
    SessionCreated,
    /// Session closed.
    SessionClosed,
    /// Statement submitted.
    StatementStart,
    /// Statement compiled.
    StatementParsed,
    /// Statement canceled.
    StatementCanceled,
    /// Statement failed.
    StatementError,
    /// Statement produced its result.
    StatementFinish,
    /// Execution released.
    OperationClosed,
    /// Engine job started under an execution's group.
    JobStart,
}

/// Lifecycle audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Event classification.
    pub kind: LifecycleEventKind,
    /// Session the event concerns.
    pub session_id: Option<SessionId>,
    /// Execution the event concerns.
    pub execution_id: Option<ExecutionId>,
    /// Acting user when known.
    pub user: Option<String>,
    /// Execution state after the event.
    pub state: Option<ExecutionState>,
    /// Free-form detail (error message, job id, pool name).
    pub detail: Option<String>,
}

/// Lifecycle audit event inputs.
#[derive(Debug, Clone)]
pub struct LifecycleAuditEventParams {
    /// Event classification.
    pub kind: LifecycleEventKind,
    /// Session the event concerns.
    pub session_id: Option<SessionId>,
    /// Execution the event concerns.
    pub execution_id: Option<ExecutionId>,
    /// Acting user when known.
    pub user: Option<String>,
    /// Execution state after the event.
    pub state: Option<ExecutionState>,
    /// Free-form detail.
    pub detail: Option<String>,
}

impl LifecycleAuditEvent {
    /// Creates a new lifecycle event stamped with the current time.
    #[must_use]
    pub fn new(params: LifecycleAuditEventParams) -> Self {
        Self {
            event: "querygate_lifecycle",
            timestamp_ms: Timestamp::now().as_millis(),
            kind: params.kind,
            session_id: params.session_id,
            execution_id: params.execution_id,
            user: params.user,
            state: params.state,
            detail: params.detail,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for lifecycle events.
pub trait LifecycleAuditSink: Send + Sync {
    /// Record a lifecycle event.
    fn record(&self, event: &LifecycleAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl LifecycleAuditSink for StderrAuditSink {
    fn record(&self, event: &LifecycleAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl LifecycleAuditSink for FileAuditSink {
    fn record(&self, event: &LifecycleAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl LifecycleAuditSink for NoopAuditSink {
    fn record(&self, _event: &LifecycleAuditEvent) {}
}
