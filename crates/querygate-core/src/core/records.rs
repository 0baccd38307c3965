// crates/querygate-core/src/core/records.rs
// ============================================================================
// Module: QueryGate Telemetry Records
// Description: Session and execution projections held by the tracker.
// Purpose: Serializable observability snapshots with a small mutable surface.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! Records are projections for observability, not the source of truth for
//! execution state. Identity fields never change after creation; only the
//! timestamps, state, plan, error detail, job-id list and execution count are
//! updated in place by the tracker.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ExecutionId;
use crate::core::identifiers::JobGroupId;
use crate::core::identifiers::SessionId;
use crate::core::state::ExecutionState;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Error Detail
// ============================================================================

/// Failure detail attached to a failed execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Engine error message, verbatim.
    pub message: String,
    /// Optional engine stack trace.
    pub trace: Option<String>,
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Telemetry projection of a client session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier.
    pub session_id: SessionId,
    /// Owning user.
    pub user: String,
    /// Originating client address.
    pub address: String,
    /// Creation time.
    pub start_timestamp: Timestamp,
    /// Close time; unset while the session is open.
    pub finish_timestamp: Timestamp,
    /// Number of executions started in this session.
    pub total_executions: u64,
}

impl SessionRecord {
    /// Returns true while the session is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.finish_timestamp.is_unset()
    }
}

/// Telemetry projection of a statement execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Execution identifier.
    pub execution_id: ExecutionId,
    /// Owning session.
    pub session_id: SessionId,
    /// Submitted statement text.
    pub statement: String,
    /// Engine job group.
    pub group_id: JobGroupId,
    /// Submitting user.
    pub user: String,
    /// Submission time.
    pub start_timestamp: Timestamp,
    /// Completion time; unset while running.
    pub finish_timestamp: Timestamp,
    /// Close time; unset until closed.
    pub close_timestamp: Timestamp,
    /// Execution plan text once compiled.
    pub plan: Option<String>,
    /// Failure detail when failed.
    pub error: Option<ErrorDetail>,
    /// Last observed state.
    pub state: ExecutionState,
    /// Engine jobs spawned under the group, in start order.
    pub job_ids: Vec<String>,
}

impl ExecutionRecord {
    /// Returns true while the execution has not finished.
    #[must_use]
    pub const fn is_unfinished(&self) -> bool {
        self.finish_timestamp.is_unset()
    }
}
