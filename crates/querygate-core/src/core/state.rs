// crates/querygate-core/src/core/state.rs
// ============================================================================
// Module: QueryGate Execution State Machine
// Description: Execution lifecycle states and the transition function.
// Purpose: Make every lifecycle change an explicit, total (state, event) step.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! An execution moves strictly forward:
//! `Started -> Compiled -> {Finished | Failed} -> Closed`, with
//! `Started -> Failed` when compilation never happened and `Canceled` as an
//! external interrupt from `Started` or `Compiled`. [`transition`] is total over
//! every `(state, event)` pair: each pair is applied, suppressed (late progress
//! after a cancel), or rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: States and Events
// ============================================================================

/// Execution lifecycle state.
///
/// # Invariants
/// - Variants are stable for serialization and telemetry labeling.
/// - `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Submitted; compilation has not completed.
    Started,
    /// Engine accepted the statement and produced a plan.
    Compiled,
    /// Results are available through the cursor.
    Finished,
    /// Engine reported an error.
    Failed,
    /// Interrupted externally before completion.
    Canceled,
    /// Released; no further mutation is permitted.
    Closed,
}

impl ExecutionState {
    /// Returns a stable label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Compiled => "compiled",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Closed => "closed",
        }
    }

    /// Returns true while the statement is still running.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Started | Self::Compiled)
    }

    /// Returns true once the statement reached an outcome.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !self.is_running()
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle event applied to an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// Engine compiled the statement.
    Compile,
    /// Result cursor was built.
    Finish,
    /// Engine reported an error.
    Fail,
    /// Client requested cancellation.
    Cancel,
    /// Client released the execution.
    Close,
}

impl ExecutionEvent {
    /// Returns a stable label for the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Finish => "finish",
            Self::Fail => "fail",
            Self::Cancel => "cancel",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for ExecutionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Transition Function
// ============================================================================

/// Outcome of an accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The execution moves to the contained state.
    Applied(ExecutionState),
    /// Progress reported after a cancel; the execution stays `Canceled`.
    Suppressed,
}

/// Rejected `(state, event)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid execution transition: {event} while {state}")]
pub struct TransitionError {
    /// State the execution was in.
    pub state: ExecutionState,
    /// Event that was rejected.
    pub event: ExecutionEvent,
}

/// Applies `event` to `state`.
///
/// # Errors
///
/// Returns [`TransitionError`] for pairs outside the lifecycle.
pub const fn transition(
    state: ExecutionState,
    event: ExecutionEvent,
) -> Result<Transition, TransitionError> {
    use ExecutionEvent as E;
    use ExecutionState as S;

    match (state, event) {
        (S::Started, E::Compile) => Ok(Transition::Applied(S::Compiled)),
        (S::Compiled, E::Finish) => Ok(Transition::Applied(S::Finished)),
        (S::Started | S::Compiled, E::Fail) => Ok(Transition::Applied(S::Failed)),
        (S::Started | S::Compiled, E::Cancel) => Ok(Transition::Applied(S::Canceled)),
        (S::Canceled, E::Compile | E::Finish | E::Fail) => Ok(Transition::Suppressed),
        (S::Started | S::Compiled | S::Finished | S::Failed | S::Canceled, E::Close) => {
            Ok(Transition::Applied(S::Closed))
        }
        _ => Err(TransitionError {
            state,
            event,
        }),
    }
}
