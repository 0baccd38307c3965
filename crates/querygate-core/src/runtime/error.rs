// crates/querygate-core/src/runtime/error.rs
// ============================================================================
// Module: QueryGate Gateway Errors
// Description: Error taxonomy returned by gateway operations.
// Purpose: Give protocol adapters one typed failure surface.
// Dependencies: crate::{core, interfaces}, thiserror
// ============================================================================

//! ## Overview
//! Gateway operations fail with [`GatewayError`]. Lookup failures are never
//! retried, engine failures carry the engine message and trace verbatim, and
//! protocol misuse leaves execution state untouched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::identifiers::ExecutionId;
use crate::core::identifiers::SessionId;
use crate::core::rows::FetchOrientation;
use crate::core::state::ExecutionState;
use crate::interfaces::EngineError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Session is not open.
    #[error("invalid session handle: {0}")]
    UnknownSession(SessionId),
    /// Execution is unknown or already closed.
    #[error("invalid operation handle: {0}")]
    UnknownExecution(ExecutionId),
    /// Engine context could not be created or initialized.
    #[error("failed to initialize session: {0}")]
    EngineInit(EngineError),
    /// Engine reported an error while running a statement.
    #[error("{0}")]
    Engine(EngineError),
    /// Background pool rejected the task after the bounded wait.
    #[error(
        "background pool cannot accept new task for execution {0}, please retry the operation"
    )]
    PoolSaturated(ExecutionId),
    /// Fetch orientation other than `first` or `next`.
    #[error("unsupported fetch orientation: {0}")]
    UnsupportedOrientation(FetchOrientation),
    /// Execution is not in the state the operation requires.
    #[error("execution {execution_id} is {state}, expected {expected}")]
    WrongState {
        /// Execution identifier.
        execution_id: ExecutionId,
        /// Observed state.
        state: ExecutionState,
        /// Required state.
        expected: ExecutionState,
    },
    /// Internal invariant failure (poisoned lock, lost task).
    #[error("internal gateway error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the engine error carried by this error, if any.
    #[must_use]
    pub const fn engine_error(&self) -> Option<&EngineError> {
        match self {
            Self::EngineInit(error) | Self::Engine(error) => Some(error),
            _ => None,
        }
    }
}
