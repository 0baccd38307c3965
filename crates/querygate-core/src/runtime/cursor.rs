// crates/querygate-core/src/runtime/cursor.rs
// ============================================================================
// Module: QueryGate Result Cursor
// Description: Buffered and streaming cursors over a compiled result.
// Purpose: Serve forward pagination with reset-to-start.
// Dependencies: crate::{core, interfaces}, serde
// ============================================================================

//! ## Overview
//! A [`ResultCursor`] is fixed to one [`CursorMode`] for its lifetime.
//! Buffered cursors pull and project the full result once; rewinding resets a
//! position. Streaming cursors keep a lazy engine stream plus a one-row
//! lookahead for `has_more`; rewinding re-issues the computation. A row
//! failure is reported after the rows read before it, and ends the pass until
//! the cursor is rewound.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::core::rows::Row;
use crate::core::rows::RowSet;
use crate::core::schema::RowProjector;
use crate::interfaces::CompiledStatement;
use crate::interfaces::EngineError;
use crate::interfaces::RowStream;

// ============================================================================
// SECTION: Mode
// ============================================================================

/// Result materialization strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorMode {
    /// Full result collected up front.
    #[default]
    Buffered,
    /// Rows pulled lazily from the engine.
    Streaming,
}

// ============================================================================
// SECTION: Cursor
// ============================================================================

/// Materialization state.
enum CursorState {
    /// Projected rows and the next read position.
    Buffered {
        /// Projected rows.
        rows: Vec<Row>,
        /// Index of the next row to return.
        position: usize,
    },
    /// Live engine stream.
    Streaming {
        /// Engine row stream.
        stream: RowStream,
        /// Projected row read ahead to answer `has_more`.
        lookahead: Option<Row>,
        /// Set once the stream ended or a row failed.
        exhausted: bool,
        /// Row failure held back so the rows read before it are delivered first.
        pending_error: Option<EngineError>,
    },
}

/// Forward cursor over one execution's result.
pub struct ResultCursor {
    /// Compiled statement, kept to re-issue streaming passes.
    source: Arc<dyn CompiledStatement>,
    /// Per-column readers applied to every row.
    projector: RowProjector,
    /// Materialization state.
    state: CursorState,
}

impl fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCursor").field("mode", &self.mode()).finish_non_exhaustive()
    }
}

impl ResultCursor {
    /// Opens a cursor over `source` in `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the engine fails to produce the result.
    pub fn open(
        source: Arc<dyn CompiledStatement>,
        projector: RowProjector,
        mode: CursorMode,
    ) -> Result<Self, EngineError> {
        let state = match mode {
            CursorMode::Buffered => CursorState::Buffered {
                rows: source.collect()?.into_iter().map(|row| projector.project(row)).collect(),
                position: 0,
            },
            CursorMode::Streaming => CursorState::Streaming {
                stream: source.stream()?,
                lookahead: None,
                exhausted: false,
                pending_error: None,
            },
        };
        Ok(Self {
            source,
            projector,
            state,
        })
    }

    /// Returns the cursor mode.
    #[must_use]
    pub const fn mode(&self) -> CursorMode {
        match self.state {
            CursorState::Buffered { .. } => CursorMode::Buffered,
            CursorState::Streaming { .. } => CursorMode::Streaming,
        }
    }

    /// Returns up to `max_rows` rows from the current position.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when a streamed row fails.
    pub fn next(&mut self, max_rows: usize) -> Result<RowSet, EngineError> {
        match &mut self.state {
            CursorState::Buffered {
                rows,
                position,
            } => {
                let end = position.saturating_add(max_rows).min(rows.len());
                let page = rows.get(*position .. end).map(<[Row]>::to_vec).unwrap_or_default();
                *position = end;
                Ok(RowSet {
                    rows: page,
                    has_more: *position < rows.len(),
                })
            }
            CursorState::Streaming {
                stream,
                lookahead,
                exhausted,
                pending_error,
            } => {
                if let Some(err) = pending_error.take() {
                    *exhausted = true;
                    return Err(err);
                }
                let mut page = Vec::with_capacity(max_rows.min(1024));
                while page.len() < max_rows {
                    match pull(stream, lookahead, exhausted, &self.projector) {
                        Ok(Some(row)) => page.push(row),
                        Ok(None) => break,
                        Err(err) if page.is_empty() => {
                            *exhausted = true;
                            return Err(err);
                        }
                        Err(err) => {
                            *pending_error = Some(err);
                            break;
                        }
                    }
                }
                if lookahead.is_none() && pending_error.is_none() {
                    match pull(stream, lookahead, exhausted, &self.projector) {
                        Ok(row) => *lookahead = row,
                        Err(err) => *pending_error = Some(err),
                    }
                }
                Ok(RowSet {
                    rows: page,
                    has_more: lookahead.is_some() || pending_error.is_some(),
                })
            }
        }
    }

    /// Moves back to the first row.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when a streaming cursor cannot re-issue its
    /// computation.
    pub fn rewind(&mut self) -> Result<(), EngineError> {
        match &mut self.state {
            CursorState::Buffered {
                position, ..
            } => {
                *position = 0;
            }
            CursorState::Streaming {
                stream,
                lookahead,
                exhausted,
                pending_error,
            } => {
                *stream = self.source.stream()?;
                *lookahead = None;
                *exhausted = false;
                *pending_error = None;
            }
        }
        Ok(())
    }
}

/// Returns the next projected row, draining the lookahead first.
fn pull(
    stream: &mut RowStream,
    lookahead: &mut Option<Row>,
    exhausted: &mut bool,
    projector: &RowProjector,
) -> Result<Option<Row>, EngineError> {
    if let Some(row) = lookahead.take() {
        return Ok(Some(row));
    }
    if *exhausted {
        return Ok(None);
    }
    match stream.next() {
        Some(Ok(row)) => Ok(Some(projector.project(row))),
        Some(Err(err)) => Err(err),
        None => {
            *exhausted = true;
            Ok(None)
        }
    }
}
