// crates/querygate-core/tests/cursor.rs
// ============================================================================
// Module: Result Cursor Tests
// Description: Buffered and streaming cursor paging and rewind behavior.
// Purpose: Ensure fetch-first semantics differ only in how rows are produced.
// Dependencies: querygate-core
// ============================================================================

//! ## Overview
//! A counting statement records how often the engine is asked for rows, so the
//! tests can tell a buffered rewind (no engine work) from a streaming rewind
//! (computation re-issued).

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
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use querygate_core::CompiledStatement;
use querygate_core::CursorMode;
use querygate_core::EngineColumn;
use querygate_core::EngineError;
use querygate_core::EngineType;
use querygate_core::ResultCursor;
use querygate_core::Row;
use querygate_core::RowStream;
use querygate_core::SchemaTranslator;
use querygate_core::Value;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Statement yielding `0 .. rows` and counting stream calls.
struct CountingStatement {
    rows: i64,
    fail_at: Option<i64>,
    streams: AtomicUsize,
}

impl CountingStatement {
    fn new(rows: i64) -> Arc<Self> {
        Arc::new(Self {
            rows,
            fail_at: None,
            streams: AtomicUsize::new(0),
        })
    }

    fn failing_at(rows: i64, fail_at: i64) -> Arc<Self> {
        Arc::new(Self {
            rows,
            fail_at: Some(fail_at),
            streams: AtomicUsize::new(0),
        })
    }

    fn streams(&self) -> usize {
        self.streams.load(Ordering::SeqCst)
    }
}

impl CompiledStatement for CountingStatement {
    fn plan(&self) -> String {
        "Range".to_string()
    }

    fn schema(&self) -> Vec<EngineColumn> {
        vec![
            EngineColumn::new("n", EngineType::BigInt),
            EngineColumn::new(
                "pair",
                EngineType::Array {
                    element: Box::new(EngineType::BigInt),
                },
            ),
        ]
    }

    fn stream(&self) -> Result<RowStream, EngineError> {
        self.streams.fetch_add(1, Ordering::SeqCst);
        let fail_at = self.fail_at;
        Ok(Box::new((0 .. self.rows).map(move |n| {
            if Some(n) == fail_at {
                return Err(EngineError::new(format!("row {n} unreadable")));
            }
            Ok(vec![Value::Int(n), Value::Array(vec![Value::Int(n), Value::Int(n + 1)])])
        })))
    }
}

fn open(statement: &Arc<CountingStatement>, mode: CursorMode) -> ResultCursor {
    let translated = SchemaTranslator::translate(&statement.schema());
    ResultCursor::open(
        Arc::clone(statement) as Arc<dyn CompiledStatement>,
        translated.projector,
        mode,
    )
    .unwrap()
}

fn first_column(rows: &[Row]) -> Vec<i64> {
    rows.iter()
        .map(|row| match row.first() {
            Some(Value::Int(n)) => *n,
            other => panic!("unexpected value {other:?}"),
        })
        .collect()
}

// ============================================================================
// SECTION: Buffered
// ============================================================================

#[test]
fn buffered_cursor_pages_and_rewinds_without_engine_work() {
    let statement = CountingStatement::new(5);
    let mut cursor = open(&statement, CursorMode::Buffered);
    assert_eq!(cursor.mode(), CursorMode::Buffered);
    assert_eq!(statement.streams(), 1);

    let page = cursor.next(2).unwrap();
    assert_eq!(first_column(&page.rows), vec![0, 1]);
    assert!(page.has_more);

    let page = cursor.next(10).unwrap();
    assert_eq!(first_column(&page.rows), vec![2, 3, 4]);
    assert!(!page.has_more);

    cursor.rewind().unwrap();
    let page = cursor.next(2).unwrap();
    assert_eq!(first_column(&page.rows), vec![0, 1]);
    assert_eq!(statement.streams(), 1);
}

#[test]
fn buffered_cursor_projects_composites() {
    let statement = CountingStatement::new(1);
    let mut cursor = open(&statement, CursorMode::Buffered);
    let page = cursor.next(1).unwrap();
    assert_eq!(page.rows[0][1], Value::String("[0,1]".to_string()));
}

#[test]
fn buffered_cursor_surfaces_engine_errors_at_open() {
    let statement = CountingStatement::failing_at(3, 1);
    let translated = SchemaTranslator::translate(&statement.schema());
    let result = ResultCursor::open(
        Arc::clone(&statement) as Arc<dyn CompiledStatement>,
        translated.projector,
        CursorMode::Buffered,
    );
    assert_eq!(result.err().map(|err| err.message), Some("row 1 unreadable".to_string()));
}

#[test]
fn exhausted_cursor_returns_empty_pages() {
    let statement = CountingStatement::new(0);
    let mut cursor = open(&statement, CursorMode::Buffered);
    let page = cursor.next(10).unwrap();
    assert!(page.rows.is_empty());
    assert!(!page.has_more);
}

// ============================================================================
// SECTION: Streaming
// ============================================================================

#[test]
fn streaming_cursor_reports_has_more_with_lookahead() {
    let statement = CountingStatement::new(4);
    let mut cursor = open(&statement, CursorMode::Streaming);
    assert_eq!(cursor.mode(), CursorMode::Streaming);

    let page = cursor.next(2).unwrap();
    assert_eq!(first_column(&page.rows), vec![0, 1]);
    assert!(page.has_more);

    let page = cursor.next(2).unwrap();
    assert_eq!(first_column(&page.rows), vec![2, 3]);
    assert!(!page.has_more);

    let page = cursor.next(2).unwrap();
    assert!(page.rows.is_empty());
}

#[test]
fn streaming_rewind_reissues_the_computation() {
    let statement = CountingStatement::new(3);
    let mut cursor = open(&statement, CursorMode::Streaming);
    assert_eq!(first_column(&cursor.next(2).unwrap().rows), vec![0, 1]);
    assert_eq!(statement.streams(), 1);

    cursor.rewind().unwrap();
    assert_eq!(statement.streams(), 2);
    assert_eq!(first_column(&cursor.next(3).unwrap().rows), vec![0, 1, 2]);
}

#[test]
fn streaming_cursor_surfaces_row_errors_on_fetch() {
    let statement = CountingStatement::failing_at(5, 0);
    let mut cursor = open(&statement, CursorMode::Streaming);
    let err = cursor.next(5).unwrap_err();
    assert_eq!(err.message, "row 0 unreadable");

    let page = cursor.next(5).unwrap();
    assert!(page.rows.is_empty());
    assert!(!page.has_more);
}

#[test]
fn streaming_cursor_delivers_rows_read_before_a_failure() {
    let statement = CountingStatement::failing_at(5, 2);
    let mut cursor = open(&statement, CursorMode::Streaming);

    let page = cursor.next(5).unwrap();
    assert_eq!(first_column(&page.rows), vec![0, 1]);
    assert!(page.has_more);

    let err = cursor.next(5).unwrap_err();
    assert_eq!(err.message, "row 2 unreadable");
    let page = cursor.next(5).unwrap();
    assert!(page.rows.is_empty());
    assert!(!page.has_more);
}

#[test]
fn streaming_cursor_holds_a_lookahead_failure_for_the_next_fetch() {
    let statement = CountingStatement::failing_at(5, 2);
    let mut cursor = open(&statement, CursorMode::Streaming);

    let page = cursor.next(2).unwrap();
    assert_eq!(first_column(&page.rows), vec![0, 1]);
    assert!(page.has_more);

    assert_eq!(cursor.next(2).unwrap_err().message, "row 2 unreadable");
    assert!(cursor.next(2).unwrap().rows.is_empty());

    cursor.rewind().unwrap();
    assert_eq!(first_column(&cursor.next(2).unwrap().rows), vec![0, 1]);
}
