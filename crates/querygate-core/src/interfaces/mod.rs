// crates/querygate-core/src/interfaces/mod.rs
// ============================================================================
// Module: QueryGate Interfaces
// Description: Engine, catalog, and job-listener contracts.
// Purpose: Define the collaborator surfaces the gateway runtime depends on.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The gateway never parses, plans or stores data itself. It drives a
//! [`QueryEngine`] through per-session [`EngineContext`]s, reads catalog
//! metadata through [`SessionCatalog`], and hears about spawned engine jobs via
//! [`JobListener`]. All calls are synchronous; the runtime moves them onto
//! blocking threads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::JobGroupId;
use crate::core::pattern::NativePattern;
use crate::core::records::ErrorDetail;
use crate::core::rows::Row;
use crate::core::schema::EngineColumn;

// ============================================================================
// SECTION: Engine Errors
// ============================================================================

/// Error reported by the engine, carried to clients verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineError {
    /// Engine message.
    pub message: String,
    /// Optional engine stack trace.
    pub trace: Option<String>,
}

impl EngineError {
    /// Creates an error without a trace.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: None,
        }
    }

    /// Attaches a stack trace.
    #[must_use]
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Converts the error into a record detail.
    #[must_use]
    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            message: self.message.clone(),
            trace: self.trace.clone(),
        }
    }
}

// ============================================================================
// SECTION: Execution Scope
// ============================================================================

/// Cooperative cancellation flag shared between the executor and the engine.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-call engine scope for one execution.
///
/// # Invariants
/// - Lives exactly as long as the engine call it was created for; nothing is
///   left behind on the context once the call returns.
#[derive(Debug, Clone)]
pub struct ExecutionScope {
    /// Job group every spawned engine job is tagged with.
    pub group_id: JobGroupId,
    /// Human-readable job description (the statement text).
    pub description: String,
    /// Resource pool bound to the session at run start.
    pub pool: Option<String>,
    /// Cooperative cancellation flag.
    pub cancel: CancellationFlag,
}

/// Session-level side effect produced by a compiled statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    /// Bind the session to the named scheduler pool.
    SetPool(String),
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Lazy row sequence produced by a compiled statement.
pub type RowStream = Box<dyn Iterator<Item = Result<Row, EngineError>> + Send>;

/// Backing query engine.
pub trait QueryEngine: Send + Sync {
    /// Creates an isolated context for a new session.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the context cannot be created.
    fn new_context(&self, user: &str) -> Result<Arc<dyn EngineContext>, EngineError>;

    /// Returns the single context shared by every session in single-session mode.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the shared context is unavailable.
    fn shared_context(&self) -> Result<Arc<dyn EngineContext>, EngineError>;

    /// Requests cancellation of every job tagged with `group`. Must not block.
    fn cancel_job_group(&self, group: &JobGroupId);

    /// Registers a listener for engine job starts.
    fn attach_job_listener(&self, _listener: Arc<dyn JobListener>) {}
}

/// Per-session engine state (current database, configuration, temp views).
pub trait EngineContext: Send + Sync {
    /// Switches the current database.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the database does not exist.
    fn use_database(&self, database: &str) -> Result<(), EngineError>;

    /// Returns the current database.
    fn current_database(&self) -> String;

    /// Sets a session configuration entry.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the entry is rejected.
    fn set_conf(&self, key: &str, value: &str) -> Result<(), EngineError>;

    /// Compiles a statement within `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when parsing, analysis or planning fails.
    fn compile(
        &self,
        statement: &str,
        scope: &ExecutionScope,
    ) -> Result<Arc<dyn CompiledStatement>, EngineError>;

    /// Returns the catalog view for this context.
    fn catalog(&self) -> Arc<dyn SessionCatalog>;

    /// Releases context resources.
    fn close(&self);
}

/// A statement the engine accepted and planned.
pub trait CompiledStatement: Send + Sync {
    /// Returns the execution plan text.
    fn plan(&self) -> String;

    /// Returns the result columns.
    fn schema(&self) -> Vec<EngineColumn>;

    /// Returns the session side effect, if any.
    fn effect(&self) -> Option<SessionEffect> {
        None
    }

    /// Starts a fresh pass over the result. Each call re-issues the work.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when execution cannot start.
    fn stream(&self) -> Result<RowStream, EngineError>;

    /// Materializes the full result.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when any row fails.
    fn collect(&self) -> Result<Vec<Row>, EngineError> {
        self.stream()?.collect()
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Catalog table kind as stored by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineTableType {
    /// Table whose data the catalog owns.
    ManagedTable,
    /// Table over externally owned data.
    ExternalTable,
    /// Logical view.
    VirtualView,
    /// Index table.
    IndexTable,
    /// Materialized view.
    MaterializedView,
}

impl EngineTableType {
    /// All kinds, in catalog order.
    pub const ALL: [Self; 5] = [
        Self::ManagedTable,
        Self::ExternalTable,
        Self::VirtualView,
        Self::IndexTable,
        Self::MaterializedView,
    ];

    /// Returns the catalog name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ManagedTable => "MANAGED_TABLE",
            Self::ExternalTable => "EXTERNAL_TABLE",
            Self::VirtualView => "VIRTUAL_VIEW",
            Self::IndexTable => "INDEX_TABLE",
            Self::MaterializedView => "MATERIALIZED_VIEW",
        }
    }
}

impl fmt::Display for EngineTableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table or view listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    /// Owning database; `None` for session-local temp views.
    pub database: Option<String>,
    /// Table name.
    pub name: String,
    /// Catalog kind.
    pub table_type: EngineTableType,
    /// Optional table comment.
    pub comment: Option<String>,
}

/// Catalog metadata visible to one session.
pub trait SessionCatalog: Send + Sync {
    /// Lists databases matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the catalog is unavailable.
    fn list_databases(&self, pattern: &NativePattern) -> Result<Vec<String>, EngineError>;

    /// Lists tables of `database` whose names match `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the catalog is unavailable.
    fn list_tables(
        &self,
        database: &str,
        pattern: &NativePattern,
    ) -> Result<Vec<TableEntry>, EngineError>;

    /// Lists session-local temporary views matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the catalog is unavailable.
    fn list_local_temp_views(&self, pattern: &NativePattern)
    -> Result<Vec<TableEntry>, EngineError>;

    /// Lists global temporary views matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the catalog is unavailable.
    fn list_global_temp_views(
        &self,
        pattern: &NativePattern,
    ) -> Result<Vec<TableEntry>, EngineError>;

    /// Returns the database name that holds global temporary views.
    fn global_temp_database(&self) -> String;
}

// ============================================================================
// SECTION: Job Listener
// ============================================================================

/// Receives engine job-start notifications.
pub trait JobListener: Send + Sync {
    /// Called when the engine starts job `job_id` tagged with `group`.
    fn on_job_start(&self, job_id: &str, group: &JobGroupId);
}
