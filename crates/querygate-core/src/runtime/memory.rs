// crates/querygate-core/src/runtime/memory.rs
// ============================================================================
// Module: QueryGate In-Memory Engine
// Description: Small in-process engine and catalog for tests and local demos.
// Purpose: Exercise the gateway end to end without an external engine.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`InMemoryEngine`] understands a deliberately tiny statement set:
//! - `SELECT <literal> [AS name], ...`
//! - `SELECT * FROM [db.]table`
//! - `USE db`
//! - `SET key=value` (`querygate.scheduler.pool` rebinds the session pool)
//! - `CREATE [GLOBAL] TEMPORARY VIEW name AS SELECT * FROM [db.]table`
//!
//! Tables are registered programmatically. Every result pass reports one
//! engine job to attached [`JobListener`]s and honors the execution's
//! cancellation flag between rows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::OnceLock;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::core::identifiers::JobGroupId;
use crate::core::pattern::NativePattern;
use crate::core::rows::Row;
use crate::core::rows::Value;
use crate::core::schema::EngineColumn;
use crate::core::schema::EngineType;
use crate::interfaces::CompiledStatement;
use crate::interfaces::EngineContext;
use crate::interfaces::EngineError;
use crate::interfaces::EngineTableType;
use crate::interfaces::ExecutionScope;
use crate::interfaces::JobListener;
use crate::interfaces::QueryEngine;
use crate::interfaces::RowStream;
use crate::interfaces::SessionCatalog;
use crate::interfaces::SessionEffect;
use crate::interfaces::TableEntry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Database created with every engine.
pub const DEFAULT_DATABASE: &str = "default";

/// Database holding global temporary views.
pub const GLOBAL_TEMP_DATABASE: &str = "global_temp";

/// Configuration key whose `SET` rebinds the session's scheduler pool.
pub const SCHEDULER_POOL_KEY: &str = "querygate.scheduler.pool";

// ============================================================================
// SECTION: Tables
// ============================================================================

/// Table data held by the in-memory catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryTable {
    /// Column definitions.
    pub columns: Vec<EngineColumn>,
    /// Rows in storage order.
    pub rows: Vec<Row>,
    /// Catalog kind.
    pub table_type: EngineTableType,
    /// Optional table comment.
    pub comment: Option<String>,
}

impl MemoryTable {
    /// Creates a managed table.
    #[must_use]
    pub const fn new(columns: Vec<EngineColumn>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            table_type: EngineTableType::ManagedTable,
            comment: None,
        }
    }

    /// Sets the catalog kind.
    #[must_use]
    pub const fn with_type(mut self, table_type: EngineTableType) -> Self {
        self.table_type = table_type;
        self
    }

    /// Sets the table comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Catalog contents shared by all contexts.
#[derive(Default)]
struct CatalogData {
    /// Tables by database, then name.
    databases: BTreeMap<String, BTreeMap<String, MemoryTable>>,
    /// Global temporary views by name.
    global_temp_views: BTreeMap<String, MemoryTable>,
}

/// Engine state shared with contexts and compiled statements.
struct EngineShared {
    /// Catalog contents.
    catalog: RwLock<CatalogData>,
    /// Attached job listeners.
    listeners: RwLock<Vec<Arc<dyn JobListener>>>,
    /// Job groups canceled through the engine.
    canceled_groups: Mutex<HashSet<JobGroupId>>,
    /// Job identifier counter.
    next_job: AtomicU64,
    /// Context shared in single-session mode.
    shared_context: OnceLock<Arc<MemoryContext>>,
}

impl EngineShared {
    /// Reads the catalog.
    fn catalog(&self) -> std::sync::RwLockReadGuard<'_, CatalogData> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes the catalog.
    fn catalog_mut(&self) -> std::sync::RwLockWriteGuard<'_, CatalogData> {
        self.catalog.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the canceled group set.
    fn canceled(&self) -> MutexGuard<'_, HashSet<JobGroupId>> {
        self.canceled_groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issues a job id and notifies listeners.
    fn start_job(&self, group: &JobGroupId) -> String {
        let job_id = format!("job-{}", self.next_job.fetch_add(1, Ordering::Relaxed));
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone();
        for listener in listeners {
            listener.on_job_start(&job_id, group);
        }
        job_id
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// In-process engine over an in-memory catalog.
#[derive(Clone)]
pub struct InMemoryEngine {
    /// Shared engine state.
    shared: Arc<EngineShared>,
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEngine {
    /// Creates an engine with an empty `default` database.
    #[must_use]
    pub fn new() -> Self {
        let mut data = CatalogData::default();
        data.databases.insert(DEFAULT_DATABASE.to_string(), BTreeMap::new());
        Self {
            shared: Arc::new(EngineShared {
                catalog: RwLock::new(data),
                listeners: RwLock::new(Vec::new()),
                canceled_groups: Mutex::new(HashSet::new()),
                next_job: AtomicU64::new(0),
                shared_context: OnceLock::new(),
            }),
        }
    }

    /// Creates a database if missing.
    pub fn create_database(&self, name: &str) {
        self.shared.catalog_mut().databases.entry(name.to_lowercase()).or_default();
    }

    /// Registers a table, creating its database if missing.
    pub fn register_table(&self, database: &str, name: &str, table: MemoryTable) {
        self.shared
            .catalog_mut()
            .databases
            .entry(database.to_lowercase())
            .or_default()
            .insert(name.to_lowercase(), table);
    }

    /// Registers a global temporary view.
    pub fn register_global_temp_view(&self, name: &str, table: MemoryTable) {
        self.shared
            .catalog_mut()
            .global_temp_views
            .insert(name.to_lowercase(), table.with_type(EngineTableType::VirtualView));
    }

    /// Returns true once `group` was canceled through the engine.
    #[must_use]
    pub fn is_group_canceled(&self, group: &JobGroupId) -> bool {
        self.shared.canceled().contains(group)
    }

    /// Returns the number of jobs started so far.
    #[must_use]
    pub fn jobs_started(&self) -> u64 {
        self.shared.next_job.load(Ordering::Relaxed)
    }

    /// Creates a concrete context for `user`.
    fn create_context(&self, user: &str) -> Arc<MemoryContext> {
        Arc::new(MemoryContext {
            state: Arc::new(ContextState {
                engine: Arc::clone(&self.shared),
                user: user.to_string(),
                current_database: Mutex::new(DEFAULT_DATABASE.to_string()),
                conf: Mutex::new(BTreeMap::new()),
                temp_views: Mutex::new(BTreeMap::new()),
            }),
        })
    }
}

impl QueryEngine for InMemoryEngine {
    fn new_context(&self, user: &str) -> Result<Arc<dyn EngineContext>, EngineError> {
        Ok(self.create_context(user))
    }

    fn shared_context(&self) -> Result<Arc<dyn EngineContext>, EngineError> {
        let context = self.shared.shared_context.get_or_init(|| self.create_context("shared"));
        Ok(Arc::clone(context) as Arc<dyn EngineContext>)
    }

    fn cancel_job_group(&self, group: &JobGroupId) {
        self.shared.canceled().insert(group.clone());
    }

    fn attach_job_listener(&self, listener: Arc<dyn JobListener>) {
        self.shared.listeners.write().unwrap_or_else(PoisonError::into_inner).push(listener);
    }
}

// ============================================================================
// SECTION: Context
// ============================================================================

/// Per-context state shared with the context's catalog view.
struct ContextState {
    /// Owning engine.
    engine: Arc<EngineShared>,
    /// Context owner.
    user: String,
    /// Current database.
    current_database: Mutex<String>,
    /// Session configuration.
    conf: Mutex<BTreeMap<String, String>>,
    /// Session-local temporary views.
    temp_views: Mutex<BTreeMap<String, MemoryTable>>,
}

impl ContextState {
    /// Returns the current database.
    fn database(&self) -> String {
        self.current_database.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the local temp views.
    fn temp_views(&self) -> MutexGuard<'_, BTreeMap<String, MemoryTable>> {
        self.temp_views.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves `[db.]name` to table data.
    fn resolve(&self, reference: &str) -> Result<MemoryTable, EngineError> {
        let reference = reference.to_lowercase();
        let (database, name) = match reference.split_once('.') {
            Some((database, name)) => (Some(database.to_string()), name.to_string()),
            None => (None, reference.clone()),
        };
        if database.is_none()
            && let Some(view) = self.temp_views().get(&name)
        {
            return Ok(view.clone());
        }
        let catalog = self.engine.catalog();
        let table = match database.as_deref() {
            Some(GLOBAL_TEMP_DATABASE) => catalog.global_temp_views.get(&name),
            Some(database) => catalog.databases.get(database).and_then(|tables| tables.get(&name)),
            None => {
                catalog.databases.get(&self.database()).and_then(|tables| tables.get(&name))
            }
        };
        table
            .cloned()
            .ok_or_else(|| EngineError::new(format!("Table or view not found: {reference}")))
    }
}

/// In-memory engine context.
pub struct MemoryContext {
    /// Shared context state.
    state: Arc<ContextState>,
}

impl MemoryContext {
    /// Returns a session configuration value.
    #[must_use]
    pub fn conf(&self, key: &str) -> Option<String> {
        self.state.conf.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    /// Returns the context owner.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.state.user
    }
}

impl EngineContext for MemoryContext {
    fn use_database(&self, database: &str) -> Result<(), EngineError> {
        let database = database.to_lowercase();
        if !self.state.engine.catalog().databases.contains_key(&database) {
            return Err(EngineError::new(format!("Database '{database}' not found")));
        }
        *self.state.current_database.lock().unwrap_or_else(PoisonError::into_inner) = database;
        Ok(())
    }

    fn current_database(&self) -> String {
        self.state.database()
    }

    fn set_conf(&self, key: &str, value: &str) -> Result<(), EngineError> {
        if key.trim().is_empty() {
            return Err(EngineError::new("configuration key must not be empty"));
        }
        self.state
            .conf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.trim().to_string(), value.trim().to_string());
        Ok(())
    }

    fn compile(
        &self,
        statement: &str,
        scope: &ExecutionScope,
    ) -> Result<Arc<dyn CompiledStatement>, EngineError> {
        if scope.cancel.is_canceled() {
            return Err(EngineError::new(format!("Job group {} canceled", scope.group_id)));
        }
        let parsed = parse(statement)?;
        let (plan, columns, rows, effect) = match parsed {
            Parsed::Literals(literals) => {
                let columns = literals.iter().map(|(name, ty, _)| EngineColumn::new(name, ty.clone()));
                let row = literals.iter().map(|(_, _, value)| value.clone()).collect();
                ("Project [literals]\n+- OneRowRelation".to_string(), columns.collect(), vec![row], None)
            }
            Parsed::Scan(reference) => {
                let table = self.state.resolve(&reference)?;
                (format!("Scan {reference}"), table.columns, table.rows, None)
            }
            Parsed::Use(database) => {
                self.use_database(&database)?;
                (format!("SetCatalogAndNamespace {database}"), Vec::new(), Vec::new(), None)
            }
            Parsed::Set(key, value) => {
                self.set_conf(&key, &value)?;
                let effect = (key == SCHEDULER_POOL_KEY).then(|| SessionEffect::SetPool(value.clone()));
                let columns = vec![
                    EngineColumn::new("key", EngineType::String),
                    EngineColumn::new("value", EngineType::String),
                ];
                let rows = vec![vec![Value::String(key.clone()), Value::String(value)]];
                (format!("SetCommand {key}"), columns, rows, effect)
            }
            Parsed::CreateView {
                global,
                name,
                source,
            } => {
                let table = self.state.resolve(&source)?.with_type(EngineTableType::VirtualView);
                if global {
                    self.state
                        .engine
                        .catalog_mut()
                        .global_temp_views
                        .insert(name.clone(), table);
                } else {
                    self.state.temp_views().insert(name.clone(), table);
                }
                (format!("CreateViewCommand {name}"), Vec::new(), Vec::new(), None)
            }
        };
        Ok(Arc::new(MemoryStatement {
            engine: Arc::clone(&self.state.engine),
            scope: scope.clone(),
            plan,
            columns,
            rows,
            effect,
        }))
    }

    fn catalog(&self) -> Arc<dyn SessionCatalog> {
        Arc::new(MemoryCatalog {
            state: Arc::clone(&self.state),
        })
    }

    fn close(&self) {
        self.state.temp_views().clear();
    }
}

// ============================================================================
// SECTION: Compiled Statements
// ============================================================================

/// Compiled in-memory statement.
struct MemoryStatement {
    /// Engine for job notifications and group cancellation.
    engine: Arc<EngineShared>,
    /// Scope the statement was compiled in.
    scope: ExecutionScope,
    /// Plan text.
    plan: String,
    /// Result columns.
    columns: Vec<EngineColumn>,
    /// Result rows.
    rows: Vec<Row>,
    /// Session effect.
    effect: Option<SessionEffect>,
}

impl CompiledStatement for MemoryStatement {
    fn plan(&self) -> String {
        self.plan.clone()
    }

    fn schema(&self) -> Vec<EngineColumn> {
        self.columns.clone()
    }

    fn effect(&self) -> Option<SessionEffect> {
        self.effect.clone()
    }

    fn stream(&self) -> Result<RowStream, EngineError> {
        self.engine.start_job(&self.scope.group_id);
        let engine = Arc::clone(&self.engine);
        let scope = self.scope.clone();
        Ok(Box::new(self.rows.clone().into_iter().map(move |row| {
            if scope.cancel.is_canceled() || engine.canceled().contains(&scope.group_id) {
                Err(EngineError::new(format!("Job group {} canceled", scope.group_id)))
            } else {
                Ok(row)
            }
        })))
    }
}

// ============================================================================
// SECTION: Catalog View
// ============================================================================

/// Catalog view of one context.
struct MemoryCatalog {
    /// Context state.
    state: Arc<ContextState>,
}

/// Lists matching views as table entries.
fn view_entries(
    views: &BTreeMap<String, MemoryTable>,
    database: Option<&str>,
    pattern: &NativePattern,
) -> Vec<TableEntry> {
    views
        .iter()
        .filter(|(name, _)| pattern.matches(name))
        .map(|(name, view)| TableEntry {
            database: database.map(str::to_string),
            name: name.clone(),
            table_type: EngineTableType::VirtualView,
            comment: view.comment.clone(),
        })
        .collect()
}

impl SessionCatalog for MemoryCatalog {
    fn list_databases(&self, pattern: &NativePattern) -> Result<Vec<String>, EngineError> {
        Ok(self
            .state
            .engine
            .catalog()
            .databases
            .keys()
            .filter(|name| pattern.matches(name))
            .cloned()
            .collect())
    }

    fn list_tables(
        &self,
        database: &str,
        pattern: &NativePattern,
    ) -> Result<Vec<TableEntry>, EngineError> {
        let catalog = self.state.engine.catalog();
        let Some(tables) = catalog.databases.get(database) else {
            return Err(EngineError::new(format!("Database '{database}' not found")));
        };
        Ok(tables
            .iter()
            .filter(|(name, _)| pattern.matches(name))
            .map(|(name, table)| TableEntry {
                database: Some(database.to_string()),
                name: name.clone(),
                table_type: table.table_type,
                comment: table.comment.clone(),
            })
            .collect())
    }

    fn list_local_temp_views(
        &self,
        pattern: &NativePattern,
    ) -> Result<Vec<TableEntry>, EngineError> {
        Ok(view_entries(&self.state.temp_views(), None, pattern))
    }

    fn list_global_temp_views(
        &self,
        pattern: &NativePattern,
    ) -> Result<Vec<TableEntry>, EngineError> {
        let catalog = self.state.engine.catalog();
        Ok(view_entries(&catalog.global_temp_views, Some(GLOBAL_TEMP_DATABASE), pattern))
    }

    fn global_temp_database(&self) -> String {
        GLOBAL_TEMP_DATABASE.to_string()
    }
}

// ============================================================================
// SECTION: Statement Parsing
// ============================================================================

/// Literal projection: column name, type, value.
type Literal = (String, EngineType, Value);

/// Recognized statement.
enum Parsed {
    /// `SELECT <literals>`.
    Literals(Vec<Literal>),
    /// `SELECT * FROM <reference>`.
    Scan(String),
    /// `USE <database>`.
    Use(String),
    /// `SET <key>=<value>`.
    Set(String, String),
    /// `CREATE [GLOBAL] TEMPORARY VIEW <name> AS SELECT * FROM <source>`.
    CreateView {
        /// Register as a global temporary view.
        global: bool,
        /// View name.
        name: String,
        /// Source table reference.
        source: String,
    },
}

/// Parses one statement.
fn parse(statement: &str) -> Result<Parsed, EngineError> {
    let text = statement.trim().trim_end_matches(';').trim();
    let words: Vec<&str> = text.split_whitespace().collect();
    let upper: Vec<String> = words.iter().map(|word| word.to_ascii_uppercase()).collect();
    let upper: Vec<&str> = upper.iter().map(String::as_str).collect();
    match upper.as_slice() {
        ["SELECT", "*", "FROM", _] => Ok(Parsed::Scan(words[3].to_string())),
        ["SELECT", ..] if words.len() > 1 => {
            let list = text.get(words[0].len() ..).unwrap_or_default();
            parse_literals(list).map(Parsed::Literals)
        }
        ["USE", _] => Ok(Parsed::Use(words[1].to_string())),
        ["SET", ..] => {
            let assignment = text.get(words[0].len() ..).unwrap_or_default();
            let (key, value) = assignment
                .split_once('=')
                .ok_or_else(|| EngineError::new(format!("invalid SET statement: {text}")))?;
            Ok(Parsed::Set(key.trim().to_string(), value.trim().to_string()))
        }
        ["CREATE", "TEMPORARY", "VIEW", _, "AS", "SELECT", "*", "FROM", _] => {
            Ok(Parsed::CreateView {
                global: false,
                name: words[3].to_lowercase(),
                source: words[8].to_string(),
            })
        }
        ["CREATE", "GLOBAL", "TEMPORARY", "VIEW", _, "AS", "SELECT", "*", "FROM", _] => {
            Ok(Parsed::CreateView {
                global: true,
                name: words[4].to_lowercase(),
                source: words[9].to_string(),
            })
        }
        _ => Err(EngineError::new(format!("ParseException: unsupported statement: {text}"))
            .with_trace("at InMemoryEngine.parse")),
    }
}

/// Parses a comma-separated literal list.
fn parse_literals(list: &str) -> Result<Vec<Literal>, EngineError> {
    split_top_level(list).into_iter().map(|item| parse_literal(item.trim())).collect()
}

/// Splits on commas outside single quotes.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (index, ch) in list.char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            ',' if !quoted => {
                items.push(&list[start .. index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    items.push(&list[start ..]);
    items
}

/// Parses `<literal> [AS alias]`.
fn parse_literal(item: &str) -> Result<Literal, EngineError> {
    let (expr, alias) = match item.rsplit_once(' ') {
        Some((head, alias)) if head.trim_end().to_ascii_uppercase().ends_with(" AS") => {
            let head = head.trim_end();
            (head[.. head.len() - 3].trim(), Some(alias.trim().to_string()))
        }
        _ => (item, None),
    };
    let (data_type, value) = if let Some(text) =
        expr.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\''))
    {
        (EngineType::String, Value::String(text.to_string()))
    } else if expr.eq_ignore_ascii_case("null") {
        (EngineType::Null, Value::Null)
    } else if expr.eq_ignore_ascii_case("true") || expr.eq_ignore_ascii_case("false") {
        (EngineType::Boolean, Value::Boolean(expr.eq_ignore_ascii_case("true")))
    } else if let Ok(number) = expr.parse::<i64>() {
        if i32::try_from(number).is_ok() {
            (EngineType::Int, Value::Int(number))
        } else {
            (EngineType::BigInt, Value::Int(number))
        }
    } else if let Ok(number) = expr.parse::<f64>() {
        (EngineType::Double, Value::Double(number))
    } else {
        return Err(EngineError::new(format!("cannot resolve '{expr}'")));
    };
    let name = alias.unwrap_or_else(|| expr.to_string());
    Ok((name, data_type, value))
}
