// crates/querygate-core/tests/common/mod.rs
// =============================================================================
// Module: Core Test Helpers
// Description: Scripted engine, recording audit sink, and polling helpers.
// Purpose: Drive gateway lifecycles deterministically in integration tests.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    reason = "Test helpers fail loudly."
)]

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use querygate_core::CompiledStatement;
use querygate_core::EngineColumn;
use querygate_core::EngineContext;
use querygate_core::EngineError;
use querygate_core::ExecutionScope;
use querygate_core::GatewayConfig;
use querygate_core::JobGroupId;
use querygate_core::JobListener;
use querygate_core::LifecycleAuditEvent;
use querygate_core::LifecycleAuditSink;
use querygate_core::NativePattern;
use querygate_core::QueryEngine;
use querygate_core::QueryGateway;
use querygate_core::Row;
use querygate_core::RowStream;
use querygate_core::SessionCatalog;
use querygate_core::SessionEffect;
use querygate_core::TableEntry;

// ============================================================================
// SECTION: Gate
// ============================================================================

/// One-shot latch that blocks engine calls until released.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
    entered: AtomicBool,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Blocks the calling thread until [`Self::release`].
    pub fn wait(&self) {
        self.entered.store(true, Ordering::SeqCst);
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cond.wait(open).unwrap();
        }
    }

    pub fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.cond.notify_all();
    }

    pub fn entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Scripted Engine
// ============================================================================

/// Behavior of one statement text.
#[derive(Clone, Default)]
pub struct Script {
    pub columns: Vec<EngineColumn>,
    pub rows: Vec<Row>,
    pub compile_error: Option<EngineError>,
    pub gate: Option<Arc<Gate>>,
    pub effect: Option<SessionEffect>,
}

impl Script {
    pub fn rows(columns: Vec<EngineColumn>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            compile_error: Some(EngineError::new(message).with_trace("at ScriptedEngine")),
            ..Self::default()
        }
    }

    pub fn gated(mut self, gate: &Arc<Gate>) -> Self {
        self.gate = Some(Arc::clone(gate));
        self
    }

    pub fn with_effect(mut self, effect: SessionEffect) -> Self {
        self.effect = Some(effect);
        self
    }
}

/// Counters observed by tests.
#[derive(Default)]
pub struct EngineStats {
    pub stream_calls: AtomicUsize,
    pub compiles_started: AtomicUsize,
    pub compiles_completed: AtomicUsize,
    pub contexts_created: AtomicUsize,
    pub contexts_closed: AtomicUsize,
    pub canceled_groups: Mutex<Vec<JobGroupId>>,
    pub scope_pools: Mutex<Vec<Option<String>>>,
    pub conf: Mutex<BTreeMap<String, String>>,
}

/// Engine whose statements follow registered scripts.
pub struct ScriptedEngine {
    scripts: Mutex<HashMap<String, Script>>,
    pub stats: Arc<EngineStats>,
    listeners: Arc<Mutex<Vec<Arc<dyn JobListener>>>>,
    shared: Mutex<Option<Arc<ScriptedContext>>>,
    fail_new_context: AtomicBool,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            stats: Arc::new(EngineStats::default()),
            listeners: Arc::new(Mutex::new(Vec::new())),
            shared: Mutex::new(None),
            fail_new_context: AtomicBool::new(false),
        })
    }

    pub fn script(&self, statement: &str, script: Script) {
        self.scripts.lock().unwrap().insert(statement.to_string(), script);
    }

    pub fn fail_new_contexts(&self) {
        self.fail_new_context.store(true, Ordering::SeqCst);
    }

    pub fn stream_calls(&self) -> usize {
        self.stats.stream_calls.load(Ordering::SeqCst)
    }

    pub fn compiles_completed(&self) -> usize {
        self.stats.compiles_completed.load(Ordering::SeqCst)
    }

    pub fn contexts_closed(&self) -> usize {
        self.stats.contexts_closed.load(Ordering::SeqCst)
    }

    pub fn contexts_created(&self) -> usize {
        self.stats.contexts_created.load(Ordering::SeqCst)
    }

    pub fn canceled_groups(&self) -> Vec<JobGroupId> {
        self.stats.canceled_groups.lock().unwrap().clone()
    }

    pub fn scope_pools(&self) -> Vec<Option<String>> {
        self.stats.scope_pools.lock().unwrap().clone()
    }

    fn make_context(&self) -> Arc<ScriptedContext> {
        self.stats.contexts_created.fetch_add(1, Ordering::SeqCst);
        Arc::new(ScriptedContext {
            scripts: self.scripts.lock().unwrap().clone(),
            stats: Arc::clone(&self.stats),
            listeners: Arc::clone(&self.listeners),
            database: Mutex::new("default".to_string()),
        })
    }
}

impl QueryEngine for ScriptedEngine {
    fn new_context(&self, _user: &str) -> Result<Arc<dyn EngineContext>, EngineError> {
        if self.fail_new_context.load(Ordering::SeqCst) {
            return Err(EngineError::new("engine unavailable"));
        }
        Ok(self.make_context())
    }

    fn shared_context(&self) -> Result<Arc<dyn EngineContext>, EngineError> {
        let mut shared = self.shared.lock().unwrap();
        let context = shared.get_or_insert_with(|| self.make_context());
        Ok(Arc::clone(context) as Arc<dyn EngineContext>)
    }

    fn cancel_job_group(&self, group: &JobGroupId) {
        self.stats.canceled_groups.lock().unwrap().push(group.clone());
    }

    fn attach_job_listener(&self, listener: Arc<dyn JobListener>) {
        self.listeners.lock().unwrap().push(listener);
    }
}

/// Context snapshotting the scripts registered when it was created.
pub struct ScriptedContext {
    scripts: HashMap<String, Script>,
    stats: Arc<EngineStats>,
    listeners: Arc<Mutex<Vec<Arc<dyn JobListener>>>>,
    database: Mutex<String>,
}

impl EngineContext for ScriptedContext {
    fn use_database(&self, database: &str) -> Result<(), EngineError> {
        if database == "missing" {
            return Err(EngineError::new("Database 'missing' not found"));
        }
        *self.database.lock().unwrap() = database.to_string();
        Ok(())
    }

    fn current_database(&self) -> String {
        self.database.lock().unwrap().clone()
    }

    fn set_conf(&self, key: &str, value: &str) -> Result<(), EngineError> {
        self.stats.conf.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn compile(
        &self,
        statement: &str,
        scope: &ExecutionScope,
    ) -> Result<Arc<dyn CompiledStatement>, EngineError> {
        self.stats.compiles_started.fetch_add(1, Ordering::SeqCst);
        self.stats.scope_pools.lock().unwrap().push(scope.pool.clone());
        let script = self
            .scripts
            .get(statement)
            .cloned()
            .unwrap_or_else(|| Script::failing(&format!("unknown statement: {statement}")));
        if let Some(gate) = &script.gate {
            gate.wait();
        }
        self.stats.compiles_completed.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = script.compile_error.clone() {
            return Err(error);
        }
        Ok(Arc::new(ScriptedStatement {
            script,
            stats: Arc::clone(&self.stats),
            listeners: Arc::clone(&self.listeners),
            group: scope.group_id.clone(),
        }))
    }

    fn catalog(&self) -> Arc<dyn SessionCatalog> {
        Arc::new(EmptyCatalog)
    }

    fn close(&self) {
        self.stats.contexts_closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedStatement {
    script: Script,
    stats: Arc<EngineStats>,
    listeners: Arc<Mutex<Vec<Arc<dyn JobListener>>>>,
    group: JobGroupId,
}

impl CompiledStatement for ScriptedStatement {
    fn plan(&self) -> String {
        "ScriptedPlan".to_string()
    }

    fn schema(&self) -> Vec<EngineColumn> {
        self.script.columns.clone()
    }

    fn effect(&self) -> Option<SessionEffect> {
        self.script.effect.clone()
    }

    fn stream(&self) -> Result<RowStream, EngineError> {
        let call = self.stats.stream_calls.fetch_add(1, Ordering::SeqCst);
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.on_job_start(&format!("job-{call}"), &self.group);
        }
        Ok(Box::new(self.script.rows.clone().into_iter().map(Ok)))
    }
}

struct EmptyCatalog;

impl SessionCatalog for EmptyCatalog {
    fn list_databases(&self, _pattern: &NativePattern) -> Result<Vec<String>, EngineError> {
        Ok(vec!["default".to_string()])
    }

    fn list_tables(
        &self,
        _database: &str,
        _pattern: &NativePattern,
    ) -> Result<Vec<TableEntry>, EngineError> {
        Ok(Vec::new())
    }

    fn list_local_temp_views(
        &self,
        _pattern: &NativePattern,
    ) -> Result<Vec<TableEntry>, EngineError> {
        Ok(Vec::new())
    }

    fn list_global_temp_views(
        &self,
        _pattern: &NativePattern,
    ) -> Result<Vec<TableEntry>, EngineError> {
        Ok(Vec::new())
    }

    fn global_temp_database(&self) -> String {
        "global_temp".to_string()
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<LifecycleAuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<LifecycleAuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl LifecycleAuditSink for RecordingAuditSink {
    fn record(&self, event: &LifecycleAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Gateway Helpers
// ============================================================================

/// Builds a gateway over `engine` with a recording audit sink.
pub fn gateway(
    engine: &Arc<ScriptedEngine>,
    config: GatewayConfig,
) -> (QueryGateway, Arc<RecordingAuditSink>) {
    let audit = RecordingAuditSink::new();
    let gateway = QueryGateway::new(
        Arc::clone(engine) as Arc<dyn QueryEngine>,
        config,
        Arc::clone(&audit) as Arc<dyn LifecycleAuditSink>,
    );
    (gateway, audit)
}

/// Polls `condition` until it holds, failing after five seconds.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
