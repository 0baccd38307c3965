// crates/querygate-core/src/runtime/executor.rs
// ============================================================================
// Module: QueryGate Statement Executor
// Description: Statement submission, execution, cancellation, and fetching.
// Purpose: Own every execution's lifecycle from submit to close.
// Dependencies: crate::{core, interfaces, runtime}, tokio, tracing
// ============================================================================

//! ## Overview
//! The executor creates one execution per submitted statement and drives it
//! through the lifecycle state machine in [`crate::core::state`]. Statements
//! run either in the caller's task (foreground) or on the shared
//! [`BackgroundPool`]. Engine calls are synchronous and always run on blocking
//! threads.
//!
//! Every state change goes through [`transition`] while holding that
//! execution's lock, and the matching telemetry event is emitted under the same
//! lock, so telemetry observes each execution's events in lifecycle order.
//!
//! Security posture: statement text is passed to the engine verbatim; the
//! executor performs no parsing or rewriting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::RwLock;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::identifiers::ExecutionId;
use crate::core::identifiers::IdGenerator;
use crate::core::identifiers::JobGroupId;
use crate::core::identifiers::SessionId;
use crate::core::records::ErrorDetail;
use crate::core::rows::FetchOrientation;
use crate::core::rows::RowSet;
use crate::core::schema::SchemaTranslator;
use crate::core::schema::TableSchema;
use crate::core::state::ExecutionEvent;
use crate::core::state::ExecutionState;
use crate::core::state::Transition;
use crate::core::state::transition;
use crate::interfaces::CancellationFlag;
use crate::interfaces::CompiledStatement;
use crate::interfaces::EngineError;
use crate::interfaces::ExecutionScope;
use crate::interfaces::QueryEngine;
use crate::interfaces::SessionEffect;
use crate::runtime::cursor::CursorMode;
use crate::runtime::cursor::ResultCursor;
use crate::runtime::error::GatewayError;
use crate::runtime::metadata::MetadataRequest;
use crate::runtime::metadata::TableTypeMapping;
use crate::runtime::pool::BackgroundPool;
use crate::runtime::pool::BackgroundTask;
use crate::runtime::pool::PoolError;
use crate::runtime::session::SessionRegistry;
use crate::runtime::telemetry::TelemetryTracker;

// ============================================================================
// SECTION: Public Types
// ============================================================================

/// Executor behavior fixed at gateway start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Cursor materialization for new executions.
    pub cursor_mode: CursorMode,
    /// Table type naming for metadata listings.
    pub table_type_mapping: TableTypeMapping,
}

/// Client-visible execution status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationStatus {
    /// Current lifecycle state.
    pub state: ExecutionState,
    /// Failure detail when failed.
    pub error: Option<ErrorDetail>,
    /// Whether the execution produces result columns.
    pub has_result_set: bool,
}

// ============================================================================
// SECTION: Executions
// ============================================================================

/// Work performed by an execution.
enum Work {
    /// SQL statement compiled by the engine.
    Statement(String),
    /// Catalog listing.
    Listing(MetadataRequest),
}

/// Mutable execution state guarded by the execution lock.
struct ExecutionInner {
    /// Lifecycle state.
    state: ExecutionState,
    /// Failure detail when failed.
    error: Option<ErrorDetail>,
    /// Result schema once compiled.
    schema: Option<TableSchema>,
    /// Result cursor once finished; taken out while a fetch runs.
    cursor: Option<ResultCursor>,
    /// Background task handle while admitted to the pool.
    task: Option<BackgroundTask>,
}

/// One submitted statement.
struct Execution {
    /// Execution identifier.
    id: ExecutionId,
    /// Owning session.
    session_id: SessionId,
    /// Engine job group.
    group_id: JobGroupId,
    /// Submitted text.
    statement: String,
    /// Cursor mode chosen at submission.
    cursor_mode: CursorMode,
    /// Cooperative cancellation flag handed to the engine.
    cancel: CancellationFlag,
    /// Guarded lifecycle state.
    inner: Mutex<ExecutionInner>,
}

impl Execution {
    /// Locks the execution state.
    fn lock(&self) -> Result<MutexGuard<'_, ExecutionInner>, GatewayError> {
        self.inner
            .lock()
            .map_err(|_| GatewayError::Internal(format!("execution {} lock poisoned", self.id)))
    }
}

/// Result of running an execution body.
enum RunOutcome {
    /// Result cursor is available.
    Finished,
    /// Engine failed; the execution is `Failed`.
    Failed(EngineError),
    /// Execution was canceled or closed before completing.
    Interrupted,
}

// ============================================================================
// SECTION: Execution Runtime
// ============================================================================

/// State shared by the executor and its running bodies.
struct ExecutionRuntime {
    /// Backing engine, for job-group cancellation.
    engine: Arc<dyn QueryEngine>,
    /// Session registry.
    sessions: Arc<SessionRegistry>,
    /// Telemetry tracker.
    telemetry: Arc<TelemetryTracker>,
    /// Executor behavior.
    config: ExecutorConfig,
}

impl ExecutionRuntime {
    /// Runs an execution body exactly once.
    fn run(&self, execution: &Execution, work: &Work) -> Result<RunOutcome, GatewayError> {
        if execution.lock()?.state != ExecutionState::Started {
            debug!(execution_id = %execution.id, "execution interrupted before start");
            return Ok(RunOutcome::Interrupted);
        }
        let pool = self.sessions.active_pool(&execution.session_id).ok().flatten();
        let context = match self.sessions.context(&execution.session_id) {
            Ok(context) => context,
            Err(err) => return self.fail(execution, EngineError::new(err.to_string())),
        };
        let scope = ExecutionScope {
            group_id: execution.group_id.clone(),
            description: execution.statement.clone(),
            pool,
            cancel: execution.cancel.clone(),
        };

        let compiled: Result<Arc<dyn CompiledStatement>, EngineError> = match work {
            Work::Statement(text) => context.compile(text, &scope),
            Work::Listing(request) => request
                .run(context.as_ref(), self.config.table_type_mapping)
                .map(|result| Arc::new(result) as Arc<dyn CompiledStatement>),
        };
        let compiled = match compiled {
            Ok(compiled) => compiled,
            Err(err) => return self.fail(execution, err),
        };

        let plan = compiled.plan();
        let translated = SchemaTranslator::translate(&compiled.schema());
        {
            let mut inner = execution.lock()?;
            match transition(inner.state, ExecutionEvent::Compile) {
                Ok(Transition::Applied(next)) => {
                    inner.state = next;
                    inner.schema = Some(translated.schema);
                    self.telemetry.on_statement_parsed(&execution.id, &plan);
                }
                Ok(Transition::Suppressed) | Err(_) => return Ok(RunOutcome::Interrupted),
            }
        }

        if let Some(SessionEffect::SetPool(name)) = compiled.effect() {
            debug!(session_id = %execution.session_id, pool = %name, "session pool rebound");
            if let Err(err) = self.sessions.set_active_pool(&execution.session_id, name) {
                debug!(error = %err, "pool rebind skipped");
            }
        }

        let cursor = match ResultCursor::open(compiled, translated.projector, execution.cursor_mode)
        {
            Ok(cursor) => cursor,
            Err(err) => return self.fail(execution, err),
        };

        let mut inner = execution.lock()?;
        match transition(inner.state, ExecutionEvent::Finish) {
            Ok(Transition::Applied(next)) => {
                inner.state = next;
                inner.cursor = Some(cursor);
                self.telemetry.on_statement_finish(&execution.id);
                debug!(execution_id = %execution.id, "execution finished");
                Ok(RunOutcome::Finished)
            }
            Ok(Transition::Suppressed) | Err(_) => Ok(RunOutcome::Interrupted),
        }
    }

    /// Moves the execution to `Failed` unless it was canceled or closed.
    fn fail(&self, execution: &Execution, err: EngineError) -> Result<RunOutcome, GatewayError> {
        let mut inner = execution.lock()?;
        match transition(inner.state, ExecutionEvent::Fail) {
            Ok(Transition::Applied(next)) => {
                let detail = err.detail();
                inner.state = next;
                inner.error = Some(detail.clone());
                self.telemetry.on_statement_error(&execution.id, &detail);
                warn!(execution_id = %execution.id, error = %err, "execution failed");
                Ok(RunOutcome::Failed(err))
            }
            Ok(Transition::Suppressed) | Err(_) => {
                debug!(execution_id = %execution.id, error = %err, "failure after cancel ignored");
                Ok(RunOutcome::Interrupted)
            }
        }
    }

    /// Requests interruption of a running execution. Caller holds the lock.
    fn interrupt(&self, execution: &Execution, inner: &mut ExecutionInner) {
        execution.cancel.cancel();
        if let Some(task) = inner.task.take() {
            task.abort();
        }
        self.engine.cancel_job_group(&execution.group_id);
    }
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Statement executor.
pub struct StatementExecutor {
    /// Shared runtime handed to execution bodies.
    runtime: Arc<ExecutionRuntime>,
    /// Shared background pool.
    pool: Arc<BackgroundPool>,
    /// Execution identifier source.
    ids: IdGenerator,
    /// Executions that have not been closed.
    executions: RwLock<HashMap<ExecutionId, Arc<Execution>>>,
}

impl StatementExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        sessions: Arc<SessionRegistry>,
        telemetry: Arc<TelemetryTracker>,
        pool: Arc<BackgroundPool>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            runtime: Arc::new(ExecutionRuntime {
                engine,
                sessions,
                telemetry,
                config,
            }),
            pool,
            ids: IdGenerator::new("exec"),
            executions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the executor configuration.
    #[must_use]
    pub fn config(&self) -> ExecutorConfig {
        self.runtime.config
    }

    /// Looks up an open execution.
    fn get(&self, execution_id: &ExecutionId) -> Result<Arc<Execution>, GatewayError> {
        self.executions
            .read()
            .map_err(|_| GatewayError::Internal("execution map lock poisoned".to_string()))?
            .get(execution_id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownExecution(execution_id.clone()))
    }

    /// Removes an open execution.
    fn remove(&self, execution_id: &ExecutionId) -> Result<Arc<Execution>, GatewayError> {
        self.executions
            .write()
            .map_err(|_| GatewayError::Internal("execution map lock poisoned".to_string()))?
            .remove(execution_id)
            .ok_or_else(|| GatewayError::UnknownExecution(execution_id.clone()))
    }

    /// Returns the number of executions that have not been closed.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.executions.read().map(|executions| executions.len()).unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------------

    /// Submits a statement for execution.
    ///
    /// Foreground submissions return once the statement finished; background
    /// submissions return once the pool admitted the work.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownSession`] for closed sessions,
    /// [`GatewayError::PoolSaturated`] when the pool rejects background work,
    /// and [`GatewayError::Engine`] when a foreground statement fails.
    pub async fn submit(
        &self,
        session_id: &SessionId,
        statement: &str,
        background: bool,
    ) -> Result<ExecutionId, GatewayError> {
        let work = Work::Statement(statement.to_string());
        self.start(session_id, statement.to_string(), work, background).await
    }

    /// Submits a metadata listing; listings always run in the foreground.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownSession`] for closed sessions and
    /// [`GatewayError::Engine`] when the catalog fails.
    pub async fn submit_listing(
        &self,
        session_id: &SessionId,
        request: MetadataRequest,
    ) -> Result<ExecutionId, GatewayError> {
        let statement = request.statement();
        self.start(session_id, statement, Work::Listing(request), false).await
    }

    /// Registers a new execution and runs it.
    async fn start(
        &self,
        session_id: &SessionId,
        statement: String,
        work: Work,
        background: bool,
    ) -> Result<ExecutionId, GatewayError> {
        let user = self.runtime.sessions.user_of(session_id)?;
        let id = self.ids.execution_id();
        let execution = Arc::new(Execution {
            id: id.clone(),
            session_id: session_id.clone(),
            group_id: JobGroupId::from(&id),
            statement,
            cursor_mode: self.runtime.config.cursor_mode,
            cancel: CancellationFlag::new(),
            inner: Mutex::new(ExecutionInner {
                state: ExecutionState::Started,
                error: None,
                schema: None,
                cursor: None,
                task: None,
            }),
        });
        self.runtime.telemetry.on_statement_start(
            &id,
            session_id,
            &execution.statement,
            &execution.group_id,
            &user,
        );
        self.executions
            .write()
            .map_err(|_| GatewayError::Internal("execution map lock poisoned".to_string()))?
            .insert(id.clone(), Arc::clone(&execution));
        info!(execution_id = %id, session_id = %session_id, background, "statement submitted");

        if background {
            self.start_background(execution, work).await
        } else {
            self.run_foreground(execution, work).await
        }
    }

    /// Runs the body on a blocking thread and waits for it.
    async fn run_foreground(
        &self,
        execution: Arc<Execution>,
        work: Work,
    ) -> Result<ExecutionId, GatewayError> {
        let runtime = Arc::clone(&self.runtime);
        let body = Arc::clone(&execution);
        let outcome = tokio::task::spawn_blocking(move || runtime.run(&body, &work))
            .await
            .map_err(|err| GatewayError::Internal(format!("execution task failed: {err}")))?;
        match outcome {
            Ok(RunOutcome::Failed(err)) => {
                self.close(&execution.id)?;
                Err(GatewayError::Engine(err))
            }
            Ok(RunOutcome::Finished | RunOutcome::Interrupted) => Ok(execution.id.clone()),
            Err(err) => {
                if let Err(close_err) = self.close(&execution.id) {
                    debug!(
                        execution_id = %execution.id,
                        error = %close_err,
                        "execution already closed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Admits the body to the background pool.
    async fn start_background(
        &self,
        execution: Arc<Execution>,
        work: Work,
    ) -> Result<ExecutionId, GatewayError> {
        let runtime = Arc::clone(&self.runtime);
        let body = Arc::clone(&execution);
        let submitted = self
            .pool
            .submit(move || {
                if let Err(err) = runtime.run(&body, &work) {
                    warn!(execution_id = %body.id, error = %err, "background execution aborted");
                }
            })
            .await;
        match submitted {
            Ok(task) => {
                let mut inner = execution.lock()?;
                if inner.state.is_running() {
                    inner.task = Some(task);
                } else if inner.state == ExecutionState::Canceled {
                    task.abort();
                }
                Ok(execution.id.clone())
            }
            Err(err) => {
                let rejection = match err {
                    PoolError::Saturated => GatewayError::PoolSaturated(execution.id.clone()),
                    PoolError::Closed => {
                        GatewayError::Internal("background pool closed".to_string())
                    }
                };
                let detail = EngineError::new(rejection.to_string());
                self.runtime.fail(&execution, detail)?;
                self.close(&execution.id)?;
                Err(rejection)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------------

    /// Cancels a running execution. Terminal executions are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownExecution`] for unknown or closed executions.
    pub fn cancel(&self, execution_id: &ExecutionId) -> Result<(), GatewayError> {
        let execution = self.get(execution_id)?;
        let mut inner = execution.lock()?;
        match transition(inner.state, ExecutionEvent::Cancel) {
            Ok(Transition::Applied(next)) => {
                inner.state = next;
                self.runtime.telemetry.on_statement_canceled(execution_id);
                self.runtime.interrupt(&execution, &mut inner);
                info!(execution_id = %execution_id, "execution canceled");
            }
            Ok(Transition::Suppressed) | Err(_) => {
                debug!(execution_id = %execution_id, state = %inner.state, "cancel ignored");
            }
        }
        Ok(())
    }

    /// Closes an execution, canceling it first when still running.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownExecution`] for unknown or closed executions.
    pub fn close(&self, execution_id: &ExecutionId) -> Result<(), GatewayError> {
        let execution = self.remove(execution_id)?;
        let mut inner = execution.lock()?;
        if let Ok(Transition::Applied(next)) = transition(inner.state, ExecutionEvent::Cancel) {
            inner.state = next;
            self.runtime.telemetry.on_statement_canceled(execution_id);
            self.runtime.interrupt(&execution, &mut inner);
        }
        match transition(inner.state, ExecutionEvent::Close) {
            Ok(Transition::Applied(next)) => inner.state = next,
            Ok(Transition::Suppressed) | Err(_) => {
                return Err(GatewayError::UnknownExecution(execution_id.clone()));
            }
        }
        inner.cursor = None;
        inner.task = None;
        self.runtime.telemetry.on_operation_closed(execution_id);
        debug!(execution_id = %execution_id, "execution closed");
        Ok(())
    }

    /// Closes every execution owned by `session_id`.
    pub fn close_session_executions(&self, session_id: &SessionId) {
        let owned: Vec<ExecutionId> = self
            .executions
            .read()
            .map(|executions| {
                executions
                    .values()
                    .filter(|execution| &execution.session_id == session_id)
                    .map(|execution| execution.id.clone())
                    .collect()
            })
            .unwrap_or_default();
        for execution_id in owned {
            if let Err(err) = self.close(&execution_id) {
                debug!(execution_id = %execution_id, error = %err, "execution already closed");
            }
        }
    }

    /// Closes every open execution; used at shutdown.
    pub fn close_all(&self) {
        let ids: Vec<ExecutionId> = self
            .executions
            .read()
            .map(|executions| executions.keys().cloned().collect())
            .unwrap_or_default();
        for execution_id in ids {
            if let Err(err) = self.close(&execution_id) {
                debug!(execution_id = %execution_id, error = %err, "execution already closed");
            }
        }
    }

    // ------------------------------------------------------------------------
    // Results
    // ------------------------------------------------------------------------

    /// Returns the execution's status.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownExecution`] for unknown or closed executions.
    pub fn status(&self, execution_id: &ExecutionId) -> Result<OperationStatus, GatewayError> {
        let execution = self.get(execution_id)?;
        let inner = execution.lock()?;
        Ok(OperationStatus {
            state: inner.state,
            error: inner.error.clone(),
            has_result_set: inner.schema.as_ref().is_some_and(|schema| !schema.is_empty()),
        })
    }

    /// Returns the result schema, available once compiled.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownExecution`] for unknown executions and
    /// [`GatewayError::WrongState`] before compilation or after failure.
    pub fn result_schema(&self, execution_id: &ExecutionId) -> Result<TableSchema, GatewayError> {
        let execution = self.get(execution_id)?;
        let inner = execution.lock()?;
        match (&inner.schema, inner.state) {
            (Some(schema), ExecutionState::Compiled | ExecutionState::Finished) => {
                Ok(schema.clone())
            }
            _ => Err(GatewayError::WrongState {
                execution_id: execution_id.clone(),
                state: inner.state,
                expected: ExecutionState::Compiled,
            }),
        }
    }

    /// Fetches up to `max_rows` rows.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnsupportedOrientation`] for orientations other
    /// than `first` and `next`, [`GatewayError::WrongState`] unless finished,
    /// and [`GatewayError::Engine`] when a streamed row fails.
    pub async fn fetch(
        &self,
        execution_id: &ExecutionId,
        orientation: FetchOrientation,
        max_rows: usize,
    ) -> Result<RowSet, GatewayError> {
        if !matches!(orientation, FetchOrientation::First | FetchOrientation::Next) {
            return Err(GatewayError::UnsupportedOrientation(orientation));
        }
        let execution = self.get(execution_id)?;
        let mut cursor = {
            let mut inner = execution.lock()?;
            if inner.state != ExecutionState::Finished {
                return Err(GatewayError::WrongState {
                    execution_id: execution_id.clone(),
                    state: inner.state,
                    expected: ExecutionState::Finished,
                });
            }
            inner.cursor.take().ok_or_else(|| {
                GatewayError::Internal(format!("cursor of {execution_id} is in use"))
            })?
        };

        let (cursor, page) = tokio::task::spawn_blocking(move || {
            let page = if orientation == FetchOrientation::First {
                cursor.rewind().and_then(|()| cursor.next(max_rows))
            } else {
                cursor.next(max_rows)
            };
            (cursor, page)
        })
        .await
        .map_err(|err| GatewayError::Internal(format!("fetch task failed: {err}")))?;

        let mut inner = execution.lock()?;
        if inner.state == ExecutionState::Finished {
            inner.cursor = Some(cursor);
        }
        page.map_err(GatewayError::Engine)
    }
}
