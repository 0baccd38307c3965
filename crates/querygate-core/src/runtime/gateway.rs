// crates/querygate-core/src/runtime/gateway.rs
// ============================================================================
// Module: QueryGate Gateway Facade
// Description: Client operation surface over the registry, executor, and tracker.
// Purpose: Wire gateway components together and expose the operation contract.
// Dependencies: crate::{core, interfaces, runtime}, tokio, tracing
// ============================================================================

//! ## Overview
//! [`QueryGateway`] is what protocol adapters call. It owns the telemetry
//! tracker, the session registry, the background pool and the statement
//! executor, all built from one [`GatewayConfig`] and an injected engine.
//! [`QueryGateway::shutdown`] closes executions and sessions, then stops the
//! pool and the tracker.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::core::identifiers::ExecutionId;
use crate::core::identifiers::SessionId;
use crate::core::rows::FetchOrientation;
use crate::core::rows::RowSet;
use crate::core::schema::TableSchema;
use crate::interfaces::JobListener;
use crate::interfaces::QueryEngine;
use crate::runtime::audit::LifecycleAuditSink;
use crate::runtime::audit::NoopAuditSink;
use crate::runtime::cursor::CursorMode;
use crate::runtime::error::GatewayError;
use crate::runtime::executor::ExecutorConfig;
use crate::runtime::executor::OperationStatus;
use crate::runtime::executor::StatementExecutor;
use crate::runtime::metadata::MetadataRequest;
use crate::runtime::metadata::TableTypeMapping;
use crate::runtime::pool::BackgroundPool;
use crate::runtime::pool::PoolConfig;
use crate::runtime::session::SessionRegistry;
use crate::runtime::telemetry::RetentionConfig;
use crate::runtime::telemetry::TelemetryTracker;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Gateway runtime configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Share one engine context across every session.
    pub single_session: bool,
    /// Cursor materialization for new executions.
    pub cursor_mode: CursorMode,
    /// Table type naming for metadata listings.
    pub table_type_mapping: TableTypeMapping,
    /// Background pool sizing.
    pub pool: PoolConfig,
    /// Telemetry retention limits.
    pub retention: RetentionConfig,
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Statement-execution front end.
pub struct QueryGateway {
    /// Gateway configuration.
    config: GatewayConfig,
    /// Telemetry tracker shared by all components.
    telemetry: Arc<TelemetryTracker>,
    /// Session registry.
    sessions: Arc<SessionRegistry>,
    /// Shared background pool.
    pool: Arc<BackgroundPool>,
    /// Statement executor.
    executor: StatementExecutor,
}

impl QueryGateway {
    /// Builds a gateway over `engine`, forwarding lifecycle events to `audit`.
    #[must_use]
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        config: GatewayConfig,
        audit: Arc<dyn LifecycleAuditSink>,
    ) -> Self {
        let telemetry = Arc::new(TelemetryTracker::new(config.retention, audit));
        engine.attach_job_listener(Arc::clone(&telemetry) as Arc<dyn JobListener>);
        let sessions = Arc::new(SessionRegistry::new(
            Arc::clone(&engine),
            Arc::clone(&telemetry),
            config.single_session,
        ));
        let pool = Arc::new(BackgroundPool::new(config.pool));
        let executor = StatementExecutor::new(
            engine,
            Arc::clone(&sessions),
            Arc::clone(&telemetry),
            Arc::clone(&pool),
            ExecutorConfig {
                cursor_mode: config.cursor_mode,
                table_type_mapping: config.table_type_mapping,
            },
        );
        info!(
            single_session = config.single_session,
            workers = config.pool.workers,
            queue_capacity = config.pool.queue_capacity,
            mapping = %config.table_type_mapping,
            "query gateway started"
        );
        Self {
            config,
            telemetry,
            sessions,
            pool,
            executor,
        }
    }

    /// Builds a gateway without an audit sink.
    #[must_use]
    pub fn without_audit(engine: Arc<dyn QueryEngine>, config: GatewayConfig) -> Self {
        Self::new(engine, config, Arc::new(NoopAuditSink))
    }

    /// Returns the gateway configuration.
    #[must_use]
    pub const fn config(&self) -> GatewayConfig {
        self.config
    }

    /// Returns the telemetry tracker.
    #[must_use]
    pub const fn telemetry(&self) -> &Arc<TelemetryTracker> {
        &self.telemetry
    }

    /// Returns the session registry.
    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Returns the background pool.
    #[must_use]
    pub const fn pool(&self) -> &Arc<BackgroundPool> {
        &self.pool
    }

    // ------------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------------

    /// Opens a session.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EngineInit`] when the engine context fails.
    pub async fn open_session(
        &self,
        user: &str,
        address: &str,
        config: BTreeMap<String, String>,
    ) -> Result<SessionId, GatewayError> {
        let sessions = Arc::clone(&self.sessions);
        let user = user.to_string();
        let address = address.to_string();
        tokio::task::spawn_blocking(move || sessions.open_session(&user, &address, &config))
            .await
            .map_err(|err| GatewayError::Internal(format!("open session task failed: {err}")))?
    }

    /// Closes a session and every execution it owns.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownSession`] for unknown or closed sessions.
    pub fn close_session(&self, session_id: &SessionId) -> Result<(), GatewayError> {
        if !self.sessions.contains(session_id) {
            return Err(GatewayError::UnknownSession(session_id.clone()));
        }
        self.executor.close_session_executions(session_id);
        self.sessions.close_session(session_id)
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    /// Submits a statement.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownSession`], [`GatewayError::PoolSaturated`]
    /// or [`GatewayError::Engine`].
    pub async fn execute_statement(
        &self,
        session_id: &SessionId,
        statement: &str,
        background: bool,
    ) -> Result<ExecutionId, GatewayError> {
        self.executor.submit(session_id, statement, background).await
    }

    /// Returns an execution's status.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownExecution`] for unknown or closed executions.
    pub fn operation_status(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<OperationStatus, GatewayError> {
        self.executor.status(execution_id)
    }

    /// Returns an execution's result schema.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownExecution`] or [`GatewayError::WrongState`].
    pub fn result_schema(&self, execution_id: &ExecutionId) -> Result<TableSchema, GatewayError> {
        self.executor.result_schema(execution_id)
    }

    /// Fetches a page of rows.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnsupportedOrientation`],
    /// [`GatewayError::WrongState`], [`GatewayError::UnknownExecution`] or
    /// [`GatewayError::Engine`].
    pub async fn fetch(
        &self,
        execution_id: &ExecutionId,
        orientation: FetchOrientation,
        max_rows: usize,
    ) -> Result<RowSet, GatewayError> {
        self.executor.fetch(execution_id, orientation, max_rows).await
    }

    /// Cancels an execution.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownExecution`] for unknown or closed executions.
    pub fn cancel(&self, execution_id: &ExecutionId) -> Result<(), GatewayError> {
        self.executor.cancel(execution_id)
    }

    /// Closes an execution.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownExecution`] for unknown or closed executions.
    pub fn close_operation(&self, execution_id: &ExecutionId) -> Result<(), GatewayError> {
        self.executor.close(execution_id)
    }

    // ------------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------------

    /// Lists schemas matching `schema_pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownSession`] or [`GatewayError::Engine`].
    pub async fn get_schemas(
        &self,
        session_id: &SessionId,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
    ) -> Result<ExecutionId, GatewayError> {
        let request = MetadataRequest::Schemas {
            catalog: catalog.map(str::to_string),
            schema_pattern: schema_pattern.map(str::to_string),
        };
        self.executor.submit_listing(session_id, request).await
    }

    /// Lists tables and views.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownSession`] or [`GatewayError::Engine`].
    pub async fn get_tables(
        &self,
        session_id: &SessionId,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
        table_types: Option<&[&str]>,
    ) -> Result<ExecutionId, GatewayError> {
        let request = MetadataRequest::Tables {
            catalog: catalog.map(str::to_string),
            schema_pattern: schema_pattern.map(str::to_string),
            table_pattern: table_pattern.map(str::to_string),
            table_types: table_types
                .map(|types| types.iter().map(|name| (*name).to_string()).collect()),
        };
        self.executor.submit_listing(session_id, request).await
    }

    /// Lists the client table types.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownSession`].
    pub async fn get_table_types(
        &self,
        session_id: &SessionId,
    ) -> Result<ExecutionId, GatewayError> {
        self.executor.submit_listing(session_id, MetadataRequest::TableTypes).await
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Closes all executions and sessions, then stops the pool and tracker.
    pub fn shutdown(&self) {
        self.executor.close_all();
        self.sessions.close_all();
        self.pool.close();
        self.telemetry.stop();
        info!("query gateway stopped");
    }
}
