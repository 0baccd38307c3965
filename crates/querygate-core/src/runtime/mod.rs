// crates/querygate-core/src/runtime/mod.rs
// ============================================================================
// Module: QueryGate Runtime
// Description: Session registry, statement executor, cursors, and telemetry.
// Purpose: Run client statements against the engine with bounded resources.
// Dependencies: crate::{core, interfaces}, tokio, tracing
// ============================================================================

//! ## Overview
//! Runtime modules implement the statement-execution lifecycle. The
//! [`QueryGateway`] facade wires them together; protocol adapters should call
//! the facade rather than individual components.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod cursor;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod memory;
pub mod metadata;
pub mod pool;
pub mod session;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::LifecycleAuditEvent;
pub use audit::LifecycleAuditEventParams;
pub use audit::LifecycleAuditSink;
pub use audit::LifecycleEventKind;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use cursor::CursorMode;
pub use cursor::ResultCursor;
pub use error::GatewayError;
pub use executor::ExecutorConfig;
pub use executor::OperationStatus;
pub use executor::StatementExecutor;
pub use gateway::GatewayConfig;
pub use gateway::QueryGateway;
pub use memory::InMemoryEngine;
pub use memory::MemoryTable;
pub use metadata::MaterializedResult;
pub use metadata::MetadataRequest;
pub use metadata::TableTypeMapping;
pub use pool::BackgroundPool;
pub use pool::BackgroundTask;
pub use pool::PoolConfig;
pub use pool::PoolError;
pub use session::INITIAL_DATABASE_KEY;
pub use session::SessionInfo;
pub use session::SessionRegistry;
pub use telemetry::RetentionConfig;
pub use telemetry::TelemetryTracker;
