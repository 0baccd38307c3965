// crates/querygate-core/src/lib.rs
// ============================================================================
// Module: QueryGate Core Library
// Description: Public API surface for the QueryGate execution front end.
// Purpose: Expose core types, collaborator interfaces, and runtime components.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! QueryGate is the front-end execution layer of a multi-tenant SQL gateway.
//! It accepts statements from concurrent client sessions, runs them
//! asynchronously against a backing query engine, serves results through
//! pull-based cursors, and keeps a bounded operational history of sessions and
//! executions. Parsing, planning, storage and transport stay behind explicit
//! interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::CancellationFlag;
pub use interfaces::CompiledStatement;
pub use interfaces::EngineContext;
pub use interfaces::EngineError;
pub use interfaces::EngineTableType;
pub use interfaces::ExecutionScope;
pub use interfaces::JobListener;
pub use interfaces::QueryEngine;
pub use interfaces::RowStream;
pub use interfaces::SessionCatalog;
pub use interfaces::SessionEffect;
pub use interfaces::TableEntry;
pub use runtime::BackgroundPool;
pub use runtime::CursorMode;
pub use runtime::FileAuditSink;
pub use runtime::GatewayConfig;
pub use runtime::GatewayError;
pub use runtime::InMemoryEngine;
pub use runtime::LifecycleAuditEvent;
pub use runtime::LifecycleAuditSink;
pub use runtime::LifecycleEventKind;
pub use runtime::MemoryTable;
pub use runtime::MetadataRequest;
pub use runtime::NoopAuditSink;
pub use runtime::OperationStatus;
pub use runtime::PoolConfig;
pub use runtime::PoolError;
pub use runtime::QueryGateway;
pub use runtime::ResultCursor;
pub use runtime::RetentionConfig;
pub use runtime::SessionRegistry;
pub use runtime::StatementExecutor;
pub use runtime::StderrAuditSink;
pub use runtime::TableTypeMapping;
pub use runtime::TelemetryTracker;
