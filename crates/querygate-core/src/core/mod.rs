// crates/querygate-core/src/core/mod.rs
// ============================================================================
// Module: QueryGate Core Types
// Description: Identifiers, lifecycle states, rows, schemas, and records.
// Purpose: Provide stable, serializable types shared by every runtime component.
// Dependencies: rand, serde, thiserror
// ============================================================================

//! ## Overview
//! QueryGate core types define the execution lifecycle, the row and schema
//! vocabulary exchanged with clients, and the telemetry records kept for
//! observability. They carry no runtime behavior beyond pure functions.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod identifiers;
pub mod pattern;
pub mod records;
pub mod rows;
pub mod schema;
pub mod state;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::ExecutionId;
pub use identifiers::IdGenerator;
pub use identifiers::JobGroupId;
pub use identifiers::SessionId;
pub use pattern::NativePattern;
pub use pattern::convert_identifier_pattern;
pub use pattern::convert_schema_pattern;
pub use records::ErrorDetail;
pub use records::ExecutionRecord;
pub use records::SessionRecord;
pub use rows::FetchOrientation;
pub use rows::Row;
pub use rows::RowSet;
pub use rows::Value;
pub use schema::ColumnDescriptor;
pub use schema::ColumnReader;
pub use schema::EngineColumn;
pub use schema::EngineType;
pub use schema::RowProjector;
pub use schema::SchemaTranslator;
pub use schema::StructField;
pub use schema::TableSchema;
pub use schema::TranslatedSchema;
pub use schema::WireType;
pub use state::ExecutionEvent;
pub use state::ExecutionState;
pub use state::Transition;
pub use state::TransitionError;
pub use state::transition;
pub use time::Timestamp;
