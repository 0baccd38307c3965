// crates/querygate-core/src/core/schema.rs
// ============================================================================
// Module: QueryGate Schema Translation
// Description: Engine column types, wire schema, and per-column readers.
// Purpose: Decide each column's wire form once per execution, never per row.
// Dependencies: crate::core::rows, serde
// ============================================================================

//! ## Overview
//! [`SchemaTranslator`] is a pure mapping from engine-native column types to
//! the schema clients see. Composite and non-scalar columns (arrays, maps,
//! structs, user-defined and interval types) are exposed as strings; scalar
//! columns keep their native type. Translation also yields a [`RowProjector`],
//! a fixed array of [`ColumnReader`]s applied to every fetched row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::rows::Row;
use crate::core::rows::Value;

// ============================================================================
// SECTION: Engine Types
// ============================================================================

/// Named field inside a struct type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructField {
    /// Field name.
    pub name: String,
    /// Field type.
    pub data_type: EngineType,
}

/// Column type as declared by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineType {
    /// Untyped NULL column.
    Null,
    /// Boolean.
    Boolean,
    /// 8-bit integer.
    TinyInt,
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    BigInt,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Fixed-point decimal.
    Decimal {
        /// Total digits.
        precision: u8,
        /// Digits after the point.
        scale: u8,
    },
    /// Unbounded character data.
    String,
    /// Bounded character data.
    Varchar {
        /// Maximum length.
        length: u32,
    },
    /// Fixed-width character data.
    Char {
        /// Fixed length.
        length: u32,
    },
    /// Raw bytes.
    Binary,
    /// Calendar date.
    Date,
    /// Timestamp.
    Timestamp,
    /// Calendar interval.
    Interval,
    /// Ordered collection.
    Array {
        /// Element type.
        element: Box<Self>,
    },
    /// Key/value map.
    Map {
        /// Key type.
        key: Box<Self>,
        /// Value type.
        value: Box<Self>,
    },
    /// Record of named fields.
    Struct {
        /// Fields in declaration order.
        fields: Vec<StructField>,
    },
    /// Engine user-defined type with its storage type.
    UserDefined {
        /// Type name.
        name: String,
        /// Underlying SQL type.
        sql_type: Box<Self>,
    },
}

impl EngineType {
    /// Returns true when values of this type are rendered to strings.
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(
            self,
            Self::Array { .. }
                | Self::Map { .. }
                | Self::Struct { .. }
                | Self::UserDefined { .. }
                | Self::Interval
        )
    }

    /// Returns the catalog-style type name (`array<int>`, `decimal(10,2)`).
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::Null => "void".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::TinyInt => "tinyint".to_string(),
            Self::SmallInt => "smallint".to_string(),
            Self::Int => "int".to_string(),
            Self::BigInt => "bigint".to_string(),
            Self::Float => "float".to_string(),
            Self::Double => "double".to_string(),
            Self::Decimal {
                precision,
                scale,
            } => format!("decimal({precision},{scale})"),
            Self::String => "string".to_string(),
            Self::Varchar {
                length,
            } => format!("varchar({length})"),
            Self::Char {
                length,
            } => format!("char({length})"),
            Self::Binary => "binary".to_string(),
            Self::Date => "date".to_string(),
            Self::Timestamp => "timestamp".to_string(),
            Self::Interval => "interval".to_string(),
            Self::Array {
                element,
            } => format!("array<{}>", element.type_name()),
            Self::Map {
                key,
                value,
            } => format!("map<{},{}>", key.type_name(), value.type_name()),
            Self::Struct {
                fields,
            } => {
                let inner: Vec<String> = fields
                    .iter()
                    .map(|field| format!("{}:{}", field.name, field.data_type.type_name()))
                    .collect();
                format!("struct<{}>", inner.join(","))
            }
            Self::UserDefined {
                name, ..
            } => name.clone(),
        }
    }
}

/// Column declared by the engine for a compiled statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineColumn {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub data_type: EngineType,
    /// Whether NULL values may appear.
    pub nullable: bool,
    /// Optional column comment.
    pub comment: Option<String>,
}

impl EngineColumn {
    /// Creates a nullable column without a comment.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: EngineType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            comment: None,
        }
    }
}

// ============================================================================
// SECTION: Wire Schema
// ============================================================================

/// Column type visible to clients.
///
/// # Invariants
/// - Variants are stable for protocol adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireType {
    /// NULL-only column.
    Null,
    /// Boolean.
    Boolean,
    /// 8-bit integer.
    TinyInt,
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    BigInt,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Decimal.
    Decimal,
    /// Character data, including rendered composites.
    String,
    /// Bounded character data.
    Varchar,
    /// Fixed-width character data.
    Char,
    /// Raw bytes.
    Binary,
    /// Calendar date.
    Date,
    /// Timestamp.
    Timestamp,
}

/// One column of the client-visible schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Zero-based position.
    pub position: usize,
    /// Wire type.
    pub wire_type: WireType,
    /// Engine type name, kept for composite columns rendered as strings.
    pub type_name: String,
    /// Whether NULL values may appear.
    pub nullable: bool,
    /// Optional column comment.
    pub comment: Option<String>,
    /// Decimal precision when applicable.
    pub precision: Option<u8>,
    /// Decimal scale when applicable.
    pub scale: Option<u8>,
}

/// Client-visible result schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Columns in result order.
    pub columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true for a schema without columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|column| column.name == name)
    }
}

// ============================================================================
// SECTION: Column Readers
// ============================================================================

/// Per-column read strategy chosen once at translation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnReader {
    /// Value is passed through unchanged.
    Native,
    /// Value is rendered to its canonical string form; NULL stays NULL.
    Stringify,
}

impl ColumnReader {
    /// Applies the strategy to one value.
    #[must_use]
    pub fn read(self, value: Value) -> Value {
        match self {
            Self::Native => value,
            Self::Stringify if value.is_null() => value,
            Self::Stringify => Value::String(value.to_canonical_string()),
        }
    }
}

/// Fixed array of column readers for one result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowProjector {
    /// Reader per column position.
    readers: Vec<ColumnReader>,
}

impl RowProjector {
    /// Builds a projector from explicit readers.
    #[must_use]
    pub const fn new(readers: Vec<ColumnReader>) -> Self {
        Self {
            readers,
        }
    }

    /// Returns the readers in column order.
    #[must_use]
    pub fn readers(&self) -> &[ColumnReader] {
        &self.readers
    }

    /// Projects a row; values past the declared columns pass through.
    #[must_use]
    pub fn project(&self, row: Row) -> Row {
        row.into_iter()
            .enumerate()
            .map(|(index, value)| {
                self.readers.get(index).copied().unwrap_or(ColumnReader::Native).read(value)
            })
            .collect()
    }
}

// ============================================================================
// SECTION: Translator
// ============================================================================

/// Translation output: the wire schema plus its compiled projector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedSchema {
    /// Client-visible schema.
    pub schema: TableSchema,
    /// Readers matching the schema columns.
    pub projector: RowProjector,
}

/// Pure engine-to-wire schema mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaTranslator;

impl SchemaTranslator {
    /// Translates engine columns into the wire schema and column readers.
    #[must_use]
    pub fn translate(columns: &[EngineColumn]) -> TranslatedSchema {
        let mut descriptors = Vec::with_capacity(columns.len());
        let mut readers = Vec::with_capacity(columns.len());
        for (position, column) in columns.iter().enumerate() {
            let (wire_type, reader) = Self::wire_type(&column.data_type);
            let (precision, scale) = match column.data_type {
                EngineType::Decimal {
                    precision,
                    scale,
                } => (Some(precision), Some(scale)),
                _ => (None, None),
            };
            descriptors.push(ColumnDescriptor {
                name: column.name.clone(),
                position,
                wire_type,
                type_name: column.data_type.type_name(),
                nullable: column.nullable,
                comment: column.comment.clone(),
                precision,
                scale,
            });
            readers.push(reader);
        }
        TranslatedSchema {
            schema: TableSchema {
                columns: descriptors,
            },
            projector: RowProjector::new(readers),
        }
    }

    /// Maps one engine type to its wire type and reader.
    #[must_use]
    pub const fn wire_type(data_type: &EngineType) -> (WireType, ColumnReader) {
        let wire = match data_type {
            EngineType::Null => WireType::Null,
            EngineType::Boolean => WireType::Boolean,
            EngineType::TinyInt => WireType::TinyInt,
            EngineType::SmallInt => WireType::SmallInt,
            EngineType::Int => WireType::Int,
            EngineType::BigInt => WireType::BigInt,
            EngineType::Float => WireType::Float,
            EngineType::Double => WireType::Double,
            EngineType::Decimal { .. } => WireType::Decimal,
            EngineType::Varchar { .. } => WireType::Varchar,
            EngineType::Char { .. } => WireType::Char,
            EngineType::Binary => WireType::Binary,
            EngineType::Date => WireType::Date,
            EngineType::Timestamp => WireType::Timestamp,
            EngineType::String
            | EngineType::Interval
            | EngineType::Array { .. }
            | EngineType::Map { .. }
            | EngineType::Struct { .. }
            | EngineType::UserDefined { .. } => WireType::String,
        };
        let reader =
            if data_type.is_composite() { ColumnReader::Stringify } else { ColumnReader::Native };
        (wire, reader)
    }
}
