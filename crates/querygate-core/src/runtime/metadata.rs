// crates/querygate-core/src/runtime/metadata.rs
// ============================================================================
// Module: QueryGate Metadata Listings
// Description: Schema, table, and table-type listings over the session catalog.
// Purpose: Serve catalog metadata through the regular execution pipeline.
// Dependencies: crate::{core, interfaces}, serde
// ============================================================================

//! ## Overview
//! Metadata listings are pass-through reads of the [`SessionCatalog`]. Each
//! listing materializes into a [`MaterializedResult`] with JDBC column names,
//! which the executor then treats like any other compiled statement.
//!
//! Catalog table kinds reach clients through a [`TableTypeMapping`]: the
//! `hive` mapping reports catalog names verbatim, the `classic` mapping folds
//! managed and external tables into `TABLE` and virtual views into `VIEW`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::pattern::convert_identifier_pattern;
use crate::core::pattern::convert_schema_pattern;
use crate::core::rows::Row;
use crate::core::rows::Value;
use crate::core::schema::EngineColumn;
use crate::core::schema::EngineType;
use crate::interfaces::CompiledStatement;
use crate::interfaces::EngineContext;
use crate::interfaces::EngineError;
use crate::interfaces::EngineTableType;
use crate::interfaces::RowStream;
use crate::interfaces::TableEntry;

// ============================================================================
// SECTION: Table Type Mapping
// ============================================================================

/// Catalog-to-client table type naming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableTypeMapping {
    /// Catalog names reported verbatim.
    Hive,
    /// JDBC-style `TABLE` / `VIEW` names.
    #[default]
    Classic,
}

impl TableTypeMapping {
    /// Selects a mapping by name: `classic` (any case) or else `hive`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("classic") { Self::Classic } else { Self::Hive }
    }

    /// Returns the mapping name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hive => "hive",
            Self::Classic => "classic",
        }
    }

    /// Returns the client-visible name for a catalog kind.
    #[must_use]
    pub const fn client_name(self, table_type: EngineTableType) -> &'static str {
        match (self, table_type) {
            (Self::Classic, EngineTableType::ManagedTable | EngineTableType::ExternalTable) => {
                "TABLE"
            }
            (Self::Classic, EngineTableType::VirtualView) => "VIEW",
            _ => table_type.as_str(),
        }
    }

    /// Returns the client name temporary views are reported under.
    #[must_use]
    pub const fn view_name(self) -> &'static str {
        self.client_name(EngineTableType::VirtualView)
    }

    /// Returns the distinct client names, in catalog order.
    #[must_use]
    pub fn table_types(self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::with_capacity(EngineTableType::ALL.len());
        for table_type in EngineTableType::ALL {
            let name = self.client_name(table_type);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

impl fmt::Display for TableTypeMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Metadata listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataRequest {
    /// List schemas (databases).
    Schemas {
        /// Catalog name; ignored, the gateway serves a single catalog.
        catalog: Option<String>,
        /// Client schema pattern.
        schema_pattern: Option<String>,
    },
    /// List tables and views.
    Tables {
        /// Catalog name; ignored, the gateway serves a single catalog.
        catalog: Option<String>,
        /// Client schema pattern.
        schema_pattern: Option<String>,
        /// Client table-name pattern.
        table_pattern: Option<String>,
        /// Client table types to keep; empty or absent keeps all.
        table_types: Option<Vec<String>>,
    },
    /// List the table types of the active mapping.
    TableTypes,
}

impl MetadataRequest {
    /// Returns the text recorded as the execution's statement.
    #[must_use]
    pub fn statement(&self) -> String {
        match self {
            Self::Schemas {
                catalog,
                schema_pattern,
            } => format!(
                "GetSchemas: catalog : {}, schemaPattern : {}",
                display_opt(catalog.as_deref()),
                display_opt(schema_pattern.as_deref())
            ),
            Self::Tables {
                catalog,
                schema_pattern,
                table_pattern,
                table_types,
            } => format!(
                "GetTables: catalog : {}, schemaPattern : {}, tableName : {}, tableTypes : {}",
                display_opt(catalog.as_deref()),
                display_opt(schema_pattern.as_deref()),
                display_opt(table_pattern.as_deref()),
                table_types.as_ref().map_or_else(|| "null".to_string(), |types| types.join(","))
            ),
            Self::TableTypes => "GetTableTypes".to_string(),
        }
    }

    /// Runs the listing against `context`'s catalog.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the catalog fails.
    pub fn run(
        &self,
        context: &dyn EngineContext,
        mapping: TableTypeMapping,
    ) -> Result<MaterializedResult, EngineError> {
        match self {
            Self::Schemas {
                schema_pattern, ..
            } => list_schemas(context, schema_pattern.as_deref()),
            Self::Tables {
                schema_pattern,
                table_pattern,
                table_types,
                ..
            } => list_tables(
                context,
                mapping,
                schema_pattern.as_deref(),
                table_pattern.as_deref(),
                table_types.as_deref(),
            ),
            Self::TableTypes => Ok(list_table_types(mapping, &self.statement())),
        }
    }
}

/// Renders an optional request field.
fn display_opt(value: Option<&str>) -> &str {
    value.unwrap_or("null")
}

// ============================================================================
// SECTION: Listings
// ============================================================================

/// Column names of a schema listing.
pub const SCHEMA_COLUMNS: [&str; 2] = ["TABLE_SCHEM", "TABLE_CATALOG"];

/// Column names of a table listing.
pub const TABLE_COLUMNS: [&str; 10] = [
    "TABLE_CAT",
    "TABLE_SCHEM",
    "TABLE_NAME",
    "TABLE_TYPE",
    "REMARKS",
    "TYPE_CAT",
    "TYPE_SCHEM",
    "TYPE_NAME",
    "SELF_REFERENCING_COL_NAME",
    "REF_GENERATION",
];

/// Column names of a table-type listing.
pub const TABLE_TYPE_COLUMNS: [&str; 1] = ["TABLE_TYPE"];

/// Catalog name reported for every row.
const DEFAULT_CATALOG: &str = "";

/// Builds string columns for a listing.
fn string_columns(names: &[&str]) -> Vec<EngineColumn> {
    names.iter().map(|name| EngineColumn::new(*name, EngineType::String)).collect()
}

/// Lists databases plus the global temp database when it matches.
fn list_schemas(
    context: &dyn EngineContext,
    schema_pattern: Option<&str>,
) -> Result<MaterializedResult, EngineError> {
    let catalog = context.catalog();
    let pattern = convert_schema_pattern(schema_pattern);
    let mut rows: Vec<Row> = catalog
        .list_databases(&pattern)?
        .into_iter()
        .map(|name| vec![Value::String(name), Value::String(DEFAULT_CATALOG.to_string())])
        .collect();
    let global_temp = catalog.global_temp_database();
    if pattern.matches(&global_temp) {
        rows.push(vec![Value::String(global_temp), Value::String(DEFAULT_CATALOG.to_string())]);
    }
    Ok(MaterializedResult::new(
        format!("ListSchemas {pattern}"),
        string_columns(&SCHEMA_COLUMNS),
        rows,
    ))
}

/// Lists tables of matching databases, then temporary views.
fn list_tables(
    context: &dyn EngineContext,
    mapping: TableTypeMapping,
    schema_pattern: Option<&str>,
    table_pattern: Option<&str>,
    table_types: Option<&[String]>,
) -> Result<MaterializedResult, EngineError> {
    let catalog = context.catalog();
    let schemas = convert_schema_pattern(schema_pattern);
    let tables = convert_identifier_pattern(table_pattern);
    let wanted = |name: &str| match table_types {
        None | Some([]) => true,
        Some(types) => types.iter().any(|wanted| wanted.eq_ignore_ascii_case(name)),
    };

    let mut rows = Vec::new();
    for database in catalog.list_databases(&schemas)? {
        for entry in catalog.list_tables(&database, &tables)? {
            let client_name = mapping.client_name(entry.table_type);
            if wanted(client_name) {
                rows.push(table_row(&entry, client_name));
            }
        }
    }

    let view_name = mapping.view_name();
    if wanted(view_name) {
        let global_temp = catalog.global_temp_database();
        let mut views = Vec::new();
        if schemas.matches(&global_temp) {
            views.extend(catalog.list_global_temp_views(&tables)?);
        }
        views.extend(catalog.list_local_temp_views(&tables)?);
        for view in &views {
            rows.push(table_row(view, view_name));
        }
    }

    Ok(MaterializedResult::new(
        format!("ListTables {schemas} {tables}"),
        string_columns(&TABLE_COLUMNS),
        rows,
    ))
}

/// Builds one table-listing row.
fn table_row(entry: &TableEntry, client_name: &str) -> Row {
    let database = entry.database.clone().map_or(Value::Null, Value::String);
    vec![
        Value::String(DEFAULT_CATALOG.to_string()),
        database,
        Value::String(entry.name.clone()),
        Value::String(client_name.to_string()),
        Value::String(entry.comment.clone().unwrap_or_default()),
        Value::Null,
        Value::Null,
        Value::Null,
        Value::Null,
        Value::Null,
    ]
}

/// Lists the distinct client table types.
fn list_table_types(mapping: TableTypeMapping, plan: &str) -> MaterializedResult {
    let rows =
        mapping.table_types().into_iter().map(|name| vec![Value::String(name.to_string())]).collect();
    MaterializedResult::new(plan.to_string(), string_columns(&TABLE_TYPE_COLUMNS), rows)
}

// ============================================================================
// SECTION: Materialized Result
// ============================================================================

/// Fully computed result served through the compiled-statement contract.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedResult {
    /// Plan text.
    plan: String,
    /// Result columns.
    columns: Vec<EngineColumn>,
    /// Result rows.
    rows: Vec<Row>,
}

impl MaterializedResult {
    /// Creates a result from precomputed rows.
    #[must_use]
    pub const fn new(plan: String, columns: Vec<EngineColumn>, rows: Vec<Row>) -> Self {
        Self {
            plan,
            columns,
            rows,
        }
    }

    /// Returns the rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

impl CompiledStatement for MaterializedResult {
    fn plan(&self) -> String {
        self.plan.clone()
    }

    fn schema(&self) -> Vec<EngineColumn> {
        self.columns.clone()
    }

    fn stream(&self) -> Result<RowStream, EngineError> {
        Ok(Box::new(self.rows.clone().into_iter().map(Ok)))
    }

    fn collect(&self) -> Result<Vec<Row>, EngineError> {
        Ok(self.rows.clone())
    }
}
