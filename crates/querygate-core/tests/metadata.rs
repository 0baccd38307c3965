// crates/querygate-core/tests/metadata.rs
// ============================================================================
// Module: Metadata Operation Tests
// Description: Schema, table, and table-type listings over the in-memory engine.
// Purpose: Validate listing rows, pattern handling, and table type mappings.
// Dependencies: querygate-core, tokio
// ============================================================================

//! ## Overview
//! Listings run as ordinary executions, so every test fetches rows the same
//! way a client would. The fixture catalog has three databases, one global
//! temporary view and a mix of table kinds.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;

use querygate_core::EngineColumn;
use querygate_core::EngineTableType;
use querygate_core::EngineType;
use querygate_core::ExecutionId;
use querygate_core::ExecutionState;
use querygate_core::FetchOrientation;
use querygate_core::GatewayConfig;
use querygate_core::GatewayError;
use querygate_core::InMemoryEngine;
use querygate_core::MemoryTable;
use querygate_core::QueryGateway;
use querygate_core::Row;
use querygate_core::SessionId;
use querygate_core::TableTypeMapping;
use querygate_core::Value;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn fixture_engine() -> InMemoryEngine {
    let engine = InMemoryEngine::new();
    let columns = vec![
        EngineColumn::new("id", EngineType::BigInt),
        EngineColumn::new("region", EngineType::String),
    ];
    let rows = vec![
        vec![Value::Int(1), Value::String("eu".to_string())],
        vec![Value::Int(2), Value::String("us".to_string())],
    ];
    engine.register_table(
        "sales",
        "orders",
        MemoryTable::new(columns.clone(), rows.clone()).with_comment("order facts"),
    );
    engine.register_table(
        "sales",
        "customers",
        MemoryTable::new(columns.clone(), Vec::new()).with_type(EngineTableType::ExternalTable),
    );
    engine.register_table(
        "hr",
        "payroll_view",
        MemoryTable::new(columns.clone(), Vec::new()).with_type(EngineTableType::VirtualView),
    );
    engine.register_global_temp_view("gview", MemoryTable::new(columns, rows));
    engine
}

async fn start(mapping: TableTypeMapping) -> (QueryGateway, SessionId) {
    let config = GatewayConfig {
        table_type_mapping: mapping,
        ..GatewayConfig::default()
    };
    let gateway = QueryGateway::without_audit(Arc::new(fixture_engine()), config);
    let session = gateway.open_session("alice", "10.0.0.1", BTreeMap::new()).await.unwrap();
    (gateway, session)
}

async fn fetch_all(gateway: &QueryGateway, execution: &ExecutionId) -> Vec<Row> {
    let page = gateway.fetch(execution, FetchOrientation::Next, 1000).await.unwrap();
    assert!(!page.has_more);
    page.rows
}

fn text(value: &Value) -> Option<&str> {
    match value {
        Value::String(text) => Some(text.as_str()),
        Value::Null => None,
        other => panic!("unexpected value {other:?}"),
    }
}

fn column(rows: &[Row], index: usize) -> Vec<Option<&str>> {
    rows.iter().map(|row| text(&row[index])).collect()
}

// ============================================================================
// SECTION: Schemas
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn get_schemas_lists_databases_and_global_temp() {
    let (gateway, session) = start(TableTypeMapping::Classic).await;
    let execution = gateway.get_schemas(&session, None, None).await.unwrap();

    let schema = gateway.result_schema(&execution).unwrap();
    let names: Vec<&str> = schema.columns.iter().map(|column| column.name.as_str()).collect();
    assert_eq!(names, vec!["TABLE_SCHEM", "TABLE_CATALOG"]);

    let rows = fetch_all(&gateway, &execution).await;
    assert_eq!(
        column(&rows, 0),
        vec![Some("default"), Some("hr"), Some("sales"), Some("global_temp")]
    );
    assert!(column(&rows, 1).iter().all(|catalog| *catalog == Some("")));

    let record = gateway.telemetry().execution(&execution).unwrap();
    assert_eq!(record.statement, "GetSchemas: catalog : null, schemaPattern : null");
    assert_eq!(record.state, ExecutionState::Finished);
}

#[tokio::test(flavor = "multi_thread")]
async fn get_schemas_applies_client_patterns() {
    let (gateway, session) = start(TableTypeMapping::Classic).await;

    let execution = gateway.get_schemas(&session, None, Some("s%")).await.unwrap();
    assert_eq!(column(&fetch_all(&gateway, &execution).await, 0), vec![Some("sales")]);

    let execution = gateway.get_schemas(&session, None, Some("global%")).await.unwrap();
    assert_eq!(column(&fetch_all(&gateway, &execution).await, 0), vec![Some("global_temp")]);

    let execution = gateway.get_schemas(&session, None, Some("")).await.unwrap();
    assert_eq!(fetch_all(&gateway, &execution).await.len(), 4);

    let execution = gateway.get_schemas(&session, None, Some("H_")).await.unwrap();
    assert_eq!(column(&fetch_all(&gateway, &execution).await, 0), vec![Some("hr")]);
}

// ============================================================================
// SECTION: Tables
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn get_tables_reports_classic_types_and_full_rows() {
    let (gateway, session) = start(TableTypeMapping::Classic).await;
    let execution =
        gateway.get_tables(&session, None, Some("sales"), Some("%"), None).await.unwrap();

    let schema = gateway.result_schema(&execution).unwrap();
    assert_eq!(schema.len(), 10);
    assert_eq!(schema.columns[3].name, "TABLE_TYPE");

    let rows = fetch_all(&gateway, &execution).await;
    assert_eq!(column(&rows, 2), vec![Some("customers"), Some("orders")]);
    assert_eq!(column(&rows, 3), vec![Some("TABLE"), Some("TABLE")]);

    let orders = &rows[1];
    assert_eq!(text(&orders[0]), Some(""));
    assert_eq!(text(&orders[1]), Some("sales"));
    assert_eq!(text(&orders[4]), Some("order facts"));
    assert!(orders[5 ..].iter().all(Value::is_null));
    assert_eq!(text(&rows[0][4]), Some(""));
}

#[tokio::test(flavor = "multi_thread")]
async fn get_tables_filters_types_case_insensitively() {
    let (gateway, session) = start(TableTypeMapping::Classic).await;
    let types = ["view"];
    let execution = gateway.get_tables(&session, None, None, None, Some(&types[..])).await.unwrap();
    let rows = fetch_all(&gateway, &execution).await;
    assert_eq!(column(&rows, 2), vec![Some("payroll_view"), Some("gview")]);
    assert!(column(&rows, 3).iter().all(|kind| *kind == Some("VIEW")));

    let empty: [&str; 0] = [];
    let execution = gateway.get_tables(&session, None, None, None, Some(&empty[..])).await.unwrap();
    assert_eq!(fetch_all(&gateway, &execution).await.len(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn temp_views_follow_the_schema_pattern() {
    let (gateway, session) = start(TableTypeMapping::Classic).await;
    let created = gateway
        .execute_statement(
            &session,
            "CREATE TEMPORARY VIEW recent AS SELECT * FROM sales.orders",
            false,
        )
        .await
        .unwrap();
    gateway.close_operation(&created).unwrap();

    let execution =
        gateway.get_tables(&session, None, Some("sales"), None, None).await.unwrap();
    let rows = fetch_all(&gateway, &execution).await;
    assert_eq!(column(&rows, 2), vec![Some("customers"), Some("orders"), Some("recent")]);
    assert_eq!(text(&rows[2][1]), None);
    assert_eq!(text(&rows[2][3]), Some("VIEW"));

    let execution =
        gateway.get_tables(&session, None, Some("global_temp"), None, None).await.unwrap();
    let rows = fetch_all(&gateway, &execution).await;
    assert_eq!(column(&rows, 2), vec![Some("gview"), Some("recent")]);
    assert_eq!(column(&rows, 1), vec![Some("global_temp"), None]);
}

#[tokio::test(flavor = "multi_thread")]
async fn hive_mapping_reports_catalog_names() {
    let (gateway, session) = start(TableTypeMapping::Hive).await;
    let types = ["MANAGED_TABLE"];
    let execution = gateway.get_tables(&session, None, None, None, Some(&types[..])).await.unwrap();
    let rows = fetch_all(&gateway, &execution).await;
    assert_eq!(column(&rows, 2), vec![Some("orders")]);
    assert_eq!(column(&rows, 3), vec![Some("MANAGED_TABLE")]);

    let execution = gateway.get_tables(&session, None, Some("hr"), None, None).await.unwrap();
    let rows = fetch_all(&gateway, &execution).await;
    assert_eq!(column(&rows, 3), vec![Some("VIRTUAL_VIEW")]);
}

// ============================================================================
// SECTION: Table Types
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn get_table_types_lists_distinct_names_per_mapping() {
    let (gateway, session) = start(TableTypeMapping::Classic).await;
    let execution = gateway.get_table_types(&session).await.unwrap();
    assert_eq!(
        column(&fetch_all(&gateway, &execution).await, 0),
        vec![Some("TABLE"), Some("VIEW"), Some("INDEX_TABLE"), Some("MATERIALIZED_VIEW")]
    );

    let (gateway, session) = start(TableTypeMapping::Hive).await;
    let execution = gateway.get_table_types(&session).await.unwrap();
    assert_eq!(
        column(&fetch_all(&gateway, &execution).await, 0),
        vec![
            Some("MANAGED_TABLE"),
            Some("EXTERNAL_TABLE"),
            Some("VIRTUAL_VIEW"),
            Some("INDEX_TABLE"),
            Some("MATERIALIZED_VIEW"),
        ]
    );
}

#[test]
fn mapping_names_select_classic_or_hive() {
    assert_eq!(TableTypeMapping::from_name("CLASSIC"), TableTypeMapping::Classic);
    assert_eq!(TableTypeMapping::from_name("classic"), TableTypeMapping::Classic);
    assert_eq!(TableTypeMapping::from_name("hive"), TableTypeMapping::Hive);
    assert_eq!(TableTypeMapping::from_name("anything"), TableTypeMapping::Hive);
    assert_eq!(TableTypeMapping::default(), TableTypeMapping::Classic);
}

#[tokio::test(flavor = "multi_thread")]
async fn listings_require_an_open_session() {
    let (gateway, _session) = start(TableTypeMapping::Classic).await;
    let ghost = SessionId::new("session-ghost");
    assert!(matches!(
        gateway.get_table_types(&ghost).await,
        Err(GatewayError::UnknownSession(_))
    ));
}

// ============================================================================
// SECTION: In-Memory Statements
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn in_memory_engine_serves_scans_and_session_settings() {
    let (gateway, session) = start(TableTypeMapping::Classic).await;

    let execution =
        gateway.execute_statement(&session, "SELECT * FROM sales.orders", false).await.unwrap();
    assert_eq!(fetch_all(&gateway, &execution).await.len(), 2);

    gateway.execute_statement(&session, "USE sales", false).await.unwrap();
    let execution = gateway.execute_statement(&session, "SELECT * FROM orders", true).await.unwrap();
    wait_finished(&gateway, &execution).await;
    assert_eq!(fetch_all(&gateway, &execution).await.len(), 2);

    gateway
        .execute_statement(&session, "SET querygate.scheduler.pool=etl", false)
        .await
        .unwrap();
    assert_eq!(gateway.sessions().active_pool(&session).unwrap().as_deref(), Some("etl"));

    let execution =
        gateway.execute_statement(&session, "SELECT 1 AS one, 'x', null", false).await.unwrap();
    let schema = gateway.result_schema(&execution).unwrap();
    let names: Vec<&str> = schema.columns.iter().map(|column| column.name.as_str()).collect();
    assert_eq!(names, vec!["one", "'x'", "null"]);
    let rows = fetch_all(&gateway, &execution).await;
    assert_eq!(rows, vec![vec![Value::Int(1), Value::String("x".to_string()), Value::Null]]);

    let err = gateway.execute_statement(&session, "DROP TABLE orders", false).await.unwrap_err();
    assert!(err.to_string().starts_with("ParseException"));
}

async fn wait_finished(gateway: &QueryGateway, execution: &ExecutionId) {
    for _ in 0 .. 1000 {
        let state = gateway.operation_status(execution).unwrap().state;
        if state != ExecutionState::Started && state != ExecutionState::Compiled {
            assert_eq!(state, ExecutionState::Finished);
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("execution {execution} did not finish");
}
