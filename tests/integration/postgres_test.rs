//! End-to-end tests against a live PostgreSQL database.
//!
//! Skipped unless DATABASE_URL is set.

use std::sync::Arc;

use sql_warden::config::{ConnectionConfig, SecurityConfig};
use sql_warden::db::{self, Value};
use sql_warden::error::WardenError;
use sql_warden::query::QueryExecutor;
use sql_warden::safety::{SchemaVisibility, SecurityMode};

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to create an executor over a live connection.
async fn get_test_executor(settings: SecurityConfig) -> Option<QueryExecutor> {
    let url = get_test_database_url()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    let client = db::connect(&config).await.ok()?;
    Some(QueryExecutor::new(Arc::from(client), settings))
}

#[tokio::test]
async fn test_ping_and_schemas() {
    let Some(executor) = get_test_executor(SecurityConfig::default()).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    assert!(executor.test_connection().await);
    let schemas = executor.available_schemas().await.unwrap();
    assert!(schemas.iter().any(|s| s == "public"));
    assert!(!schemas.iter().any(|s| s.starts_with("pg_")));
}

#[tokio::test]
async fn test_row_limit_on_generated_series() {
    let settings = SecurityConfig {
        max_result_rows: 10,
        ..SecurityConfig::default()
    };
    let Some(executor) = get_test_executor(settings).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let params = [Value::Int(25)];
    let outcome = executor
        .execute_query(
            "SELECT n::int8 AS N FROM generate_series(1, $1::int8) AS n ORDER BY n",
            Some(&params[..]),
        )
        .await
        .unwrap();

    let records = outcome.records().unwrap();
    assert_eq!(records.len(), 10);
    assert_eq!(records[0].get("n"), Some(&Value::Int(1)));
    assert_eq!(records[9].get("N"), Some(&Value::Int(10)));
    assert!(outcome.is_truncated());
}

#[tokio::test]
async fn test_read_only_mode_blocks_writes_at_both_layers() {
    let Some(executor) = get_test_executor(SecurityConfig::default()).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = executor
        .execute_query("CREATE TEMP TABLE warden_probe (id int)", None)
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::PolicyViolation(_)));

    // Passes the classifier, rejected by the read-only transaction.
    let err = executor
        .execute_query("SELECT relname FROM pg_catalog.pg_class LIMIT 1 FOR UPDATE", None)
        .await
        .unwrap_err();
    assert!(err.is_backend());
}

#[tokio::test]
async fn test_write_modes_round_trip() {
    let settings = SecurityConfig {
        security_mode: SecurityMode::FullAccess,
        allowed_schemas: SchemaVisibility::AutoDiscover,
        ..SecurityConfig::default()
    };
    let Some(executor) = get_test_executor(settings).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    executor
        .execute_query("CREATE TABLE IF NOT EXISTS warden_it_items (id int8)", None)
        .await
        .unwrap();

    let params = [Value::Int(1), Value::Int(2)];
    let inserted = executor
        .execute(
            "INSERT INTO warden_it_items (id) VALUES ($1), ($2)",
            Some(&params[..]),
            SecurityMode::LimitedWrite,
            10,
        )
        .await
        .unwrap();
    assert_eq!(inserted.affected_rows(), Some(2));

    let denied = executor
        .execute("DROP TABLE warden_it_items", None, SecurityMode::LimitedWrite, 10)
        .await;
    assert!(matches!(denied, Err(WardenError::PolicyViolation(_))));

    assert!(executor.is_schema_allowed("public").await);
    assert!(!executor.is_schema_allowed("warden_no_such_schema").await);

    executor
        .execute_query("DROP TABLE warden_it_items", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_describe_missing_table_degrades_metadata() {
    let settings = SecurityConfig {
        allowed_schemas: SchemaVisibility::AllSchemas,
        ..SecurityConfig::default()
    };
    let Some(executor) = get_test_executor(settings).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let columns = executor
        .table_structure("warden_no_such_table", "public")
        .await
        .unwrap();
    assert!(columns.is_empty());
    assert!(executor
        .table_indexes("warden_no_such_table", "public")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_non_native_types_decode_as_text() {
    let Some(executor) = get_test_executor(SecurityConfig::default()).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let outcome = executor
        .execute_query(
            r#"SELECT
                12.50::numeric AS price,
                DATE '2024-01-02' AS d,
                TIMESTAMP '2024-01-02 03:04:05' AS ts,
                TIMESTAMPTZ '2024-01-02 03:04:05+00' AS tstz,
                '4a5e3c1e-8f2b-4c3d-9e1f-0a1b2c3d4e5f'::uuid AS id,
                '{"a":1}'::jsonb AS j,
                NULL::numeric AS missing"#,
            None,
        )
        .await
        .unwrap();

    let records = outcome.records().unwrap();
    assert_eq!(
        serde_json::to_value(&records[0]).unwrap(),
        serde_json::json!({
            "price": "12.50",
            "d": "2024-01-02",
            "ts": "2024-01-02 03:04:05",
            "tstz": "2024-01-02T03:04:05+00:00",
            "id": "4a5e3c1e-8f2b-4c3d-9e1f-0a1b2c3d4e5f",
            "j": "{\"a\":1}",
            "missing": null,
        })
    );
}

#[tokio::test]
async fn test_undecodable_column_is_an_error() {
    let Some(executor) = get_test_executor(SecurityConfig::default()).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = executor
        .execute_query("SELECT '1 day'::interval AS span", None)
        .await
        .unwrap_err();
    assert!(err.is_backend());
    assert!(err.to_string().contains("Cannot decode column 'span'"));

    let outcome = executor
        .execute_query("SELECT '1 day'::interval::text AS span", None)
        .await
        .unwrap();
    assert_eq!(
        outcome.records().unwrap()[0].get("span"),
        Some(&Value::from("1 day"))
    );
}

#[tokio::test]
async fn test_null_parameters_take_the_column_type() {
    let settings = SecurityConfig {
        security_mode: SecurityMode::FullAccess,
        ..SecurityConfig::default()
    };
    let Some(executor) = get_test_executor(settings).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    executor
        .execute_query("DROP TABLE IF EXISTS warden_it_nulls", None)
        .await
        .unwrap();
    executor
        .execute_query("CREATE TABLE warden_it_nulls (id int8, n int4)", None)
        .await
        .unwrap();

    let params = [Value::Int(1), Value::Null];
    let inserted = executor
        .execute_query(
            "INSERT INTO warden_it_nulls (id, n) VALUES ($1, $2)",
            Some(&params[..]),
        )
        .await
        .unwrap();
    assert_eq!(inserted.affected_rows(), Some(1));

    let params = [Value::Null];
    let matched = executor
        .execute_query("SELECT id FROM warden_it_nulls WHERE n = $1", Some(&params[..]))
        .await
        .unwrap();
    assert!(matched.records().unwrap().is_empty());

    let stored = executor
        .execute_query("SELECT id, n FROM warden_it_nulls", None)
        .await
        .unwrap();
    let records = stored.records().unwrap();
    assert_eq!(records[0].get("id"), Some(&Value::Int(1)));
    assert_eq!(records[0].get("n"), Some(&Value::Null));

    executor
        .execute_query("DROP TABLE warden_it_nulls", None)
        .await
        .unwrap();
}
