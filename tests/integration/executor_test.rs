//! Query executor tests against the scripted mock backend.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use sql_warden::config::SecurityConfig;
use sql_warden::db::{
    FailingDatabaseClient, MockDatabaseClient, MockEvent, MockReply, RowSet, SessionAccess, Value,
};
use sql_warden::error::WardenError;
use sql_warden::query::{ExecutionOutcome, QueryExecutor};
use sql_warden::safety::SecurityMode;

fn rows(count: i64) -> RowSet {
    RowSet::new(
        vec!["ID".to_string(), "Label".to_string()],
        (1..=count)
            .map(|n| vec![Value::Int(n), Value::from(format!("row-{n}"))])
            .collect(),
    )
}

fn executor(mock: &MockDatabaseClient, mode: SecurityMode, max_rows: usize) -> QueryExecutor {
    let settings = SecurityConfig {
        security_mode: mode,
        max_result_rows: max_rows,
        ..SecurityConfig::default()
    };
    QueryExecutor::new(Arc::new(mock.clone()), settings)
}

fn ids(outcome: &ExecutionOutcome) -> Vec<i64> {
    outcome
        .records()
        .unwrap_or_default()
        .iter()
        .filter_map(|record| record.get("id").and_then(Value::as_i64))
        .collect()
}

#[tokio::test]
async fn test_oversize_result_keeps_first_rows_in_order() {
    let mock = MockDatabaseClient::new().on("FROM items", MockReply::Rows(rows(12)));
    let executor = executor(&mock, SecurityMode::ReadOnly, 5);

    let outcome = executor
        .execute_query("SELECT id, label FROM items", None)
        .await
        .unwrap();

    assert_eq!(ids(&outcome), vec![1, 2, 3, 4, 5]);
    assert!(outcome.is_truncated());
    let ExecutionOutcome::Rows(rows) = &outcome else {
        panic!("expected rows");
    };
    assert_eq!(rows.total_rows, 12);
    assert!(rows.truncation_notice().is_some());
}

#[tokio::test]
async fn test_result_within_limit_is_untouched() {
    for count in [0, 4, 5] {
        let mock = MockDatabaseClient::new().on("FROM items", MockReply::Rows(rows(count)));
        let executor = executor(&mock, SecurityMode::ReadOnly, 5);

        let outcome = executor
            .execute_query("SELECT id, label FROM items", None)
            .await
            .unwrap();

        assert_eq!(ids(&outcome), (1..=count).collect::<Vec<_>>());
        assert!(!outcome.is_truncated());
    }
}

#[tokio::test]
async fn test_explicit_row_limit_overrides_configured_limit() {
    let mock = MockDatabaseClient::new().on("FROM items", MockReply::Rows(rows(10)));
    let executor = executor(&mock, SecurityMode::ReadOnly, 1000);

    let outcome = executor
        .execute("SELECT * FROM items", None, SecurityMode::ReadOnly, 2)
        .await
        .unwrap();
    assert_eq!(ids(&outcome), vec![1, 2]);
}

#[tokio::test]
async fn test_rows_keep_column_order_with_lowercase_keys() {
    let mock = MockDatabaseClient::new().on("FROM items", MockReply::Rows(rows(1)));
    let executor = executor(&mock, SecurityMode::ReadOnly, 10);

    let outcome = executor
        .execute_query("SELECT ID, Label FROM items", None)
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        serde_json::json!({
            "records": [{"id": 1, "label": "row-1"}],
            "total_rows": 1,
            "truncated": false,
        })
    );
}

#[tokio::test]
async fn test_write_never_truncates_and_commits() {
    let mock = MockDatabaseClient::new().on("UPDATE", MockReply::Affected(5000));
    let executor = executor(&mock, SecurityMode::LimitedWrite, 10);

    let params = [Value::Bool(false), Value::Int(3)];
    let outcome = executor
        .execute_query("UPDATE items SET active = $1 WHERE id > $2", Some(&params[..]))
        .await
        .unwrap();

    assert_eq!(outcome.affected_rows(), Some(5000));
    assert_eq!(
        mock.events(),
        vec![
            MockEvent::Begin(SessionAccess::ReadWrite),
            MockEvent::Execute {
                sql: "UPDATE items SET active = $1 WHERE id > $2".to_string(),
                params: params.to_vec(),
            },
            MockEvent::Commit,
        ]
    );
}

#[tokio::test]
async fn test_mode_argument_overrides_configured_mode() {
    let mock = MockDatabaseClient::new();
    let executor = executor(&mock, SecurityMode::FullAccess, 10);

    let err = executor
        .execute("DROP TABLE items", None, SecurityMode::LimitedWrite, 10)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "SQL operation forbidden by security policy: dangerous operation DROP is forbidden in limited-write mode"
    );
    assert!(err.is_denial());
    assert!(mock.events().is_empty());

    let outcome = executor
        .execute("DROP TABLE items", None, SecurityMode::FullAccess, 10)
        .await
        .unwrap();
    assert_eq!(outcome.affected_rows(), Some(0));
}

#[tokio::test]
async fn test_denied_statements_never_reach_database() {
    let mock = MockDatabaseClient::new();
    let executor = executor(&mock, SecurityMode::ReadOnly, 10);

    for sql in [
        "INSERT INTO items VALUES (1)",
        "SELECT * FROM items; DELETE FROM items",
        "SHOW x; TRUNCATE items",
        "",
        "CALL refresh()",
    ] {
        let result = executor.execute_query(sql, None).await;
        assert!(
            matches!(result, Err(WardenError::PolicyViolation(_))),
            "{sql:?} was not denied"
        );
    }
    assert!(mock.statements().is_empty());
}

#[tokio::test]
async fn test_backend_error_propagates_verbatim() {
    let mock = MockDatabaseClient::new().on(
        "missing",
        MockReply::Fail("ERROR: relation \"missing\" does not exist".to_string()),
    );
    let executor = executor(&mock, SecurityMode::ReadOnly, 10);

    let err = executor
        .execute_query("SELECT * FROM missing", None)
        .await
        .unwrap_err();

    assert!(err.is_backend());
    assert_eq!(
        err.to_string(),
        "Backend error: ERROR: relation \"missing\" does not exist"
    );
    assert_eq!(mock.events().last(), Some(&MockEvent::Rollback));
}

#[tokio::test]
async fn test_connection_failure_propagates() {
    let executor = QueryExecutor::new(
        Arc::new(FailingDatabaseClient::default()),
        SecurityConfig::default(),
    );

    let err = executor.execute_query("SELECT 1", None).await.unwrap_err();
    assert!(matches!(err, WardenError::Connection(_)));
    assert!(!executor.test_connection().await);
}

#[tokio::test]
async fn test_sessions_are_not_shared_between_calls() {
    let mock = MockDatabaseClient::new();
    let executor = executor(&mock, SecurityMode::ReadOnly, 10);

    let (a, b) = tokio::join!(
        executor.execute_query("SELECT 1", None),
        executor.execute_query("SELECT 2", None),
    );
    a.unwrap();
    b.unwrap();

    let events = mock.events();
    let begins = events
        .iter()
        .filter(|e| matches!(e, MockEvent::Begin(_)))
        .count();
    let rollbacks = events
        .iter()
        .filter(|e| matches!(e, MockEvent::Rollback))
        .count();
    assert_eq!((begins, rollbacks), (2, 2));
}
