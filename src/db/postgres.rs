//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using sqlx. Each session wraps one pooled
//! transaction; dropping an unfinished session rolls it back.

use crate::config::ConnectionConfig;
use crate::db::{DatabaseClient, Row, RowSet, Session, SessionAccess, Value};
use crate::error::{Result, WardenError};
use async_trait::async_trait;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgPool, PgPoolOptions, PgRow, PgTypeInfo};
use sqlx::query::Query;
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{BigDecimal, JsonValue, Uuid};
use sqlx::{Column as SqlxColumn, Postgres, Row as SqlxRow, Transaction, TypeInfo};
use std::time::Duration;
use tracing::{debug, warn};

/// Query timeout in seconds.
const QUERY_TIMEOUT_SECS: u64 = 30;

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Creates a new PostgresClient from an existing connection pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects with retries on transient failures.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;

        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;

        loop {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(10))
                .connect(&conn_str)
                .await;

            match result {
                Ok(pool) => {
                    debug!("Successfully connected to {}", config.display_string());
                    return Ok(Self { pool });
                }
                Err(e) if attempt < MAX_RETRY_ATTEMPTS && is_transient_error(&e) => {
                    warn!(
                        "Connection attempt {} failed (transient error), retrying in {:?}",
                        attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(map_connection_error(e, config)),
            }
        }
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn begin(&self, access: SessionAccess) -> Result<Box<dyn Session>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| WardenError::connection(e.to_string()))?;

        if access == SessionAccess::ReadOnly {
            sqlx::query("SET TRANSACTION READ ONLY")
                .execute(&mut *tx)
                .await
                .map_err(|e| WardenError::backend(format_query_error(e)))?;
        }
        debug!("Opened {:?} session", access);

        Ok(Box::new(PgSession { tx: Some(tx) }))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// A session backed by a pooled sqlx transaction.
struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| WardenError::internal("session already finished"))
    }
}

#[async_trait]
impl Session for PgSession {
    async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> Result<RowSet> {
        let tx = self.tx()?;
        let rows = with_timeout(bind_params(sqlx::query(sql), params).fetch_all(&mut **tx))
            .await?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| col.name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let rows = rows.iter().map(convert_row).collect::<Result<Vec<_>>>()?;
        Ok(RowSet::new(columns, rows))
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let tx = self.tx()?;
        let done = with_timeout(bind_params(sqlx::query(sql), params).execute(&mut **tx))
            .await?;
        Ok(done.rows_affected())
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit()
                .await
                .map_err(|e| WardenError::backend(format_query_error(e)))?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback()
                .await
                .map_err(|e| WardenError::backend(format_query_error(e)))?;
        }
        Ok(())
    }
}

/// Applies the statement timeout and maps driver errors.
async fn with_timeout<T>(
    fut: impl std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
) -> Result<T> {
    tokio::time::timeout(Duration::from_secs(QUERY_TIMEOUT_SECS), fut)
        .await
        .map_err(|_| {
            WardenError::backend(format!(
                "Query timed out after {QUERY_TIMEOUT_SECS} seconds"
            ))
        })?
        .map_err(|e| WardenError::backend(format_query_error(e)))
}

/// Binds positional parameters in order.
fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [Value],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            Value::Null => query.bind(UntypedNull),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::String(s) => query.bind(s.as_str()),
            Value::Bytes(b) => query.bind(b.as_slice()),
        };
    }
    query
}

/// A NULL parameter whose type the server infers from the statement.
struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        // OID 0 leaves the parameter type unspecified in the Parse message.
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl<'q> sqlx::Encode<'q, Postgres> for UntypedNull {
    fn encode_by_ref(
        &self,
        _buf: &mut PgArgumentBuffer,
    ) -> std::result::Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.name(), col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
///
/// Types without a native `Value` variant are rendered as text. A column that
/// cannot be decoded is an error, never a NULL.
fn convert_value(row: &PgRow, index: usize, column: &str, type_name: &str) -> Result<Value> {
    let decode_err = |e: sqlx::Error| {
        WardenError::backend(format!(
            "Cannot decode column '{column}' of type {type_name}: {e}. \
             Cast it to text in the query."
        ))
    };

    macro_rules! get {
        ($ty:ty) => {
            row.try_get::<Option<$ty>, _>(index).map_err(decode_err)?
        };
    }

    let value = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => get!(bool).map(Value::Bool),
        "INT2" | "SMALLINT" => get!(i16).map(|v| Value::Int(v.into())),
        "INT4" | "INT" | "INTEGER" => get!(i32).map(|v| Value::Int(v.into())),
        "INT8" | "BIGINT" => get!(i64).map(Value::Int),
        "OID" => get!(Oid).map(|v| Value::Int(v.0.into())),
        "FLOAT4" | "REAL" => get!(f32).map(|v| Value::Float(v.into())),
        "FLOAT8" | "DOUBLE PRECISION" => get!(f64).map(Value::Float),
        "BYTEA" => get!(Vec<u8>).map(Value::Bytes),
        "NUMERIC" => get!(BigDecimal).map(|v| Value::String(v.to_string())),
        "DATE" => get!(NaiveDate).map(|v| Value::String(v.to_string())),
        "TIME" => get!(NaiveTime).map(|v| Value::String(v.to_string())),
        "TIMESTAMP" => get!(NaiveDateTime).map(|v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => get!(DateTime<Utc>).map(|v| Value::String(v.to_rfc3339())),
        "UUID" => get!(Uuid).map(|v| Value::String(v.to_string())),
        "JSON" | "JSONB" => get!(JsonValue).map(|v| Value::String(v.to_string())),
        _ => get!(String).map(Value::String),
    };

    Ok(value.unwrap_or(Value::Null))
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    [
        "connection refused",
        "timed out",
        "timeout",
        "temporarily unavailable",
        "connection reset",
        "broken pipe",
    ]
    .iter()
    .any(|needle| error_str.contains(needle))
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> WardenError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        WardenError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("authentication failed") {
        WardenError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        WardenError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        WardenError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        WardenError::connection(error.to_string())
    }
}

/// Formats a statement error, keeping PostgreSQL detail and hint lines.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = format!("ERROR: {}", db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        let fields = [
            ("DETAIL", pg_error.detail()),
            ("HINT", pg_error.hint()),
            ("TABLE", pg_error.table()),
            ("COLUMN", pg_error.column()),
            ("CONSTRAINT", pg_error.constraint()),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                result.push_str(&format!("\n  {label}: {value}"));
            }
        }
    }

    result
}
