//! Query execution behind the security policy.
//!
//! Every statement is classified and authorized before a session is opened.
//! Permitted statements run inside their own session, which is committed on
//! write success and rolled back on every other path.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::SecurityConfig;
use crate::db::{DatabaseClient, Record, Session, SessionAccess, Value};
use crate::error::{Result, WardenError};
use crate::safety::{
    authorize_classified, authorize_forced_readonly, classify, SchemaProbe, SecurityMode,
};

/// Number of characters of a statement written to the query log.
const LOG_PREVIEW_CHARS: usize = 200;

/// Result of a permitted statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExecutionOutcome {
    /// Rows of a read-style statement, possibly truncated.
    Rows(RowsOutcome),
    /// Summary of a write-style statement.
    Affected(WriteSummary),
}

impl ExecutionOutcome {
    /// Returns the records of a read outcome.
    pub fn records(&self) -> Option<&[Record]> {
        match self {
            Self::Rows(rows) => Some(&rows.records),
            Self::Affected(_) => None,
        }
    }

    /// Returns the affected-row count of a write outcome.
    pub fn affected_rows(&self) -> Option<u64> {
        match self {
            Self::Rows(_) => None,
            Self::Affected(summary) => Some(summary.affected_rows),
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Rows(rows) if rows.truncated)
    }
}

/// Rows returned by a read-style statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowsOutcome {
    /// Column-keyed rows in the order the database returned them.
    pub records: Vec<Record>,
    /// Number of rows the database returned before the limit was applied.
    pub total_rows: usize,
    /// True if `records` was cut down to the row limit.
    pub truncated: bool,
}

impl RowsOutcome {
    /// Returns a notice for oversize results, or `None` if nothing was cut.
    pub fn truncation_notice(&self) -> Option<String> {
        self.truncated.then(|| {
            format!(
                "Result truncated: showing {} of {} rows",
                self.records.len(),
                self.total_rows
            )
        })
    }
}

/// Summary of a committed write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub affected_rows: u64,
    pub status: &'static str,
}

impl WriteSummary {
    fn success(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            status: "success",
        }
    }
}

/// Runs statements against the database under the configured policy.
#[derive(Clone)]
pub struct QueryExecutor {
    db: Arc<dyn DatabaseClient>,
    settings: SecurityConfig,
}

impl QueryExecutor {
    /// Creates an executor owning its security settings.
    pub fn new(db: Arc<dyn DatabaseClient>, settings: SecurityConfig) -> Self {
        Self { db, settings }
    }

    pub fn settings(&self) -> &SecurityConfig {
        &self.settings
    }

    pub fn database(&self) -> &dyn DatabaseClient {
        self.db.as_ref()
    }

    /// Runs a statement under the configured mode and row limit.
    pub async fn execute_query(
        &self,
        sql: &str,
        params: Option<&[Value]>,
    ) -> Result<ExecutionOutcome> {
        self.execute(
            sql,
            params,
            self.settings.security_mode,
            self.settings.max_result_rows,
        )
        .await
    }

    /// Classifies, authorizes and runs a statement.
    ///
    /// Denied statements fail with `PolicyViolation` before any session is
    /// opened. Read-style results longer than `row_limit` are truncated to
    /// their first `row_limit` rows.
    pub async fn execute(
        &self,
        sql: &str,
        params: Option<&[Value]>,
        mode: SecurityMode,
        row_limit: usize,
    ) -> Result<ExecutionOutcome> {
        let classification = classify(sql);
        let verdict = authorize_classified(&classification, mode);
        if !verdict.allowed {
            let reason = verdict.reason.unwrap_or_default();
            warn!(mode = %mode, keyword = %classification.keyword, "Statement denied: {}", reason);
            return Err(WardenError::policy(reason));
        }

        if self.settings.enable_query_log {
            info!(mode = %mode, "Executing query: {}", preview(sql));
        }

        let access = if mode.is_readonly() {
            SessionAccess::ReadOnly
        } else {
            SessionAccess::ReadWrite
        };
        let params = params.unwrap_or_default();
        let mut session = self.db.begin(access).await?;

        let result = if classification.returns_rows() {
            fetch_limited(session.as_mut(), sql, params, row_limit).await
        } else {
            apply_write(session.as_mut(), sql, params).await
        };

        if !matches!(result, Ok(ExecutionOutcome::Affected(_))) {
            release(session, &result).await;
        }
        result
    }

    /// Runs an internal catalog query as read-only, whatever the configured mode.
    ///
    /// The statement must pass the read-only policy and runs in a read-only
    /// session. Results are capped at `max_result_rows`.
    pub async fn execute_internal(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        let verdict = authorize_forced_readonly(sql);
        if !verdict.allowed {
            let reason = verdict.reason.unwrap_or_default();
            error!("Internal query rejected: {}", reason);
            return Err(WardenError::policy(format!(
                "internal queries must be read-only: {reason}"
            )));
        }

        let mut session = self.db.begin(SessionAccess::ReadOnly).await?;
        let result = fetch_limited(session.as_mut(), sql, params, self.settings.max_result_rows)
            .await
            .map(|outcome| match outcome {
                ExecutionOutcome::Rows(rows) => rows.records,
                ExecutionOutcome::Affected(_) => Vec::new(),
            });

        release(session, &result).await;
        result
    }

    /// Checks `name` against the configured schema visibility.
    pub async fn is_schema_allowed(&self, name: &str) -> bool {
        self.settings.allowed_schemas.is_schema_allowed(name, self).await
    }
}

#[async_trait]
impl SchemaProbe for QueryExecutor {
    async fn probe_schema(&self, name: &str) -> Result<bool> {
        let catalog = self.db.catalog();
        let rows = self
            .execute_internal(catalog.schema_probe, &[Value::from(name)])
            .await?;
        Ok(!rows.is_empty())
    }
}

async fn fetch_limited(
    session: &mut dyn Session,
    sql: &str,
    params: &[Value],
    row_limit: usize,
) -> Result<ExecutionOutcome> {
    let mut rows = session.fetch_all(sql, params).await?;
    let total_rows = rows.len();
    let truncated = total_rows > row_limit;
    if truncated {
        rows.truncate(row_limit);
    }

    let outcome = RowsOutcome {
        records: rows.into_records(),
        total_rows,
        truncated,
    };
    if let Some(notice) = outcome.truncation_notice() {
        warn!("{}", notice);
    }

    Ok(ExecutionOutcome::Rows(outcome))
}

async fn apply_write(
    session: &mut dyn Session,
    sql: &str,
    params: &[Value],
) -> Result<ExecutionOutcome> {
    let affected = session.execute(sql, params).await?;
    session.commit().await?;
    debug!("Committed write affecting {} rows", affected);
    Ok(ExecutionOutcome::Affected(WriteSummary::success(affected)))
}

/// Rolls back a session that did not commit. Reads end here as well as
/// failures.
async fn release<T>(mut session: Box<dyn Session>, result: &Result<T>) {
    if let Err(e) = result {
        debug!("Rolling back after error: {}", e);
    }
    if let Err(e) = session.rollback().await {
        warn!("Rollback failed: {}", e);
    }
}

fn preview(sql: &str) -> String {
    let trimmed = sql.trim();
    match trimmed.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
