//! Catalog introspection through the executor.
//!
//! Every operation that takes a schema checks it against the configured
//! visibility first. Catalog queries always go through the forced read-only
//! path.

use serde::Serialize;
use tracing::warn;

use super::QueryExecutor;
use crate::config::SecurityConfig;
use crate::db::{Record, Value};
use crate::error::{Result, WardenError};

/// Summary of the active security configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityInfo {
    pub security_mode: String,
    pub allowed_schemas: String,
    pub readonly_mode: bool,
    pub write_allowed: bool,
    pub dangerous_operations_allowed: bool,
    pub max_result_rows: usize,
    pub query_log_enabled: bool,
}

impl QueryExecutor {
    /// Fails with `SchemaNotPermitted` unless `schema` is visible.
    pub async fn ensure_schema_allowed(&self, schema: &str) -> Result<()> {
        if self.is_schema_allowed(schema).await {
            Ok(())
        } else {
            let policy = self.settings().allowed_schemas.describe_policy();
            warn!(schema, policy = %policy, "Schema access denied");
            Err(WardenError::schema_not_permitted(schema, policy))
        }
    }

    /// Lists the tables of a schema.
    pub async fn list_tables(&self, schema: &str) -> Result<Vec<Record>> {
        self.ensure_schema_allowed(schema).await?;
        let sql = self.database().catalog().list_tables;
        self.execute_internal(sql, &[Value::from(schema)]).await
    }

    /// Describes the columns of a table in ordinal order.
    pub async fn table_structure(&self, table: &str, schema: &str) -> Result<Vec<Record>> {
        self.ensure_schema_allowed(schema).await?;
        let sql = self.database().catalog().table_columns;
        self.execute_internal(sql, &table_params(table, schema)).await
    }

    /// Lists the indexes of a table. Backend failures yield an empty list.
    pub async fn table_indexes(&self, table: &str, schema: &str) -> Result<Vec<Record>> {
        self.ensure_schema_allowed(schema).await?;
        let sql = self.database().catalog().table_indexes;
        let result = self.execute_internal(sql, &table_params(table, schema)).await;
        degrade_to_empty(result, "indexes", table)
    }

    /// Lists the constraints of a table. Backend failures yield an empty list.
    pub async fn table_constraints(&self, table: &str, schema: &str) -> Result<Vec<Record>> {
        self.ensure_schema_allowed(schema).await?;
        let sql = self.database().catalog().table_constraints;
        let result = self.execute_internal(sql, &table_params(table, schema)).await;
        degrade_to_empty(result, "constraints", table)
    }

    /// Lists the names of all non-system schemas.
    pub async fn available_schemas(&self) -> Result<Vec<String>> {
        let sql = self.database().catalog().list_schemas;
        let records = self.execute_internal(sql, &[]).await?;
        Ok(records
            .iter()
            .filter_map(|record| record.get_str("schemaname").map(str::to_string))
            .collect())
    }

    /// Returns true if the database answers a trivial query.
    pub async fn test_connection(&self) -> bool {
        let sql = self.database().catalog().ping;
        match self.execute_internal(sql, &[]).await {
            Ok(records) => records
                .first()
                .and_then(|record| record.get("test_connection"))
                .and_then(Value::as_i64)
                == Some(1),
            Err(e) => {
                warn!("Connection test failed: {}", e);
                false
            }
        }
    }

    /// Summarizes the active security configuration.
    pub fn security_info(&self) -> SecurityInfo {
        SecurityInfo::from_settings(self.settings())
    }
}

impl SecurityInfo {
    pub fn from_settings(settings: &SecurityConfig) -> Self {
        let mode = settings.security_mode;
        Self {
            security_mode: mode.as_str().to_string(),
            allowed_schemas: settings.allowed_schemas.describe_policy(),
            readonly_mode: mode.is_readonly(),
            write_allowed: mode.allows_write(),
            dangerous_operations_allowed: mode.allows_dangerous(),
            max_result_rows: settings.max_result_rows,
            query_log_enabled: settings.enable_query_log,
        }
    }
}

fn table_params(table: &str, schema: &str) -> [Value; 2] {
    [Value::from(table), Value::from(schema)]
}

/// Missing index or constraint metadata is an acceptable partial result.
fn degrade_to_empty(result: Result<Vec<Record>>, what: &str, table: &str) -> Result<Vec<Record>> {
    match result {
        Err(e) if e.is_backend() => {
            warn!("Could not read {} for table {}: {}", what, table, e);
            Ok(Vec::new())
        }
        other => other,
    }
}
