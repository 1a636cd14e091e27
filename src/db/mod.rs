//! Database abstraction layer for sql-warden.
//!
//! A [`DatabaseClient`] hands out one [`Session`] per logical operation. A
//! session is a transaction scope: it is committed or rolled back explicitly,
//! and a session dropped without either is rolled back by the backend.

pub mod catalog;
mod mock;
mod postgres;
mod types;

pub use catalog::Catalog;
pub use mock::{FailingDatabaseClient, MockDatabaseClient, MockEvent, MockReply};
pub use postgres::PostgresClient;
pub use types::{Record, Row, RowSet, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Access level requested for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAccess {
    /// The backend rejects any write inside the session.
    ReadOnly,
    ReadWrite,
}

/// Creates the database client for the given configuration.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
    let client = PostgresClient::connect(config).await?;
    Ok(Box::new(client))
}

/// Trait defining the interface for database clients.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Opens a new session with its own transaction.
    async fn begin(&self, access: SessionAccess) -> Result<Box<dyn Session>>;

    /// Catalog queries understood by this backend.
    fn catalog(&self) -> &'static Catalog {
        &catalog::POSTGRES
    }

    /// Closes the client and all pooled connections.
    async fn close(&self) -> Result<()>;
}

/// A transaction scope on a single connection.
///
/// Statements use the backend's positional placeholders.
#[async_trait]
pub trait Session: Send {
    /// Runs a statement and fetches every row with its column names.
    async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> Result<RowSet>;

    /// Runs a statement and returns the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}
