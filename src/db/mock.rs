//! Mock database clients for testing.
//!
//! `MockDatabaseClient` answers statements from scripted replies and records
//! every session event so tests can assert on transaction handling.
//! `FailingDatabaseClient` refuses every session.

use super::{DatabaseClient, RowSet, Session, SessionAccess, Value};
use crate::error::{Result, WardenError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

/// Scripted reply for statements matching a rule.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Result set for fetches; executes report its row count.
    Rows(RowSet),
    /// Affected-row count for executes; fetches return no rows.
    Affected(u64),
    /// The backend fails with this message.
    Fail(String),
}

/// Something that happened on a mock session.
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Begin(SessionAccess),
    Fetch { sql: String, params: Vec<Value> },
    Execute { sql: String, params: Vec<Value> },
    Commit,
    Rollback,
}

#[derive(Debug, Default)]
struct MockState {
    rules: Vec<(String, MockReply)>,
    events: Vec<MockEvent>,
}

impl MockState {
    fn reply_for(&self, sql: &str) -> Option<MockReply> {
        self.rules
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
    }
}

/// A mock database client that returns scripted results.
#[derive(Debug, Clone, Default)]
pub struct MockDatabaseClient {
    state: Arc<Mutex<MockState>>,
}

impl MockDatabaseClient {
    /// Creates a mock whose fetches return no rows and executes affect none.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reply for statements containing `needle`. Earlier rules win.
    pub fn on(self, needle: impl Into<String>, reply: MockReply) -> Self {
        self.state().rules.push((needle.into(), reply));
        self
    }

    /// Returns every recorded session event in order.
    pub fn events(&self) -> Vec<MockEvent> {
        self.state().events.clone()
    }

    /// Returns the SQL of every fetch and execute in order.
    pub fn statements(&self) -> Vec<String> {
        self.state()
            .events
            .iter()
            .filter_map(|event| match event {
                MockEvent::Fetch { sql, .. } | MockEvent::Execute { sql, .. } => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn begin(&self, access: SessionAccess) -> Result<Box<dyn Session>> {
        self.state().events.push(MockEvent::Begin(access));
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
            access,
        }))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct MockSession {
    state: Arc<Mutex<MockState>>,
    access: SessionAccess,
}

#[async_trait]
impl Session for MockSession {
    async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> Result<RowSet> {
        let mut state = lock(&self.state);
        state.events.push(MockEvent::Fetch {
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        match state.reply_for(sql) {
            Some(MockReply::Rows(rows)) => Ok(rows),
            Some(MockReply::Fail(msg)) => Err(WardenError::backend(msg)),
            Some(MockReply::Affected(_)) | None => Ok(RowSet::default()),
        }
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let mut state = lock(&self.state);
        state.events.push(MockEvent::Execute {
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        if self.access == SessionAccess::ReadOnly {
            return Err(WardenError::backend(
                "cannot execute statement in a read-only transaction",
            ));
        }

        match state.reply_for(sql) {
            Some(MockReply::Affected(n)) => Ok(n),
            Some(MockReply::Rows(rows)) => Ok(rows.len() as u64),
            Some(MockReply::Fail(msg)) => Err(WardenError::backend(msg)),
            None => Ok(0),
        }
    }

    async fn commit(&mut self) -> Result<()> {
        lock(&self.state).events.push(MockEvent::Commit);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        lock(&self.state).events.push(MockEvent::Rollback);
        Ok(())
    }
}

/// A client whose connections always fail.
#[derive(Debug, Clone)]
pub struct FailingDatabaseClient {
    message: String,
}

impl FailingDatabaseClient {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for FailingDatabaseClient {
    fn default() -> Self {
        Self::new("connection refused")
    }
}

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    async fn begin(&self, _access: SessionAccess) -> Result<Box<dyn Session>> {
        Err(WardenError::connection(self.message.clone()))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
