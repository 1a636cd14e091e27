//! Error types for sql-warden.
//!
//! Denials are ordinary outcomes of the policy layer. They only become errors
//! once an operation that requires permission is refused.

use thiserror::Error;

/// Main error type for sql-warden operations.
#[derive(Error, Debug)]
pub enum WardenError {
    /// The statement was refused by the active security mode.
    #[error("SQL operation forbidden by security policy: {0}")]
    PolicyViolation(String),

    /// The schema is outside the configured visibility strategy.
    #[error("Access to schema '{schema}' is not permitted (allowed schemas: {policy})")]
    SchemaNotPermitted { schema: String, policy: String },

    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement failures reported by the database (syntax, constraints, etc.)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Configuration errors (invalid config file, bad environment values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WardenError {
    /// Creates a policy violation with the given denial reason.
    pub fn policy(reason: impl Into<String>) -> Self {
        Self::PolicyViolation(reason.into())
    }

    /// Creates a schema denial naming the active visibility strategy.
    pub fn schema_not_permitted(schema: impl Into<String>, policy: impl Into<String>) -> Self {
        Self::SchemaNotPermitted {
            schema: schema.into(),
            policy: policy.into(),
        }
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a backend error with the given message.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true for refusals issued by the policy layer.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::PolicyViolation(_) | Self::SchemaNotPermitted { .. }
        )
    }

    /// Returns true when the database collaborator failed.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Backend(_))
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::PolicyViolation(_) => "Policy Violation",
            Self::SchemaNotPermitted { .. } => "Schema Not Permitted",
            Self::Connection(_) => "Connection Error",
            Self::Backend(_) => "Backend Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using WardenError.
pub type Result<T> = std::result::Result<T, WardenError>;
