//! Query safety classification and access policy.
//!
//! Classifies SQL by its leading keyword and embedded clauses, then decides
//! whether a statement may run under the configured security mode and whether
//! a schema may be inspected.

mod classifier;
mod policy;
mod schema;

pub use classifier::{classify, DANGEROUS_KEYWORDS, READ_ONLY_KEYWORDS, WRITE_KEYWORDS};
pub use policy::{
    authorize, authorize_classified, authorize_forced_readonly, Denial, SecurityMode,
    ValidationResult,
};
pub use schema::{SchemaList, SchemaProbe, SchemaVisibility};

use serde::Serialize;
use std::fmt;

/// Operation class derived from a statement's leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationCategory {
    /// SELECT, WITH, SHOW, DESCRIBE, EXPLAIN, ANALYZE.
    ReadOnly,
    /// INSERT, UPDATE.
    Write,
    /// DELETE, DROP, CREATE, ALTER, TRUNCATE, GRANT, REVOKE.
    Dangerous,
    /// Anything else, including blank input.
    Unknown,
}

impl OperationCategory {
    /// Looks up the category of an upper-cased keyword.
    pub fn of_keyword(keyword: &str) -> Self {
        if READ_ONLY_KEYWORDS.contains(&keyword) {
            Self::ReadOnly
        } else if WRITE_KEYWORDS.contains(&keyword) {
            Self::Write
        } else if DANGEROUS_KEYWORDS.contains(&keyword) {
            Self::Dangerous
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read-only"),
            Self::Write => write!(f, "write"),
            Self::Dangerous => write!(f, "dangerous"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A write or dangerous clause found inside a statement whose leading
/// keyword is less privileged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddedClause {
    /// The matched text, upper-cased with whitespace collapsed.
    pub phrase: String,
    /// Category of the operation the clause performs.
    pub category: OperationCategory,
}

/// Result of classifying a SQL string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Leading keyword, upper-cased. Empty for blank input.
    pub keyword: String,
    /// Category of the leading keyword.
    pub category: OperationCategory,
    /// First forbidden clause found by the embedded scan, if any.
    pub embedded: Option<EmbeddedClause>,
}

impl Classification {
    /// Returns the `(keyword, category)` pair.
    pub fn parts(&self) -> (&str, OperationCategory) {
        (&self.keyword, self.category)
    }

    /// Returns true if the statement produces a result set to fetch.
    pub fn returns_rows(&self) -> bool {
        matches!(
            self.keyword.as_str(),
            "SELECT" | "WITH" | "SHOW" | "DESCRIBE" | "EXPLAIN" | "ANALYZE"
        )
    }
}
