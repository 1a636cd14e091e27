//! Security modes and the allow/deny decision.
//!
//! Decisions are pure functions of the mode and the classified statement.
//! A denial carries its cause, and the reason text is rendered from that cause,
//! so the message always names the rule that actually fired.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{classify, Classification, OperationCategory};
use crate::error::WardenError;

/// Configured tier governing which statement categories may run.
///
/// Ordered by permissiveness: `ReadOnly < LimitedWrite < FullAccess`.
///
/// Configuration files accept the same spellings as `FromStr`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String")]
pub enum SecurityMode {
    /// Only read statements without embedded write clauses.
    #[default]
    #[serde(rename = "readonly")]
    ReadOnly,
    /// Reads plus INSERT and UPDATE.
    #[serde(rename = "limited_write")]
    LimitedWrite,
    /// Everything, with no scanning.
    #[serde(rename = "full_access")]
    FullAccess,
}

impl SecurityMode {
    /// Returns the mode as its configuration value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "readonly",
            Self::LimitedWrite => "limited_write",
            Self::FullAccess => "full_access",
        }
    }

    /// Returns a human-readable name used in denial messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ReadOnly => "read-only",
            Self::LimitedWrite => "limited-write",
            Self::FullAccess => "full-access",
        }
    }

    pub fn is_readonly(&self) -> bool {
        matches!(self, Self::ReadOnly)
    }

    pub fn allows_write(&self) -> bool {
        !self.is_readonly()
    }

    pub fn allows_dangerous(&self) -> bool {
        matches!(self, Self::FullAccess)
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SecurityMode {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "readonly" | "read_only" => Ok(Self::ReadOnly),
            "limited_write" => Ok(Self::LimitedWrite),
            "full_access" => Ok(Self::FullAccess),
            other => Err(WardenError::config(format!(
                "Invalid security mode '{other}'. Expected: readonly, limited_write, or full_access"
            ))),
        }
    }
}

impl TryFrom<String> for SecurityMode {
    type Error = WardenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Why a statement was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum Denial {
    /// A write statement under read-only mode.
    WriteForbidden { keyword: String },
    /// A dangerous statement under a mode that does not allow it.
    DangerousForbidden { mode: SecurityMode, keyword: String },
    /// A statement whose leading keyword is not recognized.
    Unsupported { mode: SecurityMode, keyword: String },
    /// A permitted keyword hiding a forbidden clause.
    EmbeddedClause {
        mode: SecurityMode,
        keyword: String,
        phrase: String,
    },
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteForbidden { keyword } => {
                write!(f, "write operation {keyword} is forbidden in read-only mode")
            }
            Self::DangerousForbidden { mode, keyword } => write!(
                f,
                "dangerous operation {keyword} is forbidden in {} mode",
                mode.label()
            ),
            Self::Unsupported { mode, keyword } if keyword.is_empty() => {
                write!(f, "empty statement is not supported in {} mode", mode.label())
            }
            Self::Unsupported { mode, keyword } => write!(
                f,
                "operation {keyword} is not recognized or not supported in {} mode",
                mode.label()
            ),
            Self::EmbeddedClause {
                mode,
                keyword,
                phrase,
            } => write!(
                f,
                "{keyword} statement contains forbidden clause '{phrase}' in {} mode",
                mode.label()
            ),
        }
    }
}

/// Outcome of a policy check. Denial is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(denial: &Denial) -> Self {
        Self {
            allowed: false,
            reason: Some(denial.to_string()),
        }
    }
}

/// Decides whether `sql` may run under `mode`.
pub fn authorize(sql: &str, mode: SecurityMode) -> ValidationResult {
    authorize_classified(&classify(sql), mode)
}

/// Evaluates as read-only regardless of the configured mode.
///
/// Used for every internal catalog lookup so internal tooling can never
/// exceed read-only privileges.
pub fn authorize_forced_readonly(sql: &str) -> ValidationResult {
    authorize(sql, SecurityMode::ReadOnly)
}

/// Decides on an already classified statement.
pub fn authorize_classified(
    classification: &Classification,
    mode: SecurityMode,
) -> ValidationResult {
    match decide(classification, mode) {
        Ok(()) => ValidationResult::allow(),
        Err(denial) => ValidationResult::deny(&denial),
    }
}

/// The mode table: one total function per mode.
pub(crate) fn decide(classification: &Classification, mode: SecurityMode) -> Result<(), Denial> {
    let keyword = || classification.keyword.clone();

    match (mode, classification.category) {
        (SecurityMode::FullAccess, _) => Ok(()),

        (SecurityMode::ReadOnly, OperationCategory::ReadOnly)
        | (
            SecurityMode::LimitedWrite,
            OperationCategory::ReadOnly | OperationCategory::Write,
        ) => match &classification.embedded {
            Some(clause) => Err(Denial::EmbeddedClause {
                mode,
                keyword: keyword(),
                phrase: clause.phrase.clone(),
            }),
            None => Ok(()),
        },

        (SecurityMode::ReadOnly, OperationCategory::Write) => {
            Err(Denial::WriteForbidden { keyword: keyword() })
        }
        (_, OperationCategory::Dangerous) => Err(Denial::DangerousForbidden {
            mode,
            keyword: keyword(),
        }),
        (_, OperationCategory::Unknown) => Err(Denial::Unsupported {
            mode,
            keyword: keyword(),
        }),
    }
}
