//! Schema visibility strategies.
//!
//! `AllSchemas` and `Explicit` answer without I/O. `AutoDiscover` asks a
//! [`SchemaProbe`] and fails closed: any probe error means "not allowed".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

use crate::error::{Result, WardenError};

/// Configuration literal selecting every schema.
pub const WILDCARD: &str = "*";

/// Configuration literal selecting probe-based discovery.
pub const AUTO_DISCOVER: &str = "auto";

/// Configured policy for which schemas may be inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemaList", into = "SchemaList")]
pub enum SchemaVisibility {
    AllSchemas,
    AutoDiscover,
    /// Case-sensitive set of permitted schema names.
    Explicit(BTreeSet<String>),
}

impl Default for SchemaVisibility {
    fn default() -> Self {
        Self::Explicit(BTreeSet::from(["public".to_string()]))
    }
}

/// Checks whether a schema exists and is visible to the connected principal.
#[async_trait]
pub trait SchemaProbe: Send + Sync {
    async fn probe_schema(&self, name: &str) -> Result<bool>;
}

impl SchemaVisibility {
    /// Parses `"*"`, `"auto"`, or a comma-separated list of names.
    pub fn parse(raw: &str) -> Result<Self> {
        Self::from_names(raw.split(','))
    }

    /// Builds a strategy from a list of entries. A single `"*"` or `"auto"`
    /// entry selects the corresponding strategy.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        match names.as_slice() {
            [] => Err(WardenError::config(
                "allowed_schemas must name at least one schema, '*' or 'auto'",
            )),
            [only] if only == WILDCARD => Ok(Self::AllSchemas),
            [only] if only.eq_ignore_ascii_case(AUTO_DISCOVER) => Ok(Self::AutoDiscover),
            _ if names.iter().any(|n| n == WILDCARD) => Err(WardenError::config(
                "'*' cannot be combined with explicit schema names",
            )),
            _ => Ok(Self::Explicit(names.into_iter().collect())),
        }
    }

    /// Decides whether `name` may be accessed.
    ///
    /// Never returns an error: probe failures are logged and denied.
    pub async fn is_schema_allowed(&self, name: &str, probe: &dyn SchemaProbe) -> bool {
        match self {
            Self::AllSchemas => true,
            Self::Explicit(names) => names.contains(name),
            Self::AutoDiscover => match probe.probe_schema(name).await {
                Ok(found) => found,
                Err(e) => {
                    warn!("Schema probe for '{}' failed, denying access: {}", name, e);
                    false
                }
            },
        }
    }

    /// Describes the active strategy for diagnostics and denial messages.
    pub fn describe_policy(&self) -> String {
        match self {
            Self::AllSchemas => "all schemas (*)".to_string(),
            Self::AutoDiscover => "auto-discovered (auto)".to_string(),
            Self::Explicit(names) => format!(
                "[{}]",
                names.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

/// Wire form of [`SchemaVisibility`]: a single string or a list of names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaList {
    One(String),
    Many(Vec<String>),
}

impl TryFrom<SchemaList> for SchemaVisibility {
    type Error = WardenError;

    fn try_from(list: SchemaList) -> Result<Self> {
        match list {
            SchemaList::One(raw) => Self::parse(&raw),
            SchemaList::Many(names) => Self::from_names(names),
        }
    }
}

impl From<SchemaVisibility> for SchemaList {
    fn from(visibility: SchemaVisibility) -> Self {
        match visibility {
            SchemaVisibility::AllSchemas => SchemaList::One(WILDCARD.to_string()),
            SchemaVisibility::AutoDiscover => SchemaList::One(AUTO_DISCOVER.to_string()),
            SchemaVisibility::Explicit(names) => SchemaList::Many(names.into_iter().collect()),
        }
    }
}
