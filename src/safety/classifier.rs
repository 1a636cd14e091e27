//! Lexical SQL classification.
//!
//! Extracts the leading keyword of a statement and scans the upper-cased text
//! for write or dangerous clauses hidden behind a less privileged keyword.
//! Matching is done on word boundaries so identifiers such as `DROPOUT_RATE`
//! or `CREATED_AT` never trigger a match.

use std::sync::LazyLock;

use regex::Regex;

use super::{Classification, EmbeddedClause, OperationCategory};

/// Leading keywords of statements that only read data.
pub const READ_ONLY_KEYWORDS: &[&str] =
    &["SELECT", "WITH", "SHOW", "DESCRIBE", "EXPLAIN", "ANALYZE"];

/// Leading keywords of statements that modify rows.
pub const WRITE_KEYWORDS: &[&str] = &["INSERT", "UPDATE"];

/// Leading keywords of statements that delete data or change structure or grants.
pub const DANGEROUS_KEYWORDS: &[&str] = &[
    "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE",
];

/// A phrase matcher and the category of the operation it detects.
struct ClausePattern {
    regex: Regex,
    category: OperationCategory,
}

impl ClausePattern {
    fn new(pattern: &str, category: OperationCategory) -> Self {
        Self {
            regex: Regex::new(pattern).expect("clause pattern is a valid regex"),
            category,
        }
    }
}

/// Clause patterns checked inside SELECT statements. Dangerous patterns come
/// first so a statement embedding both kinds reports the dangerous one.
static SELECT_PATTERNS: LazyLock<Vec<ClausePattern>> = LazyLock::new(|| {
    use OperationCategory::{Dangerous, Write};
    vec![
        ClausePattern::new(r"\bDROP\s+TABLE\b", Dangerous),
        ClausePattern::new(r"\bTRUNCATE\s+TABLE\b", Dangerous),
        ClausePattern::new(r"\bDELETE\s+FROM\b", Dangerous),
        ClausePattern::new(r"\bCREATE\s+TABLE\b", Dangerous),
        ClausePattern::new(r"\bALTER\s+TABLE\b", Dangerous),
        ClausePattern::new(
            r";\s*(?:DELETE|DROP|CREATE|ALTER|TRUNCATE|GRANT|REVOKE)\b",
            Dangerous,
        ),
        ClausePattern::new(r"\bINSERT\s+INTO\b", Write),
        ClausePattern::new(r#"\bUPDATE\s+[\w."]+\s+SET\b"#, Write),
        ClausePattern::new(r";\s*(?:INSERT|UPDATE)\b", Write),
    ]
});

/// Classifies a SQL string.
///
/// Never fails: blank or unrecognized input yields an `Unknown` category,
/// which every mode except full access denies.
pub fn classify(sql: &str) -> Classification {
    let normalized = sql.trim().to_uppercase();
    let keyword = normalized
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();
    let category = OperationCategory::of_keyword(&keyword);

    let embedded = match category {
        OperationCategory::ReadOnly if keyword == "SELECT" => {
            scan_patterns(&normalized, |_| true)
        }
        OperationCategory::ReadOnly => scan_tokens(&normalized),
        OperationCategory::Write => {
            scan_patterns(&normalized, |p| p.category == OperationCategory::Dangerous)
        }
        OperationCategory::Dangerous | OperationCategory::Unknown => None,
    };

    Classification {
        keyword,
        category,
        embedded,
    }
}

/// Returns the first pattern match among the selected patterns.
fn scan_patterns(
    normalized: &str,
    select: impl Fn(&ClausePattern) -> bool,
) -> Option<EmbeddedClause> {
    SELECT_PATTERNS
        .iter()
        .filter(|p| select(p))
        .find_map(|p| {
            p.regex.find(normalized).map(|m| EmbeddedClause {
                phrase: collapse_whitespace(m.as_str()),
                category: p.category,
            })
        })
}

/// Token scan for non-SELECT read statements: any write or dangerous keyword
/// appearing as a whole token is a violation.
fn scan_tokens(normalized: &str) -> Option<EmbeddedClause> {
    normalized
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
        .find_map(|token| match OperationCategory::of_keyword(token) {
            category @ (OperationCategory::Write | OperationCategory::Dangerous) => {
                Some(EmbeddedClause {
                    phrase: token.to_string(),
                    category,
                })
            }
            _ => None,
        })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
