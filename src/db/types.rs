//! Row and value types exchanged with the database backend.
//!
//! Backends hand back a [`RowSet`] with column names exactly as the driver
//! reported them. [`RowSet::into_records`] is the single place where names are
//! case-normalized; everything downstream works with [`Record`]s. Names that
//! collide after lower-casing get a numeric suffix (`a`, `a_2`), so record keys
//! are always unique.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Raw result set as returned by a backend session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Column names in result order.
    pub columns: Vec<String>,

    /// Rows of data, each with one value per column.
    pub rows: Vec<Row>,
}

impl RowSet {
    /// Creates a result set with the given columns and rows.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keeps only the first `limit` rows, preserving order.
    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }

    /// Converts rows into column-keyed records with lower-cased, unique keys.
    pub fn into_records(self) -> Vec<Record> {
        let keys = normalize_keys(self.columns.iter().map(String::as_str));
        self.rows
            .into_iter()
            .map(|row| Record {
                fields: keys.iter().cloned().zip(row).collect(),
            })
            .collect()
    }
}

/// Lower-cases column names, suffixing repeats until every key is unique.
fn normalize_keys<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for name in names {
        let base = name.to_lowercase();
        let mut key = base.clone();
        let mut n = 2;
        while keys.contains(&key) {
            key = format!("{base}_{n}");
            n += 1;
        }
        keys.push(key);
    }
    keys
}

/// A row of data from a result set.
pub type Row = Vec<Value>;

/// A single row keyed by column name, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Builds a record from `(column, value)` pairs, lower-casing the names.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let (names, values): (Vec<K>, Vec<Value>) = pairs.into_iter().unzip();
        let keys = normalize_keys(names.iter().map(|name| name.as_ref()));
        Self {
            fields: keys.into_iter().zip(values).collect(),
        }
    }

    /// Looks up a value by column name, ignoring case.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    }

    /// Looks up a text value, returning `None` for NULL or non-text values.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Represents a single value from a database query or a bound parameter.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    String(String),

    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Parses a command-line literal: `null`, booleans, integers and floats
    /// are typed, anything else is text.
    pub fn parse_literal(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("null") {
            Value::Null
        } else if let Ok(b) = raw.parse::<bool>() {
            Value::Bool(b)
        } else if let Ok(i) = raw.parse::<i64>() {
            Value::Int(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            Value::Float(f)
        } else {
            Value::String(raw.to_string())
        }
    }

    /// Attempts to convert the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
