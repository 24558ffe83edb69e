//! Core Database Backend Traits
//!
//! This module defines the connection collaborator the engine talks to. A
//! backend supplies a [`ConnectionProvider`] that hands out
//! [`DatabaseConnection`]s; everything above this layer (sessions, schema
//! generation, migrations) only ever sees these traits and [`DatabaseValue`].

use std::fmt;

use serde_json::Value as JsonValue;

use crate::error::DatabaseError;

/// Abstract database connection
///
/// A connection is owned by exactly one session at a time, so implementations
/// only need to be `Send`.
pub trait DatabaseConnection: Send {
    /// Execute a statement and return the affected row count
    fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<u64, DatabaseError>;

    /// Execute a query and return every result row
    fn fetch_all(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> Result<Vec<DatabaseRow>, DatabaseError>;

    /// Execute several `;`-separated statements without parameters
    fn execute_batch(&mut self, sql: &str) -> Result<(), DatabaseError>;

    /// Begin a transaction (switch off auto-commit)
    fn begin(&mut self) -> Result<(), DatabaseError>;

    /// Commit the current transaction
    fn commit(&mut self) -> Result<(), DatabaseError>;

    /// Roll back the current transaction
    fn rollback(&mut self) -> Result<(), DatabaseError>;

    /// Whether a transaction is currently open on this connection
    fn in_transaction(&self) -> bool;
}

/// Source of database connections
pub trait ConnectionProvider: Send + Sync {
    /// Acquire a connection; dropping it returns it to the provider
    fn acquire(&self) -> Result<Box<dyn DatabaseConnection>, DatabaseError>;

    /// Short human-readable description used in logs
    fn describe(&self) -> String {
        "connection provider".to_string()
    }
}

/// One result row: column labels and the values in select order
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseRow {
    columns: Vec<String>,
    values: Vec<DatabaseValue>,
}

impl DatabaseRow {
    pub fn new(columns: Vec<String>, values: Vec<DatabaseValue>) -> Self {
        Self { columns, values }
    }

    /// Get a column value by index
    pub fn get_by_index(&self, index: usize) -> Option<&DatabaseValue> {
        self.values.get(index)
    }

    /// Get a column value by label, ignoring ASCII case
    pub fn get_by_name(&self, name: &str) -> Option<&DatabaseValue> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
            .and_then(|index| self.values.get(index))
    }

    /// Get column count
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get column labels
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[DatabaseValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<DatabaseValue> {
        self.values
    }
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    DateTime(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    Json(JsonValue),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Integer view of the value, if it holds one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int32(i) => Some(i64::from(*i)),
            DatabaseValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Variant name used in conversion errors
    pub fn type_name(&self) -> &'static str {
        match self {
            DatabaseValue::Null => "null",
            DatabaseValue::Bool(_) => "bool",
            DatabaseValue::Int32(_) => "int32",
            DatabaseValue::Int64(_) => "int64",
            DatabaseValue::Float32(_) => "float32",
            DatabaseValue::Float64(_) => "float64",
            DatabaseValue::String(_) => "string",
            DatabaseValue::Bytes(_) => "bytes",
            DatabaseValue::Uuid(_) => "uuid",
            DatabaseValue::DateTime(_) => "datetime",
            DatabaseValue::Date(_) => "date",
            DatabaseValue::Time(_) => "time",
            DatabaseValue::Json(_) => "json",
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            DatabaseValue::Null => JsonValue::Null,
            DatabaseValue::Bool(b) => JsonValue::Bool(*b),
            DatabaseValue::Int32(i) => JsonValue::from(*i),
            DatabaseValue::Int64(i) => JsonValue::from(*i),
            DatabaseValue::Float32(f) => serde_json::Number::from_f64(f64::from(*f))
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::String(s) => JsonValue::String(s.clone()),
            DatabaseValue::Bytes(b) => JsonValue::Array(b.iter().map(|&x| JsonValue::from(x)).collect()),
            DatabaseValue::Uuid(u) => JsonValue::String(u.to_string()),
            DatabaseValue::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            DatabaseValue::Date(d) => JsonValue::String(d.to_string()),
            DatabaseValue::Time(t) => JsonValue::String(t.to_string()),
            DatabaseValue::Json(j) => j.clone(),
        }
    }
}

impl fmt::Display for DatabaseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseValue::Null => write!(f, "NULL"),
            DatabaseValue::Bool(b) => write!(f, "{}", b),
            DatabaseValue::Int32(i) => write!(f, "{}", i),
            DatabaseValue::Int64(i) => write!(f, "{}", i),
            DatabaseValue::Float32(v) => write!(f, "{}", v),
            DatabaseValue::Float64(v) => write!(f, "{}", v),
            DatabaseValue::String(s) => write!(f, "'{}'", s),
            DatabaseValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            DatabaseValue::Uuid(u) => write!(f, "{}", u),
            DatabaseValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            DatabaseValue::Date(d) => write!(f, "{}", d),
            DatabaseValue::Time(t) => write!(f, "{}", t),
            DatabaseValue::Json(j) => write!(f, "{}", j),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i16> for DatabaseValue {
    fn from(value: i16) -> Self {
        DatabaseValue::Int32(i32::from(value))
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f32> for DatabaseValue {
    fn from(value: f32) -> Self {
        DatabaseValue::Float32(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(value: Vec<u8>) -> Self {
        DatabaseValue::Bytes(value)
    }
}

impl From<uuid::Uuid> for DatabaseValue {
    fn from(value: uuid::Uuid) -> Self {
        DatabaseValue::Uuid(value)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DatabaseValue {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<chrono::NaiveDate> for DatabaseValue {
    fn from(value: chrono::NaiveDate) -> Self {
        DatabaseValue::Date(value)
    }
}

impl From<chrono::NaiveTime> for DatabaseValue {
    fn from(value: chrono::NaiveTime) -> Self {
        DatabaseValue::Time(value)
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::Json(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}
