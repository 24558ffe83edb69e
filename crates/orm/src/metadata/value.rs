//! Conversions between Rust field types and [`DatabaseValue`]

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::backends::DatabaseValue;
use crate::dialect::SqlType;

/// A column value could not be converted into the field's type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot convert {found} into {expected}")]
pub struct ConversionError {
    pub expected: &'static str,
    pub found: String,
}

impl ConversionError {
    fn new(expected: &'static str, value: &DatabaseValue) -> Self {
        Self {
            expected,
            found: format!("{} value {}", value.type_name(), value),
        }
    }
}

/// A Rust type that can be stored in a mapped column
pub trait ColumnValue: Sized + Send + Sync + 'static {
    /// Semantic type used for DDL
    const SQL_TYPE: SqlType;

    fn to_value(&self) -> DatabaseValue;

    fn from_value(value: DatabaseValue) -> Result<Self, ConversionError>;
}

impl ColumnValue for bool {
    const SQL_TYPE: SqlType = SqlType::Boolean;

    fn to_value(&self) -> DatabaseValue {
        DatabaseValue::Bool(*self)
    }

    fn from_value(value: DatabaseValue) -> Result<Self, ConversionError> {
        match value {
            DatabaseValue::Bool(b) => Ok(b),
            DatabaseValue::Int32(i) => Ok(i != 0),
            DatabaseValue::Int64(i) => Ok(i != 0),
            DatabaseValue::String(ref s) => match s.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(ConversionError::new("bool", &value)),
            },
            other => Err(ConversionError::new("bool", &other)),
        }
    }
}

macro_rules! integer_column_value {
    ($ty:ty, $sql:expr, $name:literal) => {
        impl ColumnValue for $ty {
            const SQL_TYPE: SqlType = $sql;

            fn to_value(&self) -> DatabaseValue {
                DatabaseValue::from(*self)
            }

            fn from_value(value: DatabaseValue) -> Result<Self, ConversionError> {
                let wide = match &value {
                    DatabaseValue::Int32(i) => i64::from(*i),
                    DatabaseValue::Int64(i) => *i,
                    DatabaseValue::Bool(b) => i64::from(*b),
                    DatabaseValue::String(s) => s
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| ConversionError::new($name, &value))?,
                    _ => return Err(ConversionError::new($name, &value)),
                };
                <$ty>::try_from(wide).map_err(|_| ConversionError::new($name, &value))
            }
        }
    };
}

integer_column_value!(i16, SqlType::SmallInt, "i16");
integer_column_value!(i32, SqlType::Integer, "i32");
integer_column_value!(i64, SqlType::BigInt, "i64");

impl ColumnValue for f32 {
    const SQL_TYPE: SqlType = SqlType::Float;

    fn to_value(&self) -> DatabaseValue {
        DatabaseValue::Float32(*self)
    }

    fn from_value(value: DatabaseValue) -> Result<Self, ConversionError> {
        match value {
            DatabaseValue::Float32(f) => Ok(f),
            DatabaseValue::Float64(f) => Ok(f as f32),
            DatabaseValue::Int32(i) => Ok(i as f32),
            DatabaseValue::Int64(i) => Ok(i as f32),
            other => Err(ConversionError::new("f32", &other)),
        }
    }
}

impl ColumnValue for f64 {
    const SQL_TYPE: SqlType = SqlType::Double;

    fn to_value(&self) -> DatabaseValue {
        DatabaseValue::Float64(*self)
    }

    fn from_value(value: DatabaseValue) -> Result<Self, ConversionError> {
        match value {
            DatabaseValue::Float64(f) => Ok(f),
            DatabaseValue::Float32(f) => Ok(f64::from(f)),
            DatabaseValue::Int32(i) => Ok(f64::from(i)),
            DatabaseValue::Int64(i) => Ok(i as f64),
            DatabaseValue::String(ref s) => {
                s.trim().parse().map_err(|_| ConversionError::new("f64", &value))
            }
            other => Err(ConversionError::new("f64", &other)),
        }
    }
}

impl ColumnValue for String {
    const SQL_TYPE: SqlType = SqlType::Text;

    fn to_value(&self) -> DatabaseValue {
        DatabaseValue::String(self.clone())
    }

    fn from_value(value: DatabaseValue) -> Result<Self, ConversionError> {
        match value {
            DatabaseValue::String(s) => Ok(s),
            DatabaseValue::Uuid(u) => Ok(u.to_string()),
            DatabaseValue::Json(JsonValue::String(s)) => Ok(s),
            other => Err(ConversionError::new("String", &other)),
        }
    }
}

impl ColumnValue for Vec<u8> {
    const SQL_TYPE: SqlType = SqlType::Binary;

    fn to_value(&self) -> DatabaseValue {
        DatabaseValue::Bytes(self.clone())
    }

    fn from_value(value: DatabaseValue) -> Result<Self, ConversionError> {
        match value {
            DatabaseValue::Bytes(b) => Ok(b),
            other => Err(ConversionError::new("bytes", &other)),
        }
    }
}

impl ColumnValue for Uuid {
    const SQL_TYPE: SqlType = SqlType::Uuid;

    fn to_value(&self) -> DatabaseValue {
        DatabaseValue::Uuid(*self)
    }

    fn from_value(value: DatabaseValue) -> Result<Self, ConversionError> {
        match &value {
            DatabaseValue::Uuid(u) => Ok(*u),
            DatabaseValue::String(s) => {
                Uuid::parse_str(s).map_err(|_| ConversionError::new("uuid", &value))
            }
            DatabaseValue::Bytes(b) => {
                Uuid::from_slice(b).map_err(|_| ConversionError::new("uuid", &value))
            }
            _ => Err(ConversionError::new("uuid", &value)),
        }
    }
}

impl ColumnValue for DateTime<Utc> {
    const SQL_TYPE: SqlType = SqlType::Timestamp;

    fn to_value(&self) -> DatabaseValue {
        DatabaseValue::DateTime(*self)
    }

    fn from_value(value: DatabaseValue) -> Result<Self, ConversionError> {
        match &value {
            DatabaseValue::DateTime(dt) => Ok(*dt),
            DatabaseValue::String(s) => parse_timestamp(s)
                .ok_or_else(|| ConversionError::new("timestamp", &value)),
            DatabaseValue::Int64(secs) => DateTime::from_timestamp(*secs, 0)
                .ok_or_else(|| ConversionError::new("timestamp", &value)),
            _ => Err(ConversionError::new("timestamp", &value)),
        }
    }
}

impl ColumnValue for NaiveDate {
    const SQL_TYPE: SqlType = SqlType::Date;

    fn to_value(&self) -> DatabaseValue {
        DatabaseValue::Date(*self)
    }

    fn from_value(value: DatabaseValue) -> Result<Self, ConversionError> {
        match &value {
            DatabaseValue::Date(d) => Ok(*d),
            DatabaseValue::DateTime(dt) => Ok(dt.date_naive()),
            DatabaseValue::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| ConversionError::new("date", &value)),
            _ => Err(ConversionError::new("date", &value)),
        }
    }
}

impl ColumnValue for NaiveTime {
    const SQL_TYPE: SqlType = SqlType::Time;

    fn to_value(&self) -> DatabaseValue {
        DatabaseValue::Time(*self)
    }

    fn from_value(value: DatabaseValue) -> Result<Self, ConversionError> {
        match &value {
            DatabaseValue::Time(t) => Ok(*t),
            DatabaseValue::String(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                .map_err(|_| ConversionError::new("time", &value)),
            _ => Err(ConversionError::new("time", &value)),
        }
    }
}

impl ColumnValue for JsonValue {
    const SQL_TYPE: SqlType = SqlType::Json;

    fn to_value(&self) -> DatabaseValue {
        DatabaseValue::Json(self.clone())
    }

    fn from_value(value: DatabaseValue) -> Result<Self, ConversionError> {
        match value {
            DatabaseValue::Json(j) => Ok(j),
            DatabaseValue::String(ref s) => {
                serde_json::from_str(s).map_err(|_| ConversionError::new("json", &value))
            }
            other => Ok(other.to_json()),
        }
    }
}

impl<V: ColumnValue> ColumnValue for Option<V> {
    const SQL_TYPE: SqlType = V::SQL_TYPE;

    fn to_value(&self) -> DatabaseValue {
        match self {
            Some(v) => v.to_value(),
            None => DatabaseValue::Null,
        }
    }

    fn from_value(value: DatabaseValue) -> Result<Self, ConversionError> {
        if value.is_null() {
            Ok(None)
        } else {
            V::from_value(value).map(Some)
        }
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

/// Hashable primary-key value used by the identity cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Int(i64),
    Text(String),
    Uuid(Uuid),
    Bytes(Vec<u8>),
}

impl IdentityKey {
    /// Normalise a key value; `None` for NULL and values that cannot key a row
    pub fn from_value(value: &DatabaseValue) -> Option<Self> {
        match value {
            DatabaseValue::Int32(i) => Some(IdentityKey::Int(i64::from(*i))),
            DatabaseValue::Int64(i) => Some(IdentityKey::Int(*i)),
            DatabaseValue::String(s) => Some(IdentityKey::Text(s.clone())),
            DatabaseValue::Uuid(u) => Some(IdentityKey::Uuid(*u)),
            DatabaseValue::Bytes(b) => Some(IdentityKey::Bytes(b.clone())),
            DatabaseValue::Date(d) => Some(IdentityKey::Text(d.to_string())),
            DatabaseValue::DateTime(dt) => Some(IdentityKey::Text(dt.to_rfc3339())),
            _ => None,
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Int(i) => write!(f, "{}", i),
            IdentityKey::Text(s) => write!(f, "{}", s),
            IdentityKey::Uuid(u) => write!(f, "{}", u),
            IdentityKey::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widening_and_range_checks() {
        assert_eq!(i64::from_value(DatabaseValue::Int32(7)).unwrap(), 7);
        assert_eq!(i32::from_value(DatabaseValue::Int64(7)).unwrap(), 7);
        assert!(i32::from_value(DatabaseValue::Int64(i64::MAX)).is_err());
        assert!(i16::from_value(DatabaseValue::Int64(40_000)).is_err());
        assert!(i64::from_value(DatabaseValue::from("x")).is_err());
    }

    #[test]
    fn test_bool_from_integer_storage() {
        assert!(bool::from_value(DatabaseValue::Int64(1)).unwrap());
        assert!(!bool::from_value(DatabaseValue::Int64(0)).unwrap());
    }

    #[test]
    fn test_text_backed_types() {
        let id = Uuid::new_v4();
        assert_eq!(Uuid::from_value(DatabaseValue::String(id.to_string())).unwrap(), id);

        let ts = DateTime::<Utc>::from_value(DatabaseValue::from("2024-03-01 10:15:00")).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:15:00+00:00");

        let date = NaiveDate::from_value(DatabaseValue::from("2024-03-01")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        let json = JsonValue::from_value(DatabaseValue::from(r#"{"a":1}"#)).unwrap();
        assert_eq!(json["a"], 1);
    }

    #[test]
    fn test_option_maps_null() {
        assert_eq!(Option::<i32>::from_value(DatabaseValue::Null).unwrap(), None);
        assert_eq!(Option::<i32>::from_value(DatabaseValue::Int64(3)).unwrap(), Some(3));
        assert!(Some(5i32).to_value() == DatabaseValue::Int32(5));
        assert!(Option::<String>::None.to_value().is_null());
        assert_eq!(<Option<String> as ColumnValue>::SQL_TYPE, SqlType::Text);
    }

    #[test]
    fn test_identity_keys_collapse_integer_widths() {
        assert_eq!(
            IdentityKey::from_value(&DatabaseValue::Int32(5)),
            IdentityKey::from_value(&DatabaseValue::Int64(5))
        );
        assert_eq!(IdentityKey::from_value(&DatabaseValue::Null), None);
        assert_eq!(IdentityKey::from_value(&DatabaseValue::Float64(1.0)), None);
    }
}
