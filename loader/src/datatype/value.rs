//! Decoded cell values and their storage representation.

use std::fmt;

use rusqlite::types::{ToSql, ToSqlOutput};

use super::temporal::Temporal;

/// A decoded scalar value. The variant always matches the datatype that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Temporal(Temporal),
    Uri(url::Url),
    Json(serde_json::Value),
    Binary(Vec<u8>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::Temporal(_) => "temporal",
            Value::Uri(_) => "anyURI",
            Value::Json(_) => "json",
            Value::Binary(_) => "binary",
        }
    }
}

/// The decoded content of one cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    /// A null token was matched in a scalar column.
    #[default]
    Absent,
    Scalar(Value),
    /// Value of a list-valued column, possibly empty.
    List(Vec<Value>),
}

impl Cell {
    pub fn is_absent(&self) -> bool {
        matches!(self, Cell::Absent)
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Cell::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Cell::List(values) => Some(values),
            _ => None,
        }
    }
}

/// SQLite column affinity for a datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Text,
    Integer,
    Real,
}

impl StorageKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            StorageKind::Text => "TEXT",
            StorageKind::Integer => "INTEGER",
            StorageKind::Real => "REAL",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A value ready to be bound to an SQL statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl StorageValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StorageValue::Null)
    }
}

impl From<&str> for StorageValue {
    fn from(s: &str) -> Self {
        StorageValue::Text(s.to_string())
    }
}

impl From<String> for StorageValue {
    fn from(s: String) -> Self {
        StorageValue::Text(s)
    }
}

impl ToSql for StorageValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            StorageValue::Null => ToSqlOutput::from(rusqlite::types::Null),
            StorageValue::Integer(i) => ToSqlOutput::from(*i),
            StorageValue::Real(f) => ToSqlOutput::from(*f),
            StorageValue::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}
