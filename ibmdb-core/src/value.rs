//! Values crossing the boundary between model instances and the driver.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A property value as held by a model instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModelValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    /// Naive local date-time; DB2 TIMESTAMP columns carry no zone
    Date(NaiveDateTime),
    Text(String),
    Binary(Vec<u8>),
    Json(serde_json::Value),
}

impl ModelValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view used for integer ids and counts
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Number(value) if value.fract() == 0.0 => Some(*value as i64),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Native form of a JSON scalar; arrays and objects stay JSON
    pub fn from_json_scalar(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Boolean(flag),
            Value::String(text) => Self::Text(text),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => Self::Integer(integer),
                None => number
                    .as_f64()
                    .map_or_else(|| Self::Json(Value::Number(number)), Self::Number),
            },
            other => Self::Json(other),
        }
    }

    /// Converts to a JSON value, encoding dates in ISO form
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Null => Value::Null,
            Self::Boolean(value) => Value::Bool(*value),
            Self::Integer(value) => Value::from(*value),
            Self::Number(value) => Value::from(*value),
            Self::Date(value) => Value::String(value.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()),
            Self::Text(text) => Value::String(text.clone()),
            Self::Binary(bytes) => Value::from(bytes.clone()),
            Self::Json(value) => value.clone(),
        }
    }
}

impl std::fmt::Display for ModelValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Date(value) => write!(f, "{value}"),
            Self::Text(text) => write!(f, "{text}"),
            Self::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Self::Json(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for ModelValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for ModelValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ModelValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for ModelValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ModelValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ModelValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDateTime> for ModelValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Date(value)
    }
}

impl From<serde_json::Value> for ModelValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// Property name to value map for one model instance.
pub type ModelData = BTreeMap<String, ModelValue>;

/// Large object flavour for values bound to BLOB/CLOB columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobKind {
    Blob,
    Clob,
}

impl std::fmt::Display for LobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "BLOB"),
            Self::Clob => write!(f, "CLOB"),
        }
    }
}

/// A value bound to a statement parameter or read back from a result column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Double(f64),
    Text(String),
    Binary(Vec<u8>),
    Lob { kind: LobKind, data: Box<SqlValue> },
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Double(value) if value.fract() == 0.0 => Some(*value as i64),
            Self::Text(text) => text.trim().parse().ok(),
            Self::Lob { data, .. } => data.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Double(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
            Self::Lob { data, .. } => data.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Lob { data, .. } => data.as_str(),
            _ => None,
        }
    }

    /// Renders the value as text the way the driver would return it
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Integer(value) => Some(value.to_string()),
            Self::Double(value) => Some(value.to_string()),
            Self::Text(text) => Some(text.clone()),
            Self::Binary(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Self::Lob { data, .. } => data.to_text(),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One result row keyed by column label.
pub type Row = BTreeMap<String, SqlValue>;
