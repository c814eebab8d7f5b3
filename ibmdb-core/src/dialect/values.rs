//! Value marshalling between model values and DB2 column values.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::IbmDbError;
use crate::models::{PropertyDefinition, PropertyType};
use crate::sql::ParameterizedSql;
use crate::value::{LobKind, ModelValue, SqlValue};
use crate::Result;

/// A marshalled column value: either bound through a placeholder or inlined
/// as a SQL fragment such as `DEFAULT`.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Bound(SqlValue),
    Fragment(ParameterizedSql),
}

impl ColumnValue {
    pub fn default_keyword() -> Self {
        Self::Fragment(ParameterizedSql::new("DEFAULT"))
    }

    /// Renders the value as a fragment: `?` plus the bound value, or the
    /// fragment itself.
    pub fn into_fragment(self) -> ParameterizedSql {
        match self {
            Self::Bound(value) => ParameterizedSql::with_params("?", vec![value]),
            Self::Fragment(fragment) => fragment,
        }
    }
}

/// Encodes a timestamp as `YYYY-MM-DD-HH.MM.SS.mmm000`.
///
/// Sub-millisecond precision is dropped; the last three digits are always
/// zero.
pub fn encode_timestamp(value: &NaiveDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}-{:02}.{:02}.{:02}.{:03}000",
        value.year(),
        value.month(),
        value.day(),
        value.hour(),
        value.minute(),
        value.second(),
        value.nanosecond() / 1_000_000 % 1000
    )
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d-%H.%M.%S%.f",
    "%Y-%m-%d-%H.%M.%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parses DB2 timestamps as well as ISO and space separated forms
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn json_text(value: &ModelValue) -> Result<SqlValue> {
    serde_json::to_string(&value.to_json())
        .map(SqlValue::Text)
        .map_err(|source| IbmDbError::Serialization {
            context: "Failed to encode column value as JSON".to_string(),
            source,
        })
}

/// Conversion used when no property descriptor is known
fn passthrough(value: &ModelValue) -> Result<SqlValue> {
    Ok(match value {
        ModelValue::Null => SqlValue::Null,
        ModelValue::Boolean(flag) => SqlValue::Integer(i64::from(*flag)),
        ModelValue::Integer(number) => SqlValue::Integer(*number),
        ModelValue::Number(number) => SqlValue::Double(*number),
        ModelValue::Date(date) => SqlValue::Text(encode_timestamp(date)),
        ModelValue::Text(text) => SqlValue::Text(text.clone()),
        ModelValue::Binary(bytes) => SqlValue::Binary(bytes.clone()),
        ModelValue::Json(_) => return json_text(value),
    })
}

fn truthy(value: &ModelValue) -> bool {
    match value {
        ModelValue::Null => false,
        ModelValue::Boolean(flag) => *flag,
        ModelValue::Integer(number) => *number != 0,
        ModelValue::Number(number) => *number != 0.0,
        ModelValue::Text(text) => text_truthiness(text),
        ModelValue::Date(_) | ModelValue::Binary(_) => true,
        ModelValue::Json(json) => !json.is_null() && json != &serde_json::Value::Bool(false),
    }
}

fn text_truthiness(text: &str) -> bool {
    let text = text.trim();
    if let Ok(number) = text.parse::<f64>() {
        return number != 0.0;
    }
    if text.eq_ignore_ascii_case("false") {
        return false;
    }
    !text.is_empty()
}

fn lob_kind(prop: &PropertyDefinition) -> Option<LobKind> {
    match prop.db2.data_type.as_deref() {
        Some(t) if t.eq_ignore_ascii_case("BLOB") => Some(LobKind::Blob),
        Some(t) if t.eq_ignore_ascii_case("CLOB") => Some(LobKind::Clob),
        _ => None,
    }
}

/// Marshals a model value for binding to the property's column
pub fn to_column_value(prop: Option<&PropertyDefinition>, value: &ModelValue) -> Result<ColumnValue> {
    let scalar;
    let value = match value {
        ModelValue::Json(json) if !json.is_array() && !json.is_object() => {
            scalar = ModelValue::from_json_scalar(json.clone());
            &scalar
        }
        other => other,
    };
    let Some(prop) = prop else {
        return passthrough(value).map(ColumnValue::Bound);
    };

    if value.is_null() {
        return Ok(if prop.uses_default_for_null() {
            ColumnValue::default_keyword()
        } else {
            ColumnValue::Bound(SqlValue::Null)
        });
    }

    let lob = lob_kind(prop);
    let converted = match (&prop.property_type, value) {
        (PropertyType::Boolean, v) => SqlValue::Integer(i64::from(truthy(v))),
        (PropertyType::Date, ModelValue::Date(date)) => SqlValue::Text(encode_timestamp(date)),
        (PropertyType::Date, ModelValue::Integer(millis)) => {
            match DateTime::from_timestamp_millis(*millis) {
                Some(date) => SqlValue::Text(encode_timestamp(&date.naive_utc())),
                None => {
                    return Err(IbmDbError::conversion(
                        &prop.name,
                        format!("timestamp {millis} is out of range"),
                    ));
                }
            }
        }
        (PropertyType::Buffer, ModelValue::Binary(bytes)) if lob == Some(LobKind::Blob) => {
            SqlValue::Binary(bytes.clone())
        }
        (PropertyType::Buffer, ModelValue::Binary(bytes)) => SqlValue::Text(BASE64.encode(bytes)),
        (PropertyType::Array | PropertyType::Json, ModelValue::Text(text)) => {
            SqlValue::Text(text.clone())
        }
        (
            PropertyType::Array
            | PropertyType::Json
            | PropertyType::GeoPoint
            | PropertyType::Point
            | PropertyType::List
            | PropertyType::Object
            | PropertyType::Any
            | PropertyType::Unknown(_),
            v,
        ) => json_text(v)?,
        (_, v) => passthrough(v)?,
    };

    Ok(ColumnValue::Bound(match lob {
        Some(kind) => SqlValue::Lob {
            kind,
            data: Box::new(converted),
        },
        None => converted,
    }))
}

fn text_of(prop: &PropertyDefinition, value: &SqlValue) -> Result<String> {
    value
        .to_text()
        .ok_or_else(|| IbmDbError::conversion(&prop.name, "column value has no text form"))
}

/// Converts a column value read from DB2 back into a model value
pub fn from_column_value(prop: Option<&PropertyDefinition>, value: &SqlValue) -> Result<ModelValue> {
    let value = match value {
        SqlValue::Lob { data, .. } => data.as_ref(),
        other => other,
    };
    if value.is_null() {
        return Ok(ModelValue::Null);
    }
    let Some(prop) = prop else {
        return Ok(match value {
            SqlValue::Integer(number) => ModelValue::Integer(*number),
            SqlValue::Double(number) => ModelValue::Number(*number),
            SqlValue::Binary(bytes) => ModelValue::Binary(bytes.clone()),
            other => ModelValue::Text(other.to_text().unwrap_or_default()),
        });
    };

    match &prop.property_type {
        PropertyType::Number => match value {
            SqlValue::Integer(number) => Ok(ModelValue::Integer(*number)),
            SqlValue::Double(number) => Ok(ModelValue::Number(*number)),
            other => {
                let text = text_of(prop, other)?;
                let text = text.trim();
                if let Ok(number) = text.parse::<i64>() {
                    Ok(ModelValue::Integer(number))
                } else {
                    text.parse::<f64>().map(ModelValue::Number).map_err(|_| {
                        IbmDbError::conversion(&prop.name, format!("'{text}' is not a number"))
                    })
                }
            }
        },
        PropertyType::String | PropertyType::Text | PropertyType::Enum(_) => {
            text_of(prop, value).map(ModelValue::Text)
        }
        PropertyType::Date => {
            let text = text_of(prop, value)?;
            parse_timestamp(&text).map(ModelValue::Date).ok_or_else(|| {
                IbmDbError::conversion(&prop.name, format!("'{text}' is not a timestamp"))
            })
        }
        PropertyType::Boolean => Ok(ModelValue::Boolean(match value {
            SqlValue::Integer(number) => *number != 0,
            SqlValue::Double(number) => *number != 0.0,
            other => text_truthiness(&text_of(prop, other)?),
        })),
        PropertyType::Buffer => match value {
            SqlValue::Binary(bytes) => Ok(ModelValue::Binary(bytes.clone())),
            other => {
                let text = text_of(prop, other)?;
                BASE64
                    .decode(text.trim())
                    .map(ModelValue::Binary)
                    .map_err(|e| IbmDbError::conversion(&prop.name, e.to_string()))
            }
        },
        _ => {
            let text = text_of(prop, value)?;
            // Values written as plain text rather than JSON come back as text
            Ok(serde_json::from_str::<serde_json::Value>(&text)
                .map_or(ModelValue::Text(text), ModelValue::Json))
        }
    }
}
