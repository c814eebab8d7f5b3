//! Property type to DB2 column type mapping.

use crate::error::IbmDbError;
use crate::models::{PropertyDefinition, PropertyType};
use crate::Result;

/// Length used for non-String textual columns without an explicit length
pub const DEFAULT_TEXT_LENGTH: u32 = 4096;
/// Length used for String id columns
pub const DEFAULT_ID_LENGTH: u32 = 255;
/// Length used for other String columns
pub const DEFAULT_STRING_LENGTH: u32 = 512;

/// Column definition for generated integer ids
pub const IDENTITY_COLUMN: &str =
    "INT NOT NULL GENERATED BY DEFAULT AS IDENTITY (START WITH 1 INCREMENT BY 1)";

/// ` CHARACTER SET x` and ` COLLATE y` suffixes
pub fn string_options(prop: &PropertyDefinition) -> String {
    let mut options = String::new();
    if let Some(charset) = prop.charset.as_deref().filter(|c| !c.is_empty()) {
        options.push_str(" CHARACTER SET ");
        options.push_str(charset);
    }
    if let Some(collation) = prop.collation.as_deref().filter(|c| !c.is_empty()) {
        options.push_str(" COLLATE ");
        options.push_str(collation);
    }
    options
}

fn text_length(prop: &PropertyDefinition) -> u32 {
    prop.length.or(prop.db2.data_length).unwrap_or(
        match (&prop.property_type, prop.is_id()) {
            (PropertyType::String, true) => DEFAULT_ID_LENGTH,
            (PropertyType::String, false) => DEFAULT_STRING_LENGTH,
            _ => DEFAULT_TEXT_LENGTH,
        },
    )
}

/// `VARCHAR(len)` or the declared override with the same length
pub fn text_type(prop: &PropertyDefinition) -> String {
    let base = prop
        .declared_data_type()
        .map_or_else(|| "VARCHAR".to_string(), str::to_uppercase);
    format!("{base}({}){}", text_length(prop), string_options(prop))
}

/// `INTEGER`, or the declared numeric type with precision and scale
pub fn number_type(prop: &PropertyDefinition) -> Result<String> {
    let base = prop
        .declared_data_type()
        .map_or_else(|| "INTEGER".to_string(), str::to_uppercase);
    let precision = prop.declared_precision();
    let scale = prop.declared_scale();

    if precision.is_none() && scale.is_some_and(|s| s > 0) {
        return Err(IbmDbError::configuration(format!(
            "Scale without Precision does not make sense for property '{}'",
            prop.name
        )));
    }

    if matches!(base.as_str(), "DECIMAL" | "NUMERIC" | "DEC") {
        return Ok(match (precision, scale) {
            (Some(p), Some(s)) => format!("{base}({p},{s})"),
            (Some(p), None) => format!("{base}({p})"),
            _ => base,
        });
    }
    Ok(base)
}

fn enum_type(prop: &PropertyDefinition, values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .collect();
    format!("ENUM({}){}", quoted.join(","), string_options(prop))
}

/// Column type for a property
pub fn column_type(prop: &PropertyDefinition) -> Result<String> {
    Ok(match &prop.property_type {
        PropertyType::Number => number_type(prop)?,
        PropertyType::Date => "TIMESTAMP".to_string(),
        PropertyType::Boolean => "SMALLINT".to_string(),
        PropertyType::Point | PropertyType::GeoPoint => "POINT".to_string(),
        PropertyType::Enum(values) => enum_type(prop, values),
        _ => text_type(prop),
    })
}

/// Full column definition: identity clause for generated ids, otherwise the
/// type followed by `NOT NULL` when the property is not nullable.
pub fn column_definition(prop: &PropertyDefinition) -> Result<String> {
    if prop.is_id() && prop.generated {
        return Ok(IDENTITY_COLUMN.to_string());
    }
    let column_type = column_type(prop)?;
    Ok(if prop.is_nullable() {
        column_type
    } else {
        format!("{column_type} NOT NULL")
    })
}
