//! Typed access to driver result rows.

use crate::error::IbmDbError;
use crate::value::{Row, SqlValue};
use crate::Result;

/// Extension trait for extracting typed values from result rows with
/// consistent error context.
///
/// Column labels are matched exactly first, then case-insensitively, since
/// DB2 folds unquoted labels to upper case.
///
/// # Example
/// ```rust
/// use ibmdb_core::driver::RowExt;
/// use ibmdb_core::value::{Row, SqlValue};
///
/// let mut row = Row::new();
/// row.insert("COUNT".to_string(), SqlValue::Integer(1));
/// assert_eq!(row.get_i64("count", None).unwrap(), 1);
/// ```
pub trait RowExt {
    /// Raw value of a column
    fn get_field(&self, field_name: &str, table_context: Option<&str>) -> Result<&SqlValue>;

    fn get_i64(&self, field_name: &str, table_context: Option<&str>) -> Result<i64>;

    /// Text of a column, `None` for SQL NULL
    fn get_opt_text(&self, field_name: &str, table_context: Option<&str>) -> Result<Option<String>>;

    fn get_text(&self, field_name: &str, table_context: Option<&str>) -> Result<String>;
}

fn field_error(field_name: &str, table_context: Option<&str>, reason: &str) -> IbmDbError {
    let context = table_context.map_or_else(String::new, |t| format!(" in {t}"));
    IbmDbError::conversion(field_name, format!("{reason}{context}"))
}

impl RowExt for Row {
    fn get_field(&self, field_name: &str, table_context: Option<&str>) -> Result<&SqlValue> {
        self.get(field_name)
            .or_else(|| {
                self.iter()
                    .find(|(label, _)| label.eq_ignore_ascii_case(field_name))
                    .map(|(_, value)| value)
            })
            .ok_or_else(|| field_error(field_name, table_context, "column missing from result"))
    }

    fn get_i64(&self, field_name: &str, table_context: Option<&str>) -> Result<i64> {
        self.get_field(field_name, table_context)?
            .as_i64()
            .ok_or_else(|| field_error(field_name, table_context, "value is not an integer"))
    }

    fn get_opt_text(&self, field_name: &str, table_context: Option<&str>) -> Result<Option<String>> {
        Ok(self.get_field(field_name, table_context)?.to_text())
    }

    fn get_text(&self, field_name: &str, table_context: Option<&str>) -> Result<String> {
        self.get_opt_text(field_name, table_context)?
            .ok_or_else(|| field_error(field_name, table_context, "value is NULL"))
    }
}
