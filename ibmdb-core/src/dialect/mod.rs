//! SQL dialect abstraction and the DB2 implementation.
//!
//! [`SqlDialect`] carries the hooks a statement builder needs from a
//! database: identifier escaping, placeholders, value marshalling, column
//! types, operator rendering and pagination. Default methods hold the
//! behaviour common to SQL databases; [`Db2Dialect`] overrides what DB2 does
//! differently.

pub mod type_mapping;
pub mod values;

use crate::builder::expression::{regexp_like, standard_expression};
use crate::builder::pagination::fetch_first_limit;
use crate::builder::{Operand, Operator, Where};
use crate::error::IbmDbError;
use crate::models::{ModelDefinition, PropertyDefinition};
use crate::sql::ParameterizedSql;
use crate::value::{ModelValue, SqlValue};
use crate::Result;

pub use values::ColumnValue;

/// Dialect hooks used by statement builders and connectors.
pub trait SqlDialect: Send + Sync {
    /// Dialect name for logs
    fn name(&self) -> &'static str;

    /// Quotes an identifier. Embedded double quotes are not doubled.
    fn escape_name(&self, name: &str) -> String {
        if name.is_empty() {
            return String::new();
        }
        format!("\"{name}\"")
    }

    /// Driver placeholder for the `key`-th bound value
    fn placeholder_for_value(&self, _key: usize) -> String {
        "?".to_string()
    }

    /// Placeholder for a bound identifier
    fn placeholder_for_identifier(&self, key: &str) -> Result<String> {
        Err(IbmDbError::UnsupportedPlaceholder {
            key: key.to_string(),
        })
    }

    /// Marshals a model value for binding to a column
    fn to_column_value(
        &self,
        prop: Option<&PropertyDefinition>,
        value: &ModelValue,
    ) -> Result<ColumnValue> {
        values::to_column_value(prop, value)
    }

    /// Converts a column value back into a model value
    fn from_column_value(
        &self,
        prop: Option<&PropertyDefinition>,
        value: &SqlValue,
    ) -> Result<ModelValue> {
        values::from_column_value(prop, value)
    }

    fn build_column_type(&self, prop: &PropertyDefinition) -> Result<String> {
        type_mapping::column_type(prop)
    }

    fn build_column_definition(&self, prop: &PropertyDefinition) -> Result<String> {
        type_mapping::column_definition(prop)
    }

    /// Renders `column <operator> operand`, marshalling values through
    /// [`to_column_value`](Self::to_column_value)
    fn build_expression(
        &self,
        column: &str,
        operator: Operator,
        operand: &Operand,
        prop: Option<&PropertyDefinition>,
    ) -> Result<ParameterizedSql> {
        standard_expression(self, column, operator, operand, prop)
    }

    /// Pagination clause appended to selects; zero counts as absent
    fn build_limit(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit.filter(|v| *v > 0), offset.filter(|v| *v > 0)) {
            (None, None) => String::new(),
            (Some(limit), None) => format!("LIMIT {limit}"),
            (None, Some(offset)) => format!("OFFSET {offset}"),
            (Some(limit), Some(offset)) => format!("LIMIT {limit} OFFSET {offset}"),
        }
    }

    /// `WHERE ...` clause for a model, or an empty fragment
    fn build_where(&self, model: &ModelDefinition, filter: Option<&Where>) -> Result<ParameterizedSql> {
        crate::builder::where_clause::build_where(self, model, filter)
    }

    /// Converts generic `?` markers into driver placeholders
    fn parameterize(&self, stmt: ParameterizedSql) -> ParameterizedSql {
        stmt.parameterize(&self.placeholder_for_value(0))
    }
}

/// IBM DB2 dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct Db2Dialect;

impl Db2Dialect {
    pub fn new() -> Self {
        Self
    }
}

impl SqlDialect for Db2Dialect {
    fn name(&self) -> &'static str {
        "db2"
    }

    fn placeholder_for_value(&self, _key: usize) -> String {
        "(?)".to_string()
    }

    fn build_expression(
        &self,
        column: &str,
        operator: Operator,
        operand: &Operand,
        prop: Option<&PropertyDefinition>,
    ) -> Result<ParameterizedSql> {
        match operator {
            Operator::Regexp => regexp_like(column, operand),
            _ => standard_expression(self, column, operator, operand, prop),
        }
    }

    fn build_limit(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        fetch_first_limit(limit, offset)
    }
}
