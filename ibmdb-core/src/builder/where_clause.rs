//! WHERE clause assembly.

use super::Where;
use crate::dialect::SqlDialect;
use crate::models::ModelDefinition;
use crate::sql::ParameterizedSql;
use crate::Result;

/// Builds `WHERE <conditions>`, or an empty fragment when nothing applies.
///
/// Conditions on properties the model does not declare are skipped.
pub fn build_where<D: SqlDialect + ?Sized>(
    dialect: &D,
    model: &ModelDefinition,
    filter: Option<&Where>,
) -> Result<ParameterizedSql> {
    let Some(filter) = filter else {
        return Ok(ParameterizedSql::default());
    };
    let conditions = build_conditions(dialect, model, filter)?;
    if conditions.is_empty() {
        return Ok(conditions);
    }
    Ok(ParameterizedSql::new("WHERE").merge(conditions))
}

/// Builds the condition list without the `WHERE` keyword
pub fn build_conditions<D: SqlDialect + ?Sized>(
    dialect: &D,
    model: &ModelDefinition,
    filter: &Where,
) -> Result<ParameterizedSql> {
    match filter {
        Where::Condition {
            property,
            operator,
            operand,
        } => {
            let Some(prop) = model.property(property) else {
                tracing::debug!(
                    "Skipping unknown property '{}' in where clause for model {}",
                    property,
                    model.name
                );
                return Ok(ParameterizedSql::default());
            };
            let column = dialect.escape_name(prop.column_name());
            dialect.build_expression(&column, *operator, operand, Some(prop))
        }
        Where::And(parts) => group(dialect, model, parts, " AND "),
        Where::Or(parts) => group(dialect, model, parts, " OR "),
    }
}

fn group<D: SqlDialect + ?Sized>(
    dialect: &D,
    model: &ModelDefinition,
    parts: &[Where],
    separator: &str,
) -> Result<ParameterizedSql> {
    let mut built = Vec::with_capacity(parts.len());
    for part in parts {
        let clause = build_conditions(dialect, model, part)?;
        if !clause.is_empty() {
            built.push(clause);
        }
    }
    if built.len() > 1 {
        for clause in &mut built {
            clause.sql = format!("({})", clause.sql);
        }
    }
    Ok(ParameterizedSql::join(built, separator))
}
