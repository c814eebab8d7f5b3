//! Rendering of single `column <operator> operand` expressions.

use super::{Operand, Operator, RegexpPattern};
use crate::dialect::SqlDialect;
use crate::error::IbmDbError;
use crate::models::PropertyDefinition;
use crate::sql::ParameterizedSql;
use crate::value::ModelValue;
use crate::Result;

fn marshal<D: SqlDialect + ?Sized>(
    dialect: &D,
    prop: Option<&PropertyDefinition>,
    value: &ModelValue,
) -> Result<ParameterizedSql> {
    Ok(dialect.to_column_value(prop, value)?.into_fragment())
}

fn list_clause<D: SqlDialect + ?Sized>(
    dialect: &D,
    prop: Option<&PropertyDefinition>,
    values: &[ModelValue],
    separator: &str,
) -> Result<ParameterizedSql> {
    let parts = values
        .iter()
        .map(|value| marshal(dialect, prop, value))
        .collect::<Result<Vec<_>>>()?;
    Ok(ParameterizedSql::join(parts, separator))
}

fn list_operand(operator: Operator, operand: &Operand) -> Result<Vec<ModelValue>> {
    match operand {
        Operand::List(values) => Ok(values.clone()),
        Operand::Value(ModelValue::Json(serde_json::Value::Array(items))) => {
            Ok(items.iter().cloned().map(ModelValue::from_json_scalar).collect())
        }
        Operand::Value(value) if operator != Operator::Between => Ok(vec![value.clone()]),
        _ => Err(IbmDbError::invalid_operand(
            operator.as_str(),
            "expected a list of values",
        )),
    }
}

/// Operator rendering shared by SQL dialects.
///
/// Empty `inq`/`nin`/`between` operands produce clauses that are valid but
/// never true (`IN (NULL)`, `BETWEEN NULL AND NULL`). `regexp` has no
/// portable form and is refused here.
pub fn standard_expression<D: SqlDialect + ?Sized>(
    dialect: &D,
    column: &str,
    operator: Operator,
    operand: &Operand,
    prop: Option<&PropertyDefinition>,
) -> Result<ParameterizedSql> {
    let single = |symbol: &str| -> Result<ParameterizedSql> {
        let Operand::Value(value) = operand else {
            return Err(IbmDbError::invalid_operand(
                operator.as_str(),
                "expected a single value",
            ));
        };
        Ok(ParameterizedSql::join(
            [
                ParameterizedSql::new(format!("{column}{symbol}")),
                marshal(dialect, prop, value)?,
            ],
            "",
        ))
    };

    match operator {
        Operator::Eq if operand.is_null() => Ok(ParameterizedSql::new(format!("{column} IS NULL"))),
        Operator::Neq if operand.is_null() => {
            Ok(ParameterizedSql::new(format!("{column} IS NOT NULL")))
        }
        Operator::Eq => single("="),
        Operator::Neq => single("!="),
        Operator::Gt => single(">"),
        Operator::Gte => single(">="),
        Operator::Lt => single("<"),
        Operator::Lte => single("<="),
        Operator::Like => single(" LIKE "),
        Operator::Nlike => single(" NOT LIKE "),
        Operator::Between => {
            let values = list_operand(operator, operand)?;
            match values.len() {
                0 => Ok(ParameterizedSql::new(format!(
                    "{column} BETWEEN NULL AND NULL"
                ))),
                2 => Ok(ParameterizedSql::join(
                    [
                        ParameterizedSql::new(format!("{column} BETWEEN ")),
                        list_clause(dialect, prop, &values, " AND ")?,
                    ],
                    "",
                )),
                n => Err(IbmDbError::invalid_operand(
                    operator.as_str(),
                    format!("expected two bounds, got {n}"),
                )),
            }
        }
        Operator::Inq | Operator::Nin => {
            let keyword = if operator == Operator::Inq {
                " IN "
            } else {
                " NOT IN "
            };
            let values = list_operand(operator, operand)?;
            if values.is_empty() {
                return Ok(ParameterizedSql::new(format!("{column}{keyword}(NULL)")));
            }
            let mut clause = list_clause(dialect, prop, &values, ",")?;
            clause.sql = format!("({})", clause.sql);
            Ok(ParameterizedSql::join(
                [ParameterizedSql::new(format!("{column}{keyword}")), clause],
                "",
            ))
        }
        Operator::Regexp => Err(IbmDbError::unsupported_feature(
            "regexp",
            "the generic SQL dialect",
        )),
    }
}

/// DB2 `REGEXP_LIKE(column, 'pattern', 'flags')`; the pattern is inlined,
/// not bound.
pub fn regexp_like(column: &str, operand: &Operand) -> Result<ParameterizedSql> {
    let pattern = match operand {
        Operand::Pattern(pattern) => pattern.clone(),
        Operand::Value(ModelValue::Text(text)) => RegexpPattern::parse(text),
        _ => {
            return Err(IbmDbError::invalid_operand(
                Operator::Regexp.as_str(),
                "expected a regular expression",
            ));
        }
    };
    let mut flags = String::from(if pattern.ignore_case { "i" } else { "c" });
    if pattern.multiline {
        flags.push('m');
    }
    Ok(ParameterizedSql::new(format!(
        "REGEXP_LIKE({column}, '{}', '{flags}')",
        pattern.source.replace('\'', "''")
    )))
}
