//! Statement building from model definitions and where-filters.
//!
//! Builders are generic over [`SqlDialect`](crate::dialect::SqlDialect) so
//! value marshalling, escaping and operator rendering come from the dialect
//! while clause assembly lives here.

pub mod ddl;
pub mod expression;
pub mod pagination;
pub mod statements;
pub mod where_clause;

use serde::{Deserialize, Serialize};

use crate::models::SortOrder;
use crate::value::ModelValue;

/// Comparison operators accepted in where-filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    Inq,
    Nin,
    Neq,
    Like,
    Nlike,
    Regexp,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Between => "between",
            Self::Inq => "inq",
            Self::Nin => "nin",
            Self::Neq => "neq",
            Self::Like => "like",
            Self::Nlike => "nlike",
            Self::Regexp => "regexp",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regular expression operand for `regexp`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexpPattern {
    pub source: String,
    pub ignore_case: bool,
    pub multiline: bool,
}

impl RegexpPattern {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ignore_case: false,
            multiline: false,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    pub fn multiline(mut self) -> Self {
        self.multiline = true;
        self
    }

    /// Parses the `/source/flags` literal form; anything else is taken as a
    /// bare source with no flags.
    pub fn parse(literal: &str) -> Self {
        if let Some(rest) = literal.strip_prefix('/')
            && let Some((source, flags)) = rest.rsplit_once('/')
            && flags.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Self {
                source: source.to_string(),
                ignore_case: flags.contains('i'),
                multiline: flags.contains('m'),
            };
        }
        Self::new(literal)
    }
}

/// Right-hand side of a condition
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(ModelValue),
    List(Vec<ModelValue>),
    Pattern(RegexpPattern),
}

impl Operand {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Value(ModelValue::Null))
    }
}

impl From<ModelValue> for Operand {
    fn from(value: ModelValue) -> Self {
        Self::Value(value)
    }
}

impl From<RegexpPattern> for Operand {
    fn from(pattern: RegexpPattern) -> Self {
        Self::Pattern(pattern)
    }
}

/// A where-filter tree over model property names
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    Condition {
        property: String,
        operator: Operator,
        operand: Operand,
    },
    And(Vec<Where>),
    Or(Vec<Where>),
}

impl Where {
    pub fn condition(
        property: impl Into<String>,
        operator: Operator,
        operand: impl Into<Operand>,
    ) -> Self {
        Self::Condition {
            property: property.into(),
            operator,
            operand: operand.into(),
        }
    }

    pub fn eq(property: impl Into<String>, value: impl Into<ModelValue>) -> Self {
        Self::condition(property, Operator::Eq, Operand::Value(value.into()))
    }

    pub fn list(property: impl Into<String>, operator: Operator, values: Vec<ModelValue>) -> Self {
        Self::condition(property, operator, Operand::List(values))
    }

    pub fn regexp(property: impl Into<String>, pattern: RegexpPattern) -> Self {
        Self::condition(property, Operator::Regexp, Operand::Pattern(pattern))
    }

    /// Conjunction of `property = value` for every entry
    pub fn all_eq<'a>(pairs: impl IntoIterator<Item = (&'a str, ModelValue)>) -> Self {
        Self::And(pairs.into_iter().map(|(k, v)| Self::eq(k, v)).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub property: String,
    pub order: SortOrder,
}

impl OrderBy {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Query filter for selects: where, projection, ordering, pagination
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub where_clause: Option<Where>,
    pub fields: Option<Vec<String>>,
    pub order: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_where(mut self, where_clause: Where) -> Self {
        self.where_clause = Some(where_clause);
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_order(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regexp_literal_parsing() {
        let pattern = RegexpPattern::parse("/^J.*n$/im");
        assert_eq!(pattern.source, "^J.*n$");
        assert!(pattern.ignore_case);
        assert!(pattern.multiline);

        let bare = RegexpPattern::parse("^abc");
        assert_eq!(bare.source, "^abc");
        assert!(!bare.ignore_case);

        let slash_inside = RegexpPattern::parse("/a/b/");
        assert_eq!(slash_inside.source, "a/b");
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(Operator::Nlike.to_string(), "nlike");
        let parsed: Operator = serde_json::from_str("\"inq\"").expect("valid operator");
        assert_eq!(parsed, Operator::Inq);
    }

    #[test]
    fn test_where_helpers() {
        let clause = Where::all_eq([("a", ModelValue::Integer(1)), ("b", ModelValue::Null)]);
        match clause {
            Where::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected conjunction, got {other:?}"),
        }
        assert!(Operand::from(ModelValue::Null).is_null());
    }
}
