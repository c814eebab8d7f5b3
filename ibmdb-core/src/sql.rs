//! SQL text with positionally bound values.

use crate::error::IbmDbError;
use crate::value::SqlValue;
use crate::Result;

/// Generic placeholder marker used while statements are assembled
pub const PLACEHOLDER: char = '?';

/// A SQL fragment and the values bound to its `?` placeholders, in order.
///
/// # Example
/// ```rust
/// use ibmdb_core::sql::ParameterizedSql;
/// use ibmdb_core::value::SqlValue;
///
/// let stmt = ParameterizedSql::new("SELECT * FROM T")
///     .merge(ParameterizedSql::with_params("WHERE \"A\"=?", vec![SqlValue::Integer(1)]));
///
/// assert_eq!(stmt.sql, "SELECT * FROM T WHERE \"A\"=?");
/// assert!(stmt.check().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterizedSql {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl ParameterizedSql {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }

    /// Appends another fragment separated by a single space
    pub fn merge(self, other: impl Into<Self>) -> Self {
        self.merge_with(other, " ")
    }

    /// Appends another fragment; empty fragments contribute nothing
    pub fn merge_with(mut self, other: impl Into<Self>, separator: &str) -> Self {
        let other = other.into();
        if other.is_empty() {
            self.params.extend(other.params);
            return self;
        }
        if !self.sql.is_empty() {
            self.sql.push_str(separator);
        }
        self.sql.push_str(&other.sql);
        self.params.extend(other.params);
        self
    }

    /// Joins fragments with a separator, concatenating their values
    pub fn join(parts: impl IntoIterator<Item = Self>, separator: &str) -> Self {
        parts
            .into_iter()
            .fold(Self::default(), |acc, part| acc.merge_with(part, separator))
    }

    /// Number of `?` markers outside quoted literals and identifiers
    pub fn placeholder_count(&self) -> usize {
        placeholder_positions(&self.sql).len()
    }

    /// Ensures the placeholder count matches the bound values
    pub fn check(&self) -> Result<()> {
        let placeholders = self.placeholder_count();
        if placeholders != self.params.len() {
            return Err(IbmDbError::ParameterMismatch {
                placeholders,
                params: self.params.len(),
            });
        }
        Ok(())
    }

    /// Rewrites every generic placeholder into the dialect's form
    pub fn parameterize(mut self, placeholder: &str) -> Self {
        let positions = placeholder_positions(&self.sql);
        if positions.is_empty() {
            return self;
        }
        let mut out = String::with_capacity(self.sql.len() + positions.len() * placeholder.len());
        let mut last = 0;
        for position in positions {
            out.push_str(&self.sql[last..position]);
            out.push_str(placeholder);
            last = position + PLACEHOLDER.len_utf8();
        }
        out.push_str(&self.sql[last..]);
        self.sql = out;
        self
    }
}

impl From<&str> for ParameterizedSql {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for ParameterizedSql {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

impl std::fmt::Display for ParameterizedSql {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql)
    }
}

/// Byte offsets of placeholders that are not inside `'...'` or `"..."`.
///
/// Doubled quotes inside a literal toggle twice and so stay inside it.
fn placeholder_positions(sql: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut quote: Option<char> = None;
    for (index, ch) in sql.char_indices() {
        match (quote, ch) {
            (None, '\'' | '"') => quote = Some(ch),
            (Some(open), c) if c == open => quote = None,
            (None, PLACEHOLDER) => positions.push(index),
            _ => {}
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_skips_empty_fragments() {
        let stmt = ParameterizedSql::new("SELECT 1")
            .merge("")
            .merge("FROM SYSIBM.SYSDUMMY1");
        assert_eq!(stmt.sql, "SELECT 1 FROM SYSIBM.SYSDUMMY1");
    }

    #[test]
    fn test_merge_concatenates_params() {
        let stmt = ParameterizedSql::with_params("A=?", vec![SqlValue::Integer(1)])
            .merge_with(
                ParameterizedSql::with_params("B=?", vec![SqlValue::Text("x".into())]),
                " AND ",
            );
        assert_eq!(stmt.sql, "A=? AND B=?");
        assert_eq!(
            stmt.params,
            vec![SqlValue::Integer(1), SqlValue::Text("x".into())]
        );
    }

    #[test]
    fn test_join() {
        let parts = vec![
            ParameterizedSql::with_params("?", vec![SqlValue::Integer(1)]),
            ParameterizedSql::with_params("?", vec![SqlValue::Integer(2)]),
        ];
        let joined = ParameterizedSql::join(parts, ",");
        assert_eq!(joined.sql, "?,?");
        assert_eq!(joined.params.len(), 2);
    }

    #[test]
    fn test_placeholders_inside_literals_ignored() {
        let stmt = ParameterizedSql::with_params(
            "SELECT '?' AS Q, \"WHO?\" FROM T WHERE A=? AND B='it''s ?'",
            vec![SqlValue::Integer(1)],
        );
        assert_eq!(stmt.placeholder_count(), 1);
        assert!(stmt.check().is_ok());
    }

    #[test]
    fn test_check_detects_mismatch() {
        let stmt = ParameterizedSql::with_params("A=? AND B=?", vec![SqlValue::Integer(1)]);
        match stmt.check() {
            Err(IbmDbError::ParameterMismatch {
                placeholders,
                params,
            }) => {
                assert_eq!(placeholders, 2);
                assert_eq!(params, 1);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_parameterize() {
        let stmt = ParameterizedSql::with_params(
            "UPDATE T SET \"A\"=?, \"B\"='?' WHERE \"ID\"=?",
            vec![SqlValue::Integer(1), SqlValue::Integer(2)],
        )
        .parameterize("(?)");
        assert_eq!(stmt.sql, "UPDATE T SET \"A\"=(?), \"B\"='?' WHERE \"ID\"=(?)");
        assert_eq!(stmt.placeholder_count(), 2);
    }
}
