//! Pagination clauses and client-side result slicing.

use std::sync::OnceLock;

use regex::Regex;

/// DB2 pagination clause.
///
/// A lone limit uses `FETCH FIRST n ROWS ONLY`, which DB2 always accepts.
/// Forms containing `LIMIT`/`OFFSET` are stripped again before execution
/// unless the server has LIMIT/OFFSET support enabled. Zero counts as
/// absent for both arguments.
pub fn fetch_first_limit(limit: Option<u64>, offset: Option<u64>) -> String {
    let nonzero = |value: Option<u64>| value.filter(|v| *v > 0);
    match (nonzero(limit), nonzero(offset)) {
        (None, None) => String::new(),
        (Some(limit), None) => format!("FETCH FIRST {limit} ROWS ONLY"),
        (None, Some(offset)) => format!("OFFSET {offset}"),
        (Some(limit), Some(offset)) => format!("LIMIT {limit} OFFSET {offset}"),
    }
}

/// Pre-compiled `LIMIT n` / `OFFSET n` patterns.
struct PaginationPatterns {
    limit: Regex,
    offset: Regex,
}

impl PaginationPatterns {
    fn instance() -> &'static Self {
        static PATTERNS: OnceLock<PaginationPatterns> = OnceLock::new();
        PATTERNS.get_or_init(Self::compile)
    }

    fn compile() -> Self {
        Self {
            limit: Regex::new(r"(?i)\bLIMIT\s+(\d+)").expect("Invalid limit pattern"),
            offset: Regex::new(r"(?i)\bOFFSET\s+(\d+)").expect("Invalid offset pattern"),
        }
    }
}

/// SQL with its LIMIT/OFFSET tokens removed and the values they carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedPagination {
    pub sql: String,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

fn take(pattern: &Regex, sql: &str) -> (String, Option<u64>) {
    let Some(captures) = pattern.captures(sql) else {
        return (sql.to_string(), None);
    };
    let value = captures.get(1).and_then(|m| m.as_str().parse().ok());
    (pattern.replace(sql, "").into_owned(), value)
}

/// Removes the first `LIMIT n` and `OFFSET n` tokens from a statement
pub fn strip_limit_offset(sql: &str) -> StrippedPagination {
    let patterns = PaginationPatterns::instance();
    let (sql, limit) = take(&patterns.limit, sql);
    let (sql, offset) = take(&patterns.offset, &sql);
    StrippedPagination {
        sql: if limit.is_some() || offset.is_some() {
            sql.trim_end().to_string()
        } else {
            sql
        },
        limit,
        offset,
    }
}

/// Applies offset then limit to fetched rows
pub fn slice_rows<T>(rows: Vec<T>, limit: Option<u64>, offset: Option<u64>) -> Vec<T> {
    let skip = offset.map_or(0, |o| usize::try_from(o).unwrap_or(usize::MAX));
    let iter = rows.into_iter().skip(skip);
    match limit {
        Some(limit) => iter
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect(),
        None => iter.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_first_limit() {
        assert_eq!(fetch_first_limit(None, None), "");
        assert_eq!(fetch_first_limit(Some(10), None), "FETCH FIRST 10 ROWS ONLY");
        assert_eq!(fetch_first_limit(None, Some(5)), "OFFSET 5");
        assert_eq!(fetch_first_limit(Some(10), Some(5)), "LIMIT 10 OFFSET 5");
        assert_eq!(fetch_first_limit(Some(5), Some(0)), "FETCH FIRST 5 ROWS ONLY");
        assert_eq!(fetch_first_limit(Some(0), None), "");
        assert_eq!(fetch_first_limit(Some(0), Some(3)), "OFFSET 3");
        assert_eq!(fetch_first_limit(Some(0), Some(0)), "");
    }

    #[test]
    fn test_strip_limit_offset() {
        let stripped = strip_limit_offset("SELECT * FROM T ORDER BY \"ID\" LIMIT 10 OFFSET 5");
        assert_eq!(stripped.sql, "SELECT * FROM T ORDER BY \"ID\"");
        assert_eq!(stripped.limit, Some(10));
        assert_eq!(stripped.offset, Some(5));

        let stripped = strip_limit_offset("SELECT * FROM T OFFSET 3");
        assert_eq!(stripped.sql, "SELECT * FROM T");
        assert_eq!(stripped.limit, None);
        assert_eq!(stripped.offset, Some(3));
    }

    #[test]
    fn test_strip_leaves_fetch_first_alone() {
        let sql = "SELECT * FROM T FETCH FIRST 2 ROWS ONLY";
        let stripped = strip_limit_offset(sql);
        assert_eq!(stripped.sql, sql);
        assert_eq!(stripped.limit, None);
        assert_eq!(stripped.offset, None);
    }

    #[test]
    fn test_strip_ignores_identifiers_containing_keywords() {
        let sql = "SELECT \"CREDIT_LIMIT\" FROM T";
        assert_eq!(strip_limit_offset(sql).sql, sql);
    }

    #[test]
    fn test_slice_rows() {
        let rows: Vec<u32> = (0..10).collect();
        assert_eq!(slice_rows(rows.clone(), Some(3), Some(2)), vec![2, 3, 4]);
        assert_eq!(slice_rows(rows.clone(), Some(3), None), vec![0, 1, 2]);
        assert_eq!(slice_rows(rows.clone(), None, Some(8)), vec![8, 9]);
        assert_eq!(slice_rows(rows.clone(), None, None).len(), 10);
        assert!(slice_rows(rows, Some(5), Some(20)).is_empty());
    }
}
