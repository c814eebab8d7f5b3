//! Catalog snapshot queries against `SYSCAT`.

use serde::{Deserialize, Serialize};

use crate::driver::RowExt;
use crate::models::IndexColumn;
use crate::value::Row;
use crate::Result;

const COLUMNS_VIEW: &str = "SYSCAT.COLUMNS";
const INDEXES_VIEW: &str = "SYSCAT.INDEXES";

/// One row of `SYSCAT.COLUMNS`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogColumn {
    pub name: String,
    pub data_type: String,
    pub position: i64,
    pub length: Option<i64>,
    pub nullable: bool,
}

/// `UNIQUERULE` of a catalog index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UniqueRule {
    /// `P`: implements the primary key
    Primary,
    /// `U`: unique index
    Unique,
    /// `D`: duplicates allowed
    Duplicates,
}

impl UniqueRule {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "P" => Self::Primary,
            "U" => Self::Unique,
            _ => Self::Duplicates,
        }
    }
}

/// One row of `SYSCAT.INDEXES`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogIndex {
    pub name: String,
    pub schema: Option<String>,
    pub columns: Vec<IndexColumn>,
    pub rule: UniqueRule,
}

impl CatalogIndex {
    pub fn is_primary(&self) -> bool {
        self.rule == UniqueRule::Primary
    }
}

fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn table_filter(table: &str, schema: Option<&str>) -> String {
    let schema_filter = match schema.filter(|s| !s.is_empty()) {
        Some(schema) => format!("TRIM(TABSCHEMA) LIKE '{}'", quote_literal(schema)),
        None => "TRIM(TABSCHEMA) = CURRENT SCHEMA".to_string(),
    };
    format!(
        "WHERE TRIM(TABNAME) LIKE '{}' AND {schema_filter}",
        quote_literal(table)
    )
}

/// Column listing for one table, ordered by column number
pub fn show_fields_sql(table: &str, schema: Option<&str>) -> String {
    format!(
        "SELECT COLNAME AS NAME, TYPENAME AS DATATYPE, COLNO, LENGTH AS DATALENGTH, NULLS \
         FROM {COLUMNS_VIEW} {} ORDER BY COLNO",
        table_filter(table, schema)
    )
}

/// Index listing for one table
pub fn show_indexes_sql(table: &str, schema: Option<&str>) -> String {
    format!(
        "SELECT TABNAME, TABSCHEMA, INDNAME, COLNAMES, UNIQUERULE FROM {INDEXES_VIEW} {}",
        table_filter(table, schema)
    )
}

pub fn parse_columns(rows: &[Row]) -> Result<Vec<CatalogColumn>> {
    rows.iter()
        .map(|row| {
            let context = Some(COLUMNS_VIEW);
            Ok(CatalogColumn {
                name: row.get_text("NAME", context)?.trim().to_string(),
                data_type: row.get_text("DATATYPE", context)?.trim().to_string(),
                position: row.get_i64("COLNO", context)?,
                length: row
                    .get_opt_text("DATALENGTH", context)?
                    .and_then(|l| l.trim().parse().ok()),
                nullable: row.get_text("NULLS", context)?.trim() != "N",
            })
        })
        .collect()
}

/// Splits `COLNAMES` such as `+NAME-CREATED` into ordered columns
pub fn parse_column_names(colnames: &str) -> Vec<IndexColumn> {
    let mut columns = Vec::new();
    let mut current: Option<(bool, String)> = None;
    for ch in colnames.trim().chars() {
        match ch {
            '+' | '-' => {
                if let Some((descending, name)) = current.take() {
                    columns.push(index_column(descending, name));
                }
                current = Some((ch == '-', String::new()));
            }
            _ => {
                if let Some((_, name)) = current.as_mut() {
                    name.push(ch);
                }
            }
        }
    }
    if let Some((descending, name)) = current {
        columns.push(index_column(descending, name));
    }
    columns.retain(|c| !c.name.is_empty());
    columns
}

fn index_column(descending: bool, name: String) -> IndexColumn {
    let name = name.trim().to_string();
    if descending {
        IndexColumn::desc(name)
    } else {
        IndexColumn::asc(name)
    }
}

pub fn parse_indexes(rows: &[Row]) -> Result<Vec<CatalogIndex>> {
    rows.iter()
        .map(|row| {
            let context = Some(INDEXES_VIEW);
            Ok(CatalogIndex {
                name: row.get_text("INDNAME", context)?.trim().to_string(),
                schema: row
                    .get_opt_text("TABSCHEMA", context)?
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                columns: parse_column_names(&row.get_text("COLNAMES", context)?),
                rule: UniqueRule::from_code(&row.get_text("UNIQUERULE", context)?),
            })
        })
        .collect()
}
