//! Schema migration: catalog snapshot, diff and ordered DDL plans.
//!
//! A plan is computed from the declared model and what `SYSCAT` reports for
//! the live table. Plans can be inspected without running them (`check_only`)
//! or applied statement by statement, stopping at the first failure.

use serde::Serialize;

use crate::driver::{Connection, Statement};
use crate::Result;

pub mod catalog;
pub mod diff;

pub use catalog::{CatalogColumn, CatalogIndex, UniqueRule};
pub use diff::alter_table;

/// Kind of a planned DDL statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DdlKind {
    CreateTable,
    DropTable,
    DropIndex,
    AlterTable,
    Reorg,
    CreateIndex,
    AddPrimaryKey,
}

/// One planned DDL statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DdlOperation {
    pub kind: DdlKind,
    pub sql: String,
}

impl DdlOperation {
    pub fn new(kind: DdlKind, sql: impl Into<String>) -> Self {
        Self {
            kind,
            sql: sql.into(),
        }
    }
}

/// A column clause inside the single `ALTER TABLE` of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ColumnChange {
    Add {
        column: String,
        definition: String,
    },
    /// Re-declares type and nullability
    Change {
        column: String,
        data_type: String,
        nullable: bool,
    },
    Drop {
        column: String,
    },
}

impl ColumnChange {
    pub fn to_sql(&self) -> String {
        match self {
            Self::Add { column, definition } => format!("ADD COLUMN {column} {definition}"),
            Self::Change {
                column,
                data_type,
                nullable,
            } => {
                let null_clause = if *nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
                format!(
                    "ALTER COLUMN {column} SET DATA TYPE {data_type} ALTER COLUMN {column} {null_clause}"
                )
            }
            Self::Drop { column } => format!("DROP COLUMN {column}"),
        }
    }

    /// DB2 leaves the table in reorg-pending state after these
    pub fn requires_reorg(&self) -> bool {
        matches!(self, Self::Change { .. } | Self::Drop { .. })
    }
}

/// Ordered DDL for one model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    pub model: String,
    pub column_changes: Vec<ColumnChange>,
    pub operations: Vec<DdlOperation>,
}

impl MigrationPlan {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, kind: DdlKind, sql: impl Into<String>) {
        self.operations.push(DdlOperation::new(kind, sql));
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn statements(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.sql.as_str()).collect()
    }

    /// Number of operations of one kind
    pub fn count(&self, kind: DdlKind) -> usize {
        self.operations.iter().filter(|op| op.kind == kind).count()
    }

    /// Runs every statement in order and returns how many ran.
    ///
    /// The first failing statement aborts the rest.
    pub async fn apply(&self, conn: &mut dyn Connection) -> Result<usize> {
        for (position, operation) in self.operations.iter().enumerate() {
            tracing::debug!(
                "Migrating {} ({}/{}): {}",
                self.model,
                position + 1,
                self.operations.len(),
                operation.sql
            );
            if let Err(error) = conn
                .query(&Statement::new(operation.sql.clone(), Vec::new()).without_results())
                .await
            {
                tracing::warn!(
                    "Migration of {} stopped at statement {}: {}",
                    self.model,
                    position + 1,
                    error
                );
                return Err(error);
            }
        }
        Ok(self.operations.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Driver;
    use crate::driver::scripted::ScriptedDriver;

    #[test]
    fn test_column_change_sql() {
        let add = ColumnChange::Add {
            column: "\"A\"".to_string(),
            definition: "INTEGER NOT NULL".to_string(),
        };
        assert_eq!(add.to_sql(), "ADD COLUMN \"A\" INTEGER NOT NULL");
        assert!(!add.requires_reorg());

        let relax = ColumnChange::Change {
            column: "\"A\"".to_string(),
            data_type: "INTEGER".to_string(),
            nullable: true,
        };
        assert_eq!(
            relax.to_sql(),
            "ALTER COLUMN \"A\" SET DATA TYPE INTEGER ALTER COLUMN \"A\" DROP NOT NULL"
        );
        assert!(relax.requires_reorg());
    }

    #[tokio::test]
    async fn test_apply_stops_at_first_failure() {
        let driver = ScriptedDriver::new();
        driver.fail("ALTER TABLE", "SQL0668N reorg pending", Some("57016"));
        let mut plan = MigrationPlan::new("Customer");
        plan.push(DdlKind::DropIndex, "DROP INDEX S.\"I\"");
        plan.push(DdlKind::AlterTable, "ALTER TABLE S.\"T\" DROP COLUMN \"X\"");
        plan.push(DdlKind::CreateIndex, "CREATE INDEX \"I\" ON S.\"T\" (\"A\")");

        let mut conn = driver.open("DSN=x").await.expect("open");
        let error = plan.apply(conn.as_mut()).await.expect_err("alter fails");
        assert_eq!(error.sqlstate(), Some("57016"));
        assert_eq!(
            driver.statements(),
            vec![
                "DROP INDEX S.\"I\"".to_string(),
                "ALTER TABLE S.\"T\" DROP COLUMN \"X\"".to_string(),
            ]
        );
    }
}
