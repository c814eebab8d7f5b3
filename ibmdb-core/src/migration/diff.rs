//! Declared model vs. catalog snapshot.

use std::collections::BTreeSet;

use super::catalog::{CatalogColumn, CatalogIndex};
use super::{ColumnChange, DdlKind, DdlOperation, MigrationPlan};
use crate::builder::ddl::DeclaredIndex;
use crate::builder::statements::StatementBuilder;
use crate::dialect::SqlDialect;
use crate::models::PropertyDefinition;
use crate::Result;

fn find_column<'c>(columns: &'c [CatalogColumn], prop: &PropertyDefinition) -> Option<&'c CatalogColumn> {
    let name = prop.column_name();
    columns
        .iter()
        .find(|c| c.name == name)
        .or_else(|| columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
}

/// Column operations needed to bring the catalog in line with the model.
///
/// Only nullability is compared for existing columns. Id columns are never
/// touched.
pub fn column_changes<D: SqlDialect + ?Sized>(
    builder: &StatementBuilder<'_, D>,
    columns: &[CatalogColumn],
) -> Result<Vec<ColumnChange>> {
    let model = builder.model();
    let dialect = builder.dialect();
    let mut changes = Vec::new();

    for prop in model.properties.iter().filter(|p| !p.is_id()) {
        match find_column(columns, prop) {
            None => changes.push(ColumnChange::Add {
                column: builder.column(prop),
                definition: dialect.build_column_definition(prop)?,
            }),
            Some(actual) if actual.nullable != prop.is_nullable() => {
                changes.push(ColumnChange::Change {
                    column: builder.column(prop),
                    data_type: dialect.build_column_type(prop)?,
                    nullable: prop.is_nullable(),
                });
            }
            Some(_) => {}
        }
    }

    for actual in columns {
        let declared = model.properties.iter().any(|p| {
            p.column_name() == actual.name || p.column_name().eq_ignore_ascii_case(&actual.name)
        });
        if !declared {
            changes.push(ColumnChange::Drop {
                column: dialect.escape_name(&actual.name),
            });
        }
    }
    Ok(changes)
}

fn same_columns(declared: &DeclaredIndex, actual: &CatalogIndex) -> bool {
    declared.columns.len() == actual.columns.len()
        && declared
            .columns
            .iter()
            .zip(&actual.columns)
            .all(|(d, a)| d.order == a.order && d.name.eq_ignore_ascii_case(&a.name))
}

/// Builds the ordered DDL plan for one existing table.
///
/// Order: index drops, one `ALTER TABLE`, `REORG` after a change or drop,
/// index creation, then the primary key when the catalog has none.
pub fn alter_table<D: SqlDialect + ?Sized>(
    builder: &StatementBuilder<'_, D>,
    columns: &[CatalogColumn],
    indexes: &[CatalogIndex],
) -> Result<MigrationPlan> {
    let model = builder.model();
    let changes = column_changes(builder, columns)?;
    let declared = builder.declared_indexes();
    let secondary: Vec<&CatalogIndex> = indexes.iter().filter(|i| !i.is_primary()).collect();

    // Altered columns may participate in an index, so everything is rebuilt
    let (to_drop, to_create): (Vec<&CatalogIndex>, Vec<&DeclaredIndex>) = if changes.is_empty() {
        let stale: Vec<&CatalogIndex> = secondary
            .iter()
            .copied()
            .filter(|actual| {
                !declared
                    .iter()
                    .any(|d| d.name == actual.name && same_columns(d, actual))
            })
            .collect();
        let kept: BTreeSet<&str> = secondary
            .iter()
            .filter(|actual| !stale.iter().any(|s| s.name == actual.name))
            .map(|actual| actual.name.as_str())
            .collect();
        let missing = declared
            .iter()
            .filter(|d| !kept.contains(d.name.as_str()))
            .collect();
        (stale, missing)
    } else {
        (secondary, declared.iter().collect())
    };

    let mut operations = Vec::new();
    for index in to_drop {
        let schema = index.schema.as_deref().or(builder.schema());
        operations.push(DdlOperation::new(
            DdlKind::DropIndex,
            builder.build_drop_index(&index.name, schema),
        ));
    }

    if !changes.is_empty() {
        let clauses: Vec<String> = changes.iter().map(ColumnChange::to_sql).collect();
        operations.push(DdlOperation::new(
            DdlKind::AlterTable,
            format!("ALTER TABLE {} {}", builder.table(), clauses.join(" ")),
        ));
    }

    if changes.iter().any(ColumnChange::requires_reorg) {
        operations.push(DdlOperation::new(
            DdlKind::Reorg,
            format!(
                "CALL SYSPROC.ADMIN_CMD('REORG TABLE {}')",
                builder.table().replace('\'', "''")
            ),
        ));
    }

    for index in to_create {
        operations.push(DdlOperation::new(
            DdlKind::CreateIndex,
            builder.build_create_index(index),
        ));
    }

    if !indexes.iter().any(CatalogIndex::is_primary)
        && let Some(primary_key) = builder.build_primary_key_columns()
    {
        operations.push(DdlOperation::new(
            DdlKind::AddPrimaryKey,
            format!("ALTER TABLE {} ADD PRIMARY KEY({primary_key})", builder.table()),
        ));
    }

    Ok(MigrationPlan {
        model: model.name.clone(),
        column_changes: changes,
        operations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Db2Dialect;
    use crate::migration::catalog::UniqueRule;
    use crate::models::{
        IndexColumn, IndexDefinition, ModelDefinition, PropertyDefinition, PropertyIndex,
        PropertyType,
    };

    fn model() -> ModelDefinition {
        ModelDefinition::new(
            "Customer",
            vec![
                PropertyDefinition::new("id", PropertyType::Number)
                    .as_id()
                    .with_generated(true),
                PropertyDefinition::new("name", PropertyType::String).with_required(true),
                PropertyDefinition::new("email", PropertyType::String).with_index(
                    PropertyIndex::Options {
                        unique: true,
                        kind: None,
                    },
                ),
            ],
        )
        .with_table("CUSTOMER")
    }

    fn column(name: &str, nullable: bool) -> CatalogColumn {
        CatalogColumn {
            name: name.to_string(),
            data_type: "VARCHAR".to_string(),
            position: 0,
            length: Some(512),
            nullable,
        }
    }

    fn primary() -> CatalogIndex {
        CatalogIndex {
            name: "SQL2301".to_string(),
            schema: Some("STORE".to_string()),
            columns: vec![IndexColumn::asc("id")],
            rule: UniqueRule::Primary,
        }
    }

    fn email_index() -> CatalogIndex {
        CatalogIndex {
            name: "email".to_string(),
            schema: Some("STORE".to_string()),
            columns: vec![IndexColumn::asc("email")],
            rule: UniqueRule::Unique,
        }
    }

    fn in_sync() -> Vec<CatalogColumn> {
        vec![column("id", false), column("name", false), column("email", true)]
    }

    #[test]
    fn test_in_sync_table_has_empty_plan() {
        let model = model();
        let dialect = Db2Dialect::new();
        let builder = StatementBuilder::new(&dialect, &model, Some("STORE"));
        let plan = alter_table(&builder, &in_sync(), &[primary(), email_index()]).expect("plan");
        assert!(plan.is_empty(), "unexpected plan: {plan:?}");
    }

    #[test]
    fn test_nullability_change_is_one_change_column() {
        let model = model();
        let dialect = Db2Dialect::new();
        let builder = StatementBuilder::new(&dialect, &model, Some("STORE"));
        let columns = vec![column("id", false), column("name", true), column("email", true)];
        let plan = alter_table(&builder, &columns, &[primary(), email_index()]).expect("plan");

        assert_eq!(
            plan.column_changes,
            vec![ColumnChange::Change {
                column: "\"name\"".to_string(),
                data_type: "VARCHAR(512)".to_string(),
                nullable: false,
            }]
        );
        assert_eq!(
            plan.statements(),
            vec![
                "DROP INDEX STORE.\"email\"",
                "ALTER TABLE STORE.\"CUSTOMER\" ALTER COLUMN \"name\" SET DATA TYPE VARCHAR(512) \
                 ALTER COLUMN \"name\" SET NOT NULL",
                "CALL SYSPROC.ADMIN_CMD('REORG TABLE STORE.\"CUSTOMER\"')",
                "CREATE UNIQUE INDEX \"email\" ON STORE.\"CUSTOMER\" (\"email\")",
            ]
        );
    }

    #[test]
    fn test_model_only_column_is_one_add_column() {
        let model = model();
        let dialect = Db2Dialect::new();
        let builder = StatementBuilder::new(&dialect, &model, Some("STORE"));
        let columns = vec![column("id", false), column("name", false)];
        let plan = alter_table(&builder, &columns, &[primary()]).expect("plan");

        assert_eq!(plan.count(DdlKind::AlterTable), 1);
        assert_eq!(
            plan.column_changes,
            vec![ColumnChange::Add {
                column: "\"email\"".to_string(),
                definition: "VARCHAR(512)".to_string(),
            }]
        );
        assert_eq!(plan.count(DdlKind::Reorg), 0);
        assert_eq!(plan.count(DdlKind::CreateIndex), 1);
    }

    #[test]
    fn test_catalog_only_column_is_one_drop_column() {
        let model = model();
        let dialect = Db2Dialect::new();
        let builder = StatementBuilder::new(&dialect, &model, Some("STORE"));
        let mut columns = in_sync();
        columns.push(column("LEGACY", true));
        let plan = alter_table(&builder, &columns, &[primary(), email_index()]).expect("plan");

        assert_eq!(
            plan.column_changes,
            vec![ColumnChange::Drop {
                column: "\"LEGACY\"".to_string()
            }]
        );
        assert!(plan.statements()[1].ends_with("DROP COLUMN \"LEGACY\""));
        assert_eq!(plan.count(DdlKind::Reorg), 1);
    }

    #[test]
    fn test_stale_index_replaced_without_column_changes() {
        let model = model().with_index(
            "customer_name_idx",
            IndexDefinition::new(vec![IndexColumn::asc("name"), IndexColumn::desc("email")]),
        );
        let dialect = Db2Dialect::new();
        let builder = StatementBuilder::new(&dialect, &model, Some("STORE"));
        let outdated = CatalogIndex {
            name: "customer_name_idx".to_string(),
            schema: Some("STORE".to_string()),
            columns: vec![IndexColumn::asc("name")],
            rule: UniqueRule::Duplicates,
        };
        let undeclared = CatalogIndex {
            name: "OLD_IDX".to_string(),
            schema: Some("STORE".to_string()),
            columns: vec![IndexColumn::asc("name")],
            rule: UniqueRule::Duplicates,
        };
        let plan = alter_table(
            &builder,
            &in_sync(),
            &[primary(), email_index(), outdated, undeclared],
        )
        .expect("plan");

        assert!(plan.column_changes.is_empty());
        assert_eq!(
            plan.statements(),
            vec![
                "DROP INDEX STORE.\"customer_name_idx\"",
                "DROP INDEX STORE.\"OLD_IDX\"",
                "CREATE INDEX \"customer_name_idx\" ON STORE.\"CUSTOMER\" (\"name\",\"email\" DESC)",
            ]
        );
    }

    #[test]
    fn test_primary_key_added_last_when_missing() {
        let model = model();
        let dialect = Db2Dialect::new();
        let builder = StatementBuilder::new(&dialect, &model, Some("STORE"));
        let plan = alter_table(&builder, &in_sync(), &[email_index()]).expect("plan");
        assert_eq!(
            plan.statements(),
            vec!["ALTER TABLE STORE.\"CUSTOMER\" ADD PRIMARY KEY(\"id\")"]
        );
    }
}
