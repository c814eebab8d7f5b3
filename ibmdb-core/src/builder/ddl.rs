//! Table and index DDL.

use super::statements::StatementBuilder;
use crate::dialect::SqlDialect;
use crate::models::{IndexColumn, SortOrder};
use crate::Result;

/// An index the model declares, with property names resolved to columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredIndex {
    pub name: String,
    pub columns: Vec<IndexColumn>,
    pub unique: bool,
    pub kind: Option<String>,
}

impl DeclaredIndex {
    /// Column names in index order, ignoring direction
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

impl<D: SqlDialect + ?Sized> StatementBuilder<'_, D> {
    /// Property-level indexes (named after their column) followed by
    /// model-level indexes
    pub fn declared_indexes(&self) -> Vec<DeclaredIndex> {
        let model = self.model();
        let mut indexes: Vec<DeclaredIndex> = model
            .properties
            .iter()
            .filter(|p| p.has_index())
            .map(|p| {
                let index = p.index.as_ref();
                DeclaredIndex {
                    name: p.column_name().to_string(),
                    columns: vec![IndexColumn::asc(p.column_name())],
                    unique: index.is_some_and(|i| i.is_unique()),
                    kind: index.and_then(|i| i.kind()).map(str::to_string),
                }
            })
            .collect();

        indexes.extend(model.indexes.iter().map(|(name, index)| DeclaredIndex {
            name: name.clone(),
            columns: index
                .columns
                .iter()
                .map(|c| IndexColumn {
                    name: model
                        .property(&c.name)
                        .map_or_else(|| c.name.clone(), |p| p.column_name().to_string()),
                    order: c.order,
                })
                .collect(),
            unique: index.unique,
            kind: index.kind.clone(),
        }));
        indexes
    }

    /// `CREATE [UNIQUE|kind] INDEX "name" ON schema."T" ("A","B" DESC)`
    pub fn build_create_index(&self, index: &DeclaredIndex) -> String {
        let dialect = self.dialect();
        let qualifier = match (&index.kind, index.unique) {
            (Some(kind), _) => format!("{kind} "),
            (None, true) => "UNIQUE ".to_string(),
            (None, false) => String::new(),
        };
        let columns: Vec<String> = index
            .columns
            .iter()
            .map(|c| match c.order {
                SortOrder::Asc => dialect.escape_name(&c.name),
                SortOrder::Desc => format!("{} DESC", dialect.escape_name(&c.name)),
            })
            .collect();
        format!(
            "CREATE {qualifier}INDEX {} ON {} ({})",
            dialect.escape_name(&index.name),
            self.table(),
            columns.join(",")
        )
    }

    /// `DROP INDEX schema."name"`
    pub fn build_drop_index(&self, name: &str, schema: Option<&str>) -> String {
        let escaped = self.dialect().escape_name(name);
        match schema.filter(|s| !s.is_empty()) {
            Some(schema) => format!("DROP INDEX {schema}.{escaped}"),
            None => format!("DROP INDEX {escaped}"),
        }
    }

    /// `CREATE TABLE` with every column definition and the primary key
    pub fn build_create_table(&self) -> Result<String> {
        let model = self.model();
        let mut definitions = Vec::with_capacity(model.properties.len() + 1);
        for prop in &model.properties {
            definitions.push(format!(
                "{} {}",
                self.column(prop),
                self.dialect().build_column_definition(prop)?
            ));
        }
        if let Some(primary_key) = self.build_primary_key_columns() {
            definitions.push(format!("PRIMARY KEY({primary_key})"));
        }
        Ok(format!(
            "CREATE TABLE {} ({})",
            self.table(),
            definitions.join(",\n")
        ))
    }

    /// Comma separated id columns, if the model has ids
    pub fn build_primary_key_columns(&self) -> Option<String> {
        let ids = self.model().id_properties();
        if ids.is_empty() {
            return None;
        }
        Some(
            ids.iter()
                .map(|p| self.column(p))
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    pub fn build_drop_table(&self) -> String {
        format!("DROP TABLE {}", self.table())
    }

    /// Statements creating every declared index
    pub fn build_indexes(&self) -> Vec<String> {
        self.declared_indexes()
            .iter()
            .map(|index| self.build_create_index(index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Db2Dialect;
    use crate::models::{
        IndexDefinition, ModelDefinition, PropertyDefinition, PropertyIndex, PropertyType,
    };

    fn model() -> ModelDefinition {
        ModelDefinition::new(
            "Account",
            vec![
                PropertyDefinition::new("id", PropertyType::Number)
                    .as_id()
                    .with_generated(true),
                PropertyDefinition::new("email", PropertyType::String)
                    .with_required(true)
                    .with_length(120)
                    .with_index(PropertyIndex::Options {
                        unique: true,
                        kind: None,
                    }),
                PropertyDefinition::new("created", PropertyType::Date),
            ],
        )
        .with_table("ACCOUNT")
        .with_index(
            "account_created_idx",
            IndexDefinition::new(vec![IndexColumn::desc("created"), IndexColumn::asc("email")]),
        )
    }

    #[test]
    fn test_create_table() {
        let model = model();
        let dialect = Db2Dialect::new();
        let builder = StatementBuilder::new(&dialect, &model, Some("APP"));
        let sql = builder.build_create_table().expect("ok");
        assert_eq!(
            sql,
            "CREATE TABLE APP.\"ACCOUNT\" (\"id\" INT NOT NULL GENERATED BY DEFAULT AS IDENTITY (START WITH 1 INCREMENT BY 1),\n\
             \"email\" VARCHAR(120) NOT NULL,\n\
             \"created\" TIMESTAMP,\n\
             PRIMARY KEY(\"id\"))"
        );
    }

    #[test]
    fn test_indexes() {
        let model = model();
        let dialect = Db2Dialect::new();
        let builder = StatementBuilder::new(&dialect, &model, Some("APP"));
        assert_eq!(
            builder.build_indexes(),
            vec![
                "CREATE UNIQUE INDEX \"email\" ON APP.\"ACCOUNT\" (\"email\")".to_string(),
                "CREATE INDEX \"account_created_idx\" ON APP.\"ACCOUNT\" (\"created\" DESC,\"email\")"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_index_kind_wins_over_unique() {
        let mut model = model();
        model.indexes.insert(
            "k".to_string(),
            IndexDefinition {
                columns: vec![IndexColumn::asc("email")],
                unique: true,
                kind: Some("UNIQUE".to_string()),
            },
        );
        let dialect = Db2Dialect::new();
        let builder = StatementBuilder::new(&dialect, &model, None);
        let index = builder
            .declared_indexes()
            .into_iter()
            .find(|i| i.name == "k")
            .expect("declared");
        assert_eq!(
            builder.build_create_index(&index),
            "CREATE UNIQUE INDEX \"k\" ON \"ACCOUNT\" (\"email\")"
        );
    }

    #[test]
    fn test_drop_statements() {
        let model = model();
        let dialect = Db2Dialect::new();
        let builder = StatementBuilder::new(&dialect, &model, Some("APP"));
        assert_eq!(builder.build_drop_table(), "DROP TABLE APP.\"ACCOUNT\"");
        assert_eq!(
            builder.build_drop_index("OLD_IDX", Some("APP")),
            "DROP INDEX APP.\"OLD_IDX\""
        );
    }
}
