//! DML statement builders bound to one model and schema.

use super::{Filter, Where, where_clause};
use crate::dialect::{ColumnValue, SqlDialect};
use crate::error::IbmDbError;
use crate::models::{ModelDefinition, PropertyDefinition, SortOrder};
use crate::sql::ParameterizedSql;
use crate::value::{ModelData, ModelValue, Row};
use crate::Result;

/// Column label used for counting statements
pub const COUNT_COLUMN: &str = "CNT";
/// Column label used for affected-row counts
pub const AFFECTED_ROWS_COLUMN: &str = "affectedRows";

/// Builds statements for one model through a dialect.
///
/// # Example
/// ```rust
/// use ibmdb_core::builder::statements::StatementBuilder;
/// use ibmdb_core::dialect::Db2Dialect;
/// use ibmdb_core::models::{ModelDefinition, PropertyDefinition, PropertyType};
///
/// let model = ModelDefinition::new(
///     "Item",
///     vec![PropertyDefinition::new("id", PropertyType::Number).as_id()],
/// );
/// let dialect = Db2Dialect::new();
/// let builder = StatementBuilder::new(&dialect, &model, Some("STORE"));
/// assert_eq!(builder.table(), "STORE.\"Item\"");
/// ```
pub struct StatementBuilder<'a, D: SqlDialect + ?Sized> {
    dialect: &'a D,
    model: &'a ModelDefinition,
    schema: Option<&'a str>,
}

impl<'a, D: SqlDialect + ?Sized> StatementBuilder<'a, D> {
    pub fn new(dialect: &'a D, model: &'a ModelDefinition, schema: Option<&'a str>) -> Self {
        Self {
            dialect,
            model,
            schema: schema.filter(|s| !s.is_empty()),
        }
    }

    pub fn model(&self) -> &'a ModelDefinition {
        self.model
    }

    pub fn dialect(&self) -> &'a D {
        self.dialect
    }

    pub fn schema(&self) -> Option<&'a str> {
        self.schema
    }

    /// `schema."TABLE"`; the schema is not quoted
    pub fn table(&self) -> String {
        let table = self.dialect.escape_name(self.model.table_name());
        match self.schema {
            Some(schema) => format!("{schema}.{table}"),
            None => table,
        }
    }

    pub fn column(&self, prop: &PropertyDefinition) -> String {
        self.dialect.escape_name(prop.column_name())
    }

    /// Escaped column for a property name; unknown names are escaped as is
    pub fn column_for(&self, property: &str) -> String {
        self.model
            .property(property)
            .map_or_else(|| self.dialect.escape_name(property), |p| self.column(p))
    }

    fn id_column(&self) -> Result<String> {
        self.model
            .id_property()
            .map(|p| self.column(p))
            .ok_or_else(|| {
                IbmDbError::configuration(format!("model '{}' has no id property", self.model.name))
            })
    }

    /// Marshalled `(column, value)` pairs for the declared properties present
    /// in `data`, in declaration order
    pub fn build_fields(
        &self,
        data: &ModelData,
        exclude_ids: bool,
    ) -> Result<Vec<(String, ColumnValue)>> {
        let mut fields = Vec::new();
        for prop in &self.model.properties {
            if exclude_ids && prop.is_id() {
                continue;
            }
            if let Some(value) = data.get(&prop.name) {
                fields.push((
                    self.column(prop),
                    self.dialect.to_column_value(Some(prop), value)?,
                ));
            }
        }
        Ok(fields)
    }

    /// `WHERE` matching the id properties of `data`
    pub fn id_where(&self, data: &ModelData) -> Result<Where> {
        let ids = self.model.id_properties();
        if ids.is_empty() {
            return Err(IbmDbError::configuration(format!(
                "model '{}' has no id property",
                self.model.name
            )));
        }
        let mut conditions = Vec::with_capacity(ids.len());
        for prop in ids {
            let value = data.get(&prop.name).filter(|v| !v.is_null()).ok_or_else(|| {
                IbmDbError::configuration(format!(
                    "id property '{}' of model '{}' has no value",
                    prop.name, self.model.name
                ))
            })?;
            conditions.push(Where::eq(prop.name.clone(), value.clone()));
        }
        Ok(if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Where::And(conditions)
        })
    }

    pub fn build_where(&self, filter: Option<&Where>) -> Result<ParameterizedSql> {
        where_clause::build_where(self.dialect, self.model, filter)
    }

    /// `INSERT INTO t VALUES(DEFAULT,...)`, one `DEFAULT` per property
    pub fn build_insert_default_values(&self) -> ParameterizedSql {
        let defaults = vec!["DEFAULT"; self.model.properties.len().max(1)].join(",");
        ParameterizedSql::new(format!("INSERT INTO {} VALUES({defaults})", self.table()))
    }

    pub fn build_insert(&self, data: &ModelData) -> Result<ParameterizedSql> {
        let fields = self.build_fields(data, false)?;
        if fields.is_empty() {
            return Ok(self.build_insert_default_values());
        }
        let (columns, values): (Vec<_>, Vec<_>) = fields.into_iter().unzip();
        let values = ParameterizedSql::join(values.into_iter().map(ColumnValue::into_fragment), ",");
        Ok(ParameterizedSql::new(format!(
            "INSERT INTO {} ({}) VALUES(",
            self.table(),
            columns.join(",")
        ))
        .merge_with(values, "")
        .merge_with(")", ""))
    }

    /// Insert wrapped in `FINAL TABLE` so the generated id comes back
    pub fn build_insert_returning_id(&self, data: &ModelData) -> Result<ParameterizedSql> {
        let id = self.id_column()?;
        let insert = self.build_insert(data)?;
        Ok(ParameterizedSql::new(format!("SELECT {id} FROM FINAL TABLE ("))
            .merge_with(insert, "")
            .merge_with(")", ""))
    }

    /// `UPDATE ... SET` for non-id fields; `None` when nothing is assignable
    pub fn build_update(
        &self,
        filter: Option<&Where>,
        data: &ModelData,
    ) -> Result<Option<ParameterizedSql>> {
        let fields = self.build_fields(data, true)?;
        if fields.is_empty() {
            return Ok(None);
        }
        let assignments = ParameterizedSql::join(
            fields.into_iter().map(|(column, value)| {
                ParameterizedSql::new(format!("{column}=")).merge_with(value.into_fragment(), "")
            }),
            ",",
        );
        Ok(Some(
            ParameterizedSql::new(format!("UPDATE {} SET", self.table()))
                .merge(assignments)
                .merge(self.build_where(filter)?),
        ))
    }

    pub fn build_delete(&self, filter: Option<&Where>) -> Result<ParameterizedSql> {
        Ok(ParameterizedSql::new(format!("DELETE FROM {}", self.table()))
            .merge(self.build_where(filter)?))
    }

    /// `SELECT COUNT(*) AS CNT FROM ...`
    pub fn build_count(&self, filter: Option<&Where>) -> Result<ParameterizedSql> {
        Ok(ParameterizedSql::new(format!(
            "SELECT COUNT(*) AS {COUNT_COLUMN} FROM {}",
            self.table()
        ))
        .merge(self.build_where(filter)?))
    }

    /// Selects only the id column of matching rows
    pub fn build_select_id(&self, filter: Option<&Where>) -> Result<ParameterizedSql> {
        Ok(ParameterizedSql::new(format!(
            "SELECT {} FROM {}",
            self.id_column()?,
            self.table()
        ))
        .merge(self.build_where(filter)?))
    }

    /// Update reporting its affected-row count through `FINAL TABLE`
    pub fn build_update_counting(
        &self,
        filter: Option<&Where>,
        data: &ModelData,
    ) -> Result<Option<ParameterizedSql>> {
        Ok(self.build_update(filter, data)?.map(|update| {
            ParameterizedSql::new(format!(
                "SELECT COUNT(*) AS \"{AFFECTED_ROWS_COLUMN}\" FROM FINAL TABLE ("
            ))
            .merge_with(update, "")
            .merge_with(")", "")
        }))
    }

    /// Delete reporting its affected-row count through `OLD TABLE`
    pub fn build_delete_counting(&self, filter: Option<&Where>) -> Result<ParameterizedSql> {
        Ok(ParameterizedSql::new(format!(
            "SELECT COUNT(*) AS \"{AFFECTED_ROWS_COLUMN}\" FROM OLD TABLE ("
        ))
        .merge_with(self.build_delete(filter)?, "")
        .merge_with(")", ""))
    }

    fn build_order(&self, filter: &Filter) -> String {
        let columns: Vec<String> = filter
            .order
            .iter()
            .filter_map(|order| {
                let Some(prop) = self.model.property(&order.property) else {
                    tracing::debug!(
                        "Skipping unknown order property '{}' for model {}",
                        order.property,
                        self.model.name
                    );
                    return None;
                };
                let direction = match order.order {
                    SortOrder::Asc => "ASC",
                    SortOrder::Desc => "DESC",
                };
                Some(format!("{} {direction}", self.column(prop)))
            })
            .collect();
        if columns.is_empty() {
            String::new()
        } else {
            format!("ORDER BY {}", columns.join(","))
        }
    }

    pub fn build_select(&self, filter: &Filter) -> Result<ParameterizedSql> {
        let selected: Vec<String> = match &filter.fields {
            Some(fields) => self
                .model
                .properties
                .iter()
                .filter(|p| fields.contains(&p.name))
                .map(|p| self.column(p))
                .collect(),
            None => self.model.properties.iter().map(|p| self.column(p)).collect(),
        };
        let projection = if selected.is_empty() {
            "*".to_string()
        } else {
            selected.join(",")
        };

        Ok(ParameterizedSql::new(format!(
            "SELECT {projection} FROM {}",
            self.table()
        ))
        .merge(self.build_where(filter.where_clause.as_ref())?)
        .merge(self.build_order(filter))
        .merge(self.dialect.build_limit(filter.limit, filter.offset)))
    }

    /// Converts a result row into model data, keyed by property name.
    ///
    /// Columns are matched to properties by column name, falling back to a
    /// case-insensitive match; unmatched columns keep their label.
    pub fn from_row(&self, row: &Row) -> Result<ModelData> {
        let mut data = ModelData::new();
        for (label, value) in row {
            let prop = self.model.property_by_column(label).or_else(|| {
                self.model
                    .properties
                    .iter()
                    .find(|p| p.column_name().eq_ignore_ascii_case(label))
            });
            let key = prop.map_or_else(|| label.clone(), |p| p.name.clone());
            data.insert(key, self.dialect.from_column_value(prop, value)?);
        }
        Ok(data)
    }
}

/// Reads an integer count column from the first row
pub fn first_count(rows: &[Row], column: &str) -> u64 {
    rows.first()
        .and_then(|row| {
            row.get(column).or_else(|| {
                row.iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(column))
                    .map(|(_, v)| v)
            })
        })
        .and_then(|value| value.as_i64())
        .map_or(0, |count| u64::try_from(count).unwrap_or(0))
}

/// Id value carried by a model instance, for messages
pub fn describe_id(model: &ModelDefinition, data: &ModelData) -> String {
    model
        .id_property()
        .and_then(|p| data.get(&p.name))
        .map_or_else(|| "undefined".to_string(), ModelValue::to_string)
}
