//! Create, read, count, bulk update and bulk delete.

use super::{Db2Connector, Transaction};
use crate::builder::statements::{AFFECTED_ROWS_COLUMN, COUNT_COLUMN, first_count};
use crate::builder::{Filter, Where};
use crate::dialect::SqlDialect;
use crate::driver::Connection;
use crate::error::IbmDbError;
use crate::models::ModelDefinition;
use crate::value::{ModelData, ModelValue};
use crate::Result;

impl Db2Connector {
    /// Inserts one row, reading a generated id back through `FINAL TABLE`
    pub(crate) async fn insert(
        &self,
        conn: &mut dyn Connection,
        model: &ModelDefinition,
        mut data: ModelData,
    ) -> Result<ModelData> {
        let builder = self.builder(model);
        let generated_id = model
            .id_property()
            .filter(|p| p.generated && data.get(&p.name).is_none_or(ModelValue::is_null));

        match generated_id {
            Some(id) => {
                let rows = self
                    .run(conn, builder.build_insert_returning_id(&data)?, false)
                    .await?;
                if let Some(value) = rows.first().and_then(|row| row.values().next()) {
                    data.insert(
                        id.name.clone(),
                        self.dialect.from_column_value(Some(id), value)?,
                    );
                }
            }
            None => {
                self.run(conn, builder.build_insert(&data)?, true).await?;
            }
        }
        Ok(data)
    }

    /// Creates a model instance and returns it with its id
    pub async fn create(
        &self,
        model: &str,
        data: ModelData,
        transaction: Option<&mut Transaction>,
    ) -> Result<ModelData> {
        let model = self.model(model)?;
        let mut scope = self.scope(transaction).await?;
        let result = match scope.connection() {
            Ok(conn) => self.insert(conn, model, data).await,
            Err(error) => Err(error),
        };
        scope.finish(result).await
    }

    /// Rows matching a filter, converted to model data
    pub async fn find(
        &self,
        model: &str,
        filter: &Filter,
        transaction: Option<&mut Transaction>,
    ) -> Result<Vec<ModelData>> {
        let model = self.model(model)?;
        let builder = self.builder(model);
        let stmt = builder.build_select(filter)?;
        let mut scope = self.scope(transaction).await?;
        let result = match scope.connection() {
            Ok(conn) => self.run(conn, stmt, false).await,
            Err(error) => Err(error),
        };
        let rows = scope.finish(result).await?;
        rows.iter().map(|row| builder.from_row(row)).collect()
    }

    /// The instance with the given id, if any
    pub async fn find_by_id(
        &self,
        model: &str,
        id: impl Into<ModelValue>,
        transaction: Option<&mut Transaction>,
    ) -> Result<Option<ModelData>> {
        let definition = self.model(model)?;
        let id_property = definition.id_property().ok_or_else(|| {
            IbmDbError::configuration(format!("model '{model}' has no id property"))
        })?;
        let filter = Filter::new()
            .with_where(Where::eq(id_property.name.clone(), id))
            .with_limit(1);
        Ok(self
            .find(model, &filter, transaction)
            .await?
            .into_iter()
            .next())
    }

    pub async fn count(
        &self,
        model: &str,
        filter: Option<&Where>,
        transaction: Option<&mut Transaction>,
    ) -> Result<u64> {
        let model = self.model(model)?;
        let stmt = self.builder(model).build_count(filter)?;
        let mut scope = self.scope(transaction).await?;
        let result = match scope.connection() {
            Ok(conn) => self.run(conn, stmt, false).await,
            Err(error) => Err(error),
        };
        let rows = scope.finish(result).await?;
        Ok(first_count(&rows, COUNT_COLUMN))
    }

    /// Updates every matching row and returns how many changed
    pub async fn update_all(
        &self,
        model: &str,
        filter: Option<&Where>,
        data: &ModelData,
        transaction: Option<&mut Transaction>,
    ) -> Result<u64> {
        let model = self.model(model)?;
        let Some(stmt) = self.builder(model).build_update_counting(filter, data)? else {
            tracing::debug!("Nothing to update for model {}", model.name);
            return Ok(0);
        };
        let mut scope = self.scope(transaction).await?;
        let result = match scope.connection() {
            Ok(conn) => self.run(conn, stmt, false).await,
            Err(error) => Err(error),
        };
        let rows = scope.finish(result).await?;
        Ok(first_count(&rows, AFFECTED_ROWS_COLUMN))
    }

    /// Deletes every matching row and returns how many were removed
    pub async fn destroy_all(
        &self,
        model: &str,
        filter: Option<&Where>,
        transaction: Option<&mut Transaction>,
    ) -> Result<u64> {
        let model = self.model(model)?;
        let stmt = self.builder(model).build_delete_counting(filter)?;
        let mut scope = self.scope(transaction).await?;
        let result = match scope.connection() {
            Ok(conn) => self.run(conn, stmt, false).await,
            Err(error) => Err(error),
        };
        let rows = scope.finish(result).await?;
        Ok(first_count(&rows, AFFECTED_ROWS_COLUMN))
    }
}
