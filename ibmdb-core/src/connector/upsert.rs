//! Transactional upserts.
//!
//! Each operation runs on the caller's transaction when one is passed, or in a
//! READ COMMITTED transaction of its own that is committed on success and
//! rolled back on the first error.

use super::{Db2Connector, Transaction};
use crate::builder::Where;
use crate::builder::statements::{COUNT_COLUMN, first_count};
use crate::dialect::SqlDialect;
use crate::driver::Connection;
use crate::error::IbmDbError;
use crate::models::ModelDefinition;
use crate::value::{ModelData, ModelValue};
use crate::Result;

/// Persisted row and whether it was newly created
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertResult {
    pub data: ModelData,
    pub is_new_instance: bool,
}

impl UpsertResult {
    fn created(data: ModelData) -> Self {
        Self {
            data,
            is_new_instance: true,
        }
    }

    fn existing(data: ModelData) -> Self {
        Self {
            data,
            is_new_instance: false,
        }
    }
}

/// Whether every id property of the model has a value in `data`
fn has_id_values(model: &ModelDefinition, data: &ModelData) -> bool {
    let ids = model.id_properties();
    !ids.is_empty()
        && ids
            .iter()
            .all(|p| data.get(&p.name).is_some_and(|v| !v.is_null()))
}

impl Db2Connector {
    /// Updates the row with the instance's id, or inserts it when absent
    pub async fn update_or_create(
        &self,
        model: &str,
        data: ModelData,
        transaction: Option<&mut Transaction>,
    ) -> Result<UpsertResult> {
        let model = self.model(model)?;
        let mut scope = self.transactional_scope(transaction).await?;
        let result = match scope.connection() {
            Ok(conn) => self.update_or_insert(conn, model, data).await,
            Err(error) => Err(error),
        };
        scope.finish(result).await
    }

    async fn update_or_insert(
        &self,
        conn: &mut dyn Connection,
        model: &ModelDefinition,
        data: ModelData,
    ) -> Result<UpsertResult> {
        if !has_id_values(model, &data) {
            return Ok(UpsertResult::created(self.insert(conn, model, data).await?));
        }
        let builder = self.builder(model);
        let filter = builder.id_where(&data)?;
        let rows = self.run(conn, builder.build_count(Some(&filter))?, false).await?;
        if first_count(&rows, COUNT_COLUMN) == 0 {
            return Ok(UpsertResult::created(self.insert(conn, model, data).await?));
        }
        if let Some(update) = builder.build_update(Some(&filter), &data)? {
            self.run(conn, update, true).await?;
        }
        Ok(UpsertResult::existing(data))
    }

    /// Overwrites the row with the instance's id, or inserts it when absent
    pub async fn replace_or_create(
        &self,
        model: &str,
        data: ModelData,
        transaction: Option<&mut Transaction>,
    ) -> Result<UpsertResult> {
        let model = self.model(model)?;
        let mut scope = self.transactional_scope(transaction).await?;
        let result = match scope.connection() {
            Ok(conn) => self.replace_or_insert(conn, model, data).await,
            Err(error) => Err(error),
        };
        scope.finish(result).await
    }

    async fn replace_or_insert(
        &self,
        conn: &mut dyn Connection,
        model: &ModelDefinition,
        data: ModelData,
    ) -> Result<UpsertResult> {
        if !has_id_values(model, &data) {
            return Ok(UpsertResult::created(self.insert(conn, model, data).await?));
        }
        let filter = self.builder(model).id_where(&data)?;
        match self.overwrite(conn, model, &filter, data).await? {
            Ok(replaced) => Ok(UpsertResult::existing(replaced)),
            Err(data) => Ok(UpsertResult::created(self.insert(conn, model, data).await?)),
        }
    }

    /// Replaces the row with the given id; never creates one.
    ///
    /// # Errors
    /// A `NotFound` error with status 404 when no row has that id.
    pub async fn replace(
        &self,
        model: &str,
        id: impl Into<ModelValue>,
        data: ModelData,
        transaction: Option<&mut Transaction>,
    ) -> Result<UpsertResult> {
        let id = id.into();
        let definition = self.model(model)?;
        let id_property = definition.id_property().ok_or_else(|| {
            IbmDbError::configuration(format!("model '{model}' has no id property"))
        })?;
        let filter = Where::eq(id_property.name.clone(), id.clone());

        let mut scope = self.transactional_scope(transaction).await?;
        let result = match scope.connection() {
            Ok(conn) => match self.overwrite(conn, definition, &filter, data).await {
                Ok(Ok(replaced)) => Ok(UpsertResult::existing(replaced)),
                Ok(Err(_)) => Err(IbmDbError::replace_target_not_found(&id)),
                Err(error) => Err(error),
            },
            Err(error) => Err(error),
        };
        scope.finish(result).await
    }

    /// Deletes and re-inserts the row matching `filter`, keeping its id.
    ///
    /// Returns `Err(data)` untouched when no row matches.
    async fn overwrite(
        &self,
        conn: &mut dyn Connection,
        model: &ModelDefinition,
        filter: &Where,
        mut data: ModelData,
    ) -> Result<std::result::Result<ModelData, ModelData>> {
        let builder = self.builder(model);
        let rows = self
            .run(conn, builder.build_select_id(Some(filter))?, false)
            .await?;
        let Some(found) = rows.first() else {
            return Ok(Err(data));
        };

        if let Some(id) = model.id_property() {
            let found_id = found
                .values()
                .next()
                .map(|value| self.dialect.from_column_value(Some(id), value))
                .transpose()?;
            if let Some(found_id) = found_id {
                data.insert(id.name.clone(), found_id);
            }
        }

        self.run(conn, builder.build_delete(Some(filter))?, true)
            .await?;
        let data = self.insert(conn, model, data).await?;
        Ok(Ok(data))
    }
}
