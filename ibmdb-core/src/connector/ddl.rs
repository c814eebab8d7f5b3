//! Table DDL and migration entry points.

use super::{Db2Connector, Transaction};
use crate::driver::Connection;
use crate::migration::catalog::{self, CatalogColumn, CatalogIndex};
use crate::migration::{self, DdlKind, MigrationPlan};
use crate::models::ModelDefinition;
use crate::sql::ParameterizedSql;
use crate::Result;

impl Db2Connector {
    /// Models named in `names`, or every defined model when `names` is empty
    fn select_models(&self, names: &[&str]) -> Result<Vec<&ModelDefinition>> {
        if names.is_empty() {
            return Ok(self.models.values().collect());
        }
        names.iter().map(|name| self.model(name)).collect()
    }

    /// `CREATE TABLE` followed by every declared index
    pub fn create_table_plan(&self, model: &ModelDefinition) -> Result<MigrationPlan> {
        let builder = self.builder(model);
        let mut plan = MigrationPlan::new(&model.name);
        plan.push(DdlKind::CreateTable, builder.build_create_table()?);
        for index in builder.build_indexes() {
            plan.push(DdlKind::CreateIndex, index);
        }
        Ok(plan)
    }

    async fn fetch_fields(
        &self,
        conn: &mut dyn Connection,
        model: &ModelDefinition,
    ) -> Result<Vec<CatalogColumn>> {
        let builder = self.builder(model);
        let sql = catalog::show_fields_sql(model.table_name(), builder.schema());
        let rows = self.run(conn, ParameterizedSql::new(sql), false).await?;
        catalog::parse_columns(&rows)
    }

    async fn fetch_indexes(
        &self,
        conn: &mut dyn Connection,
        model: &ModelDefinition,
    ) -> Result<Vec<CatalogIndex>> {
        let builder = self.builder(model);
        let sql = catalog::show_indexes_sql(model.table_name(), builder.schema());
        let rows = self.run(conn, ParameterizedSql::new(sql), false).await?;
        catalog::parse_indexes(&rows)
    }

    /// Columns of the model's table as reported by `SYSCAT.COLUMNS`
    pub async fn show_fields(
        &self,
        model: &str,
        transaction: Option<&mut Transaction>,
    ) -> Result<Vec<CatalogColumn>> {
        let model = self.model(model)?;
        let mut scope = self.scope(transaction).await?;
        let result = match scope.connection() {
            Ok(conn) => self.fetch_fields(conn, model).await,
            Err(error) => Err(error),
        };
        scope.finish(result).await
    }

    /// Indexes of the model's table as reported by `SYSCAT.INDEXES`
    pub async fn show_indexes(
        &self,
        model: &str,
        transaction: Option<&mut Transaction>,
    ) -> Result<Vec<CatalogIndex>> {
        let model = self.model(model)?;
        let mut scope = self.scope(transaction).await?;
        let result = match scope.connection() {
            Ok(conn) => self.fetch_indexes(conn, model).await,
            Err(error) => Err(error),
        };
        scope.finish(result).await
    }

    /// Diffs the model against a catalog snapshot.
    ///
    /// With `check_only` the plan is returned without running anything;
    /// otherwise its statements run in order and the first failure aborts.
    pub async fn alter_table(
        &self,
        model: &str,
        actual_fields: &[CatalogColumn],
        actual_indexes: &[CatalogIndex],
        check_only: bool,
        transaction: Option<&mut Transaction>,
    ) -> Result<MigrationPlan> {
        let model = self.model(model)?;
        let plan = migration::alter_table(&self.builder(model), actual_fields, actual_indexes)?;
        if check_only || plan.is_empty() {
            return Ok(plan);
        }
        let mut scope = self.scope(transaction).await?;
        let result = match scope.connection() {
            Ok(conn) => plan.apply(conn).await,
            Err(error) => Err(error),
        };
        scope.finish(result).await?;
        tracing::info!(
            "Altered table {} ({} statements)",
            model.table_name(),
            plan.operations.len()
        );
        Ok(plan)
    }

    /// What `autoupdate` would run for one model, read from the live catalog
    async fn plan_for(
        &self,
        conn: &mut dyn Connection,
        model: &ModelDefinition,
    ) -> Result<MigrationPlan> {
        let fields = self.fetch_fields(conn, model).await?;
        if fields.is_empty() {
            return self.create_table_plan(model);
        }
        let indexes = self.fetch_indexes(conn, model).await?;
        migration::alter_table(&self.builder(model), &fields, &indexes)
    }

    /// Plans for the named models (all when empty) without running them
    pub async fn plan_migration(&self, models: &[&str]) -> Result<Vec<MigrationPlan>> {
        let models = self.select_models(models)?;
        let mut scope = self.scope(None).await?;
        let result = match scope.connection() {
            Ok(conn) => {
                let mut plans = Vec::with_capacity(models.len());
                let mut failure = None;
                for model in models {
                    match self.plan_for(conn, model).await {
                        Ok(plan) => plans.push(plan),
                        Err(error) => {
                            failure = Some(error);
                            break;
                        }
                    }
                }
                failure.map_or(Ok(plans), Err)
            }
            Err(error) => Err(error),
        };
        scope.finish(result).await
    }

    /// Creates the model's table and indexes
    pub async fn create_table(
        &self,
        model: &str,
        transaction: Option<&mut Transaction>,
    ) -> Result<()> {
        let plan = self.create_table_plan(self.model(model)?)?;
        let mut scope = self.scope(transaction).await?;
        let result = match scope.connection() {
            Ok(conn) => plan.apply(conn).await,
            Err(error) => Err(error),
        };
        scope.finish(result).await?;
        Ok(())
    }

    async fn drop_on(&self, conn: &mut dyn Connection, model: &ModelDefinition) -> Result<()> {
        let sql = self.builder(model).build_drop_table();
        match self.run(conn, ParameterizedSql::new(sql), true).await {
            Ok(_) => Ok(()),
            Err(error) if error.is_undefined_object() => {
                tracing::debug!("Table {} did not exist", model.table_name());
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Drops the model's table; a table that does not exist is not an error
    pub async fn drop_table(
        &self,
        model: &str,
        transaction: Option<&mut Transaction>,
    ) -> Result<()> {
        let model = self.model(model)?;
        let mut scope = self.scope(transaction).await?;
        let result = match scope.connection() {
            Ok(conn) => self.drop_on(conn, model).await,
            Err(error) => Err(error),
        };
        scope.finish(result).await
    }

    /// Drops and recreates the tables of the named models (all when empty)
    pub async fn automigrate(&self, models: &[&str]) -> Result<()> {
        let models = self.select_models(models)?;
        let mut scope = self.scope(None).await?;
        let result = match scope.connection() {
            Ok(conn) => {
                let mut outcome = Ok(());
                for model in models {
                    outcome = match self.drop_on(conn, model).await {
                        Ok(()) => match self.create_table_plan(model) {
                            Ok(plan) => plan.apply(conn).await.map(|_| ()),
                            Err(error) => Err(error),
                        },
                        Err(error) => Err(error),
                    };
                    if outcome.is_err() {
                        break;
                    }
                    tracing::info!("Recreated table {}", model.table_name());
                }
                outcome
            }
            Err(error) => Err(error),
        };
        scope.finish(result).await
    }

    /// Creates missing tables and alters existing ones to match the models
    pub async fn autoupdate(&self, models: &[&str]) -> Result<Vec<MigrationPlan>> {
        let models = self.select_models(models)?;
        let mut scope = self.scope(None).await?;
        let result = match scope.connection() {
            Ok(conn) => {
                let mut plans = Vec::with_capacity(models.len());
                let mut failure = None;
                for model in models {
                    let applied = match self.plan_for(conn, model).await {
                        Ok(plan) => match plan.apply(conn).await {
                            Ok(_) => Ok(plan),
                            Err(error) => Err(error),
                        },
                        Err(error) => Err(error),
                    };
                    match applied {
                        Ok(plan) => {
                            tracing::info!(
                                "Updated table {} ({} statements)",
                                model.table_name(),
                                plan.operations.len()
                            );
                            plans.push(plan);
                        }
                        Err(error) => {
                            failure = Some(error);
                            break;
                        }
                    }
                }
                failure.map_or(Ok(plans), Err)
            }
            Err(error) => Err(error),
        };
        scope.finish(result).await
    }

    /// Whether the live tables already match the named models
    pub async fn is_actual(&self, models: &[&str]) -> Result<bool> {
        Ok(self
            .plan_migration(models)
            .await?
            .iter()
            .all(MigrationPlan::is_empty))
    }
}
