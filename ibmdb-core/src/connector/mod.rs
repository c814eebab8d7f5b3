//! DB2 connector: connection lifecycle, CRUD, upserts and table DDL.
//!
//! # Module Structure
//! - `connection`: connect, ping and disconnect with an observable state
//! - `execute`: statement execution with client-side pagination
//! - `transaction`: transaction handles and scoped connection use
//! - `upsert`: `update_or_create`, `replace_or_create`, `replace`
//! - `crud`: create, find, count, bulk update and delete
//! - `ddl`: table creation, drop and migration entry points

mod connection;
mod crud;
mod ddl;
mod execute;
mod transaction;
mod upsert;


use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::watch;
use zeroize::Zeroizing;

use crate::builder::statements::StatementBuilder;
use crate::config::ConnectionSettings;
use crate::dialect::Db2Dialect;
use crate::driver::Driver;
use crate::error::IbmDbError;
use crate::models::ModelDefinition;
use crate::Result;

pub use connection::PING_SQL;
pub use transaction::Transaction;
pub use upsert::UpsertResult;

/// Connection lifecycle of a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Connector binding model definitions to a DB2 database through a driver.
///
/// Every operation takes an optional [`Transaction`]; without one, the
/// operation opens its own connection and closes it when done.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use ibmdb_core::config::ConnectionSettings;
/// use ibmdb_core::connector::{ConnectionState, Db2Connector};
/// use ibmdb_core::driver::scripted::ScriptedDriver;
///
/// let settings = ConnectionSettings::from_dsn("DATABASE=sample;UID=app;PWD=secret");
/// let connector = Db2Connector::new(settings, Arc::new(ScriptedDriver::new())).unwrap();
/// assert_eq!(connector.state(), ConnectionState::Disconnected);
/// assert_eq!(connector.schema(), Some("app"));
/// ```
pub struct Db2Connector {
    driver: Arc<dyn Driver>,
    settings: ConnectionSettings,
    connection_string: Zeroizing<String>,
    schema: Option<String>,
    dialect: Db2Dialect,
    models: BTreeMap<String, ModelDefinition>,
    state: watch::Sender<ConnectionState>,
}

impl std::fmt::Debug for Db2Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db2Connector")
            .field("driver", &self.driver.name())
            .field("settings", &self.settings)
            .field("schema", &self.schema)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl Db2Connector {
    /// Creates a connector without touching the driver
    pub fn new(settings: ConnectionSettings, driver: Arc<dyn Driver>) -> Result<Self> {
        settings.validate()?;
        let resolved = settings.resolve();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Ok(Self {
            driver,
            settings,
            connection_string: Zeroizing::new(resolved.connection_string),
            schema: resolved.schema,
            dialect: Db2Dialect::new(),
            models: BTreeMap::new(),
            state,
        })
    }

    /// Creates a connector and initialises the driver pool when the settings
    /// are complete
    pub async fn initialize(settings: ConnectionSettings, driver: Arc<dyn Driver>) -> Result<Self> {
        let connector = Self::new(settings, driver)?;
        if connector.settings.has_required_settings() {
            connector
                .driver
                .init(connector.settings.min_pool_size, &connector.connection_string)
                .await?;
            tracing::debug!(
                "Initialised {} driver pool (min {})",
                connector.driver.name(),
                connector.settings.min_pool_size
            );
        }
        Ok(connector)
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn dialect(&self) -> &Db2Dialect {
        &self.dialect
    }

    /// Effective schema for unqualified tables
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Registers a model definition, replacing one with the same name
    pub fn define(&mut self, model: ModelDefinition) -> Result<()> {
        model.validate()?;
        tracing::debug!("Defining model {} on table {}", model.name, model.table_name());
        self.models.insert(model.name.clone(), model);
        Ok(())
    }

    pub fn define_all(&mut self, models: impl IntoIterator<Item = ModelDefinition>) -> Result<()> {
        models.into_iter().try_for_each(|model| self.define(model))
    }

    pub fn model(&self, name: &str) -> Result<&ModelDefinition> {
        self.models
            .get(name)
            .ok_or_else(|| IbmDbError::configuration(format!("model '{name}' is not defined")))
    }

    /// Names of every defined model
    pub fn model_names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    /// Statement builder for a model; the model's own schema wins over the
    /// connection schema
    pub fn builder<'a>(&'a self, model: &'a ModelDefinition) -> StatementBuilder<'a, Db2Dialect> {
        let schema = model
            .settings
            .db2
            .schema
            .as_deref()
            .or(self.schema.as_deref());
        StatementBuilder::new(&self.dialect, model, schema)
    }
}
