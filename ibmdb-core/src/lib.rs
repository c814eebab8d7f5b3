//! Core library for the IBM DB2 connector.
//!
//! Adapts model definitions and where-filters to DB2 SQL, runs them through a
//! native driver behind a trait seam, and keeps tables in line with the
//! declared models.
//!
//! # Security Guarantees
//! - Passwords are held in zeroizing buffers and never serialized
//! - Connection strings are redacted (`PWD=****`) in logs and errors
//! - Values are always bound as parameters, except `REGEXP_LIKE` patterns
//!
//! # Architecture
//! - `config`: connection settings and connection-string building
//! - `dialect`: value marshalling, column types, identifier escaping
//! - `sql` and `builder`: parameterized fragments and statement builders
//! - `driver`: the `Driver`/`Connection` seam and its backends
//! - `connector`: connection lifecycle, CRUD, upserts, table DDL
//! - `migration`: catalog snapshot, diff and ordered DDL plans

pub mod builder;
pub mod config;
pub mod connector;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod logging;
pub mod migration;
pub mod models;
pub mod sql;
pub mod value;

// Re-export commonly used types
pub use builder::{Filter, Operator, OrderBy, RegexpPattern, Where};
pub use config::ConnectionSettings;
pub use connector::{ConnectionState, Db2Connector, Transaction, UpsertResult};
pub use dialect::{Db2Dialect, SqlDialect};
pub use driver::{Connection, Driver, IsolationLevel, Statement, create_driver};
pub use error::{IbmDbError, Result};
pub use migration::{DdlKind, MigrationPlan};
pub use models::{
    IndexColumn, IndexDefinition, ModelDefinition, PropertyDefinition, PropertyType,
};
pub use sql::ParameterizedSql;
pub use value::{ModelData, ModelValue, Row, SqlValue};
