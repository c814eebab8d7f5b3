//! Native driver seam.
//!
//! The connector never talks to the network itself. It goes through a
//! [`Driver`] that opens [`Connection`]s from a connection string, which keeps
//! pooling and the wire protocol out of this crate.
//!
//! # Module Structure
//! - `helpers`: typed access to result rows
//! - `scripted`: in-memory driver replaying canned results
//! - `odbc`: DB2 CLI/ODBC backend (feature `odbc`)

use async_trait::async_trait;

use crate::Result;
use crate::value::{Row, SqlValue};

pub mod helpers;
#[cfg(feature = "odbc")]
pub mod odbc;
pub mod scripted;

pub use helpers::RowExt;

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// DB2 isolation code for `SET CURRENT ISOLATION`
    pub fn db2_code(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "UR",
            Self::ReadCommitted => "CS",
            Self::RepeatableRead => "RS",
            Self::Serializable => "RR",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadUncommitted => write!(f, "READ UNCOMMITTED"),
            Self::ReadCommitted => write!(f, "READ COMMITTED"),
            Self::RepeatableRead => write!(f, "REPEATABLE READ"),
            Self::Serializable => write!(f, "SERIALIZABLE"),
        }
    }
}

/// A statement ready for the driver
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
    /// The statement produces no result set (DDL, plain DML)
    pub no_results: bool,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
            no_results: false,
        }
    }

    pub fn without_results(mut self) -> Self {
        self.no_results = true;
        self
    }
}

/// One open session with the database.
///
/// # Object Safety
/// Used as `Box<dyn Connection>`; `close` consumes the box.
#[async_trait]
pub trait Connection: Send {
    /// Runs a statement and returns its rows (empty for `no_results`)
    async fn query(&mut self, statement: &Statement) -> Result<Vec<Row>>;

    /// Runs a parameterless query synchronously
    fn query_sync(&mut self, sql: &str) -> Result<Vec<Row>>;

    async fn begin_transaction(&mut self, isolation: IsolationLevel) -> Result<()>;

    async fn commit_transaction(&mut self) -> Result<()>;

    async fn rollback_transaction(&mut self) -> Result<()>;

    /// Releases the connection back to the driver
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens connections from connection strings.
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    /// Prepares the driver's pool; `min_pool_size` of 0 leaves the default
    async fn init(&self, min_pool_size: u32, connection_string: &str) -> Result<()>;

    async fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>>;
}

/// Creates the native driver for a connector.
///
/// # Arguments
/// * `max_pool_size` - Upper bound on open connections (0 = unbounded)
///
/// # Errors
/// Returns an unsupported feature error when no native backend is compiled in
pub fn create_driver(max_pool_size: u32) -> Result<std::sync::Arc<dyn Driver>> {
    #[cfg(feature = "odbc")]
    {
        Ok(std::sync::Arc::new(odbc::OdbcDriver::new(max_pool_size)))
    }
    #[cfg(not(feature = "odbc"))]
    {
        let _ = max_pool_size;
        Err(crate::error::IbmDbError::unsupported_feature(
            "DB2 native driver",
            "Compile with --features odbc to enable the ODBC backend",
        ))
    }
}
