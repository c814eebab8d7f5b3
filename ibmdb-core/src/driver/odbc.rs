//! DB2 CLI/ODBC backend built on `odbc-api`.
//!
//! Forwards statements to the driver manager and reads every column back as
//! text; the dialect converts text into model values. Values too long for
//! the read buffer fail the fetch instead of being cut. Pool bounds are kept
//! here: `max_pool_size` caps open connections with a semaphore and `init`
//! opens `min_pool_size` warm connections.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use async_trait::async_trait;
use odbc_api::buffers::TextRowSet;
use odbc_api::parameter::{InputParameter, VarBinaryBox, VarCharBox};
use odbc_api::{
    Connection as OdbcHandle, ConnectionOptions, Cursor, Environment, ResultSetMetadata,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use zeroize::Zeroizing;

use super::{Connection, Driver, IsolationLevel, Statement};
use crate::error::IbmDbError;
use crate::value::{Row, SqlValue};
use crate::Result;

/// Rows fetched per round trip
const BATCH_SIZE: usize = 256;
/// Upper bound for a single text column value, the longest DB2 VARCHAR
const MAX_TEXT_LENGTH: usize = 32_672;
/// SQLSTATE for right-truncated string data
const SQLSTATE_TRUNCATED: &str = "01004";

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

fn environment() -> Result<&'static Environment> {
    if let Some(environment) = ENVIRONMENT.get() {
        return Ok(environment);
    }
    let environment =
        Environment::new().map_err(|e| odbc_error("Failed to allocate ODBC environment", e))?;
    Ok(ENVIRONMENT.get_or_init(|| environment))
}

fn odbc_error(context: &str, error: odbc_api::Error) -> IbmDbError {
    let sqlstate = match &error {
        odbc_api::Error::Diagnostics { record, .. } => Some(record.state.as_str().to_string()),
        _ => None,
    };
    IbmDbError::driver(format!("{context}: {error}"), sqlstate)
}

/// Maps fetch errors; values too long for their buffer fail the read
fn fetch_error(error: odbc_api::Error, columns: &[String]) -> IbmDbError {
    match error {
        odbc_api::Error::TooLargeValueForBuffer {
            indicator,
            buffer_index,
        } => {
            let column = columns
                .get(buffer_index)
                .map_or("<unknown>", String::as_str);
            let length = indicator.map_or_else(|| "unknown".to_string(), |n| n.to_string());
            IbmDbError::driver(
                format!(
                    "Value of column '{column}' ({length} bytes) exceeds the {MAX_TEXT_LENGTH} byte read buffer"
                ),
                Some(SQLSTATE_TRUNCATED.to_string()),
            )
        }
        other => odbc_error("Failed to fetch rows", other),
    }
}

fn to_parameter(value: &SqlValue) -> Box<dyn InputParameter> {
    match value {
        SqlValue::Null => Box::new(VarCharBox::null()),
        SqlValue::Integer(value) => Box::new(*value),
        SqlValue::Double(value) => Box::new(*value),
        SqlValue::Text(text) => Box::new(VarCharBox::from_string(text.clone())),
        SqlValue::Binary(bytes) => Box::new(VarBinaryBox::from_vec(bytes.clone())),
        SqlValue::Lob { data, .. } => to_parameter(data),
    }
}

type IdleConnection = (Zeroizing<String>, OdbcHandle<'static>);

#[derive(Default)]
struct IdlePool {
    connections: Mutex<Vec<IdleConnection>>,
}

impl IdlePool {
    fn lock(&self) -> MutexGuard<'_, Vec<IdleConnection>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn take(&self, connection_string: &str) -> Option<OdbcHandle<'static>> {
        let mut idle = self.lock();
        let position = idle
            .iter()
            .position(|(cs, _)| cs.as_str() == connection_string)?;
        Some(idle.swap_remove(position).1)
    }

    fn put(&self, connection_string: Zeroizing<String>, handle: OdbcHandle<'static>) {
        self.lock().push((connection_string, handle));
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Driver backed by the DB2 CLI/ODBC driver manager.
pub struct OdbcDriver {
    idle: Arc<IdlePool>,
    permits: Option<Arc<Semaphore>>,
}

impl OdbcDriver {
    /// Creates the driver; a `max_pool_size` of 0 leaves the pool unbounded
    pub fn new(max_pool_size: u32) -> Self {
        let permits = (max_pool_size > 0).then(|| {
            Arc::new(Semaphore::new(
                usize::try_from(max_pool_size).unwrap_or(Semaphore::MAX_PERMITS),
            ))
        });
        Self {
            idle: Arc::default(),
            permits,
        }
    }

    fn connect(connection_string: &str) -> Result<OdbcHandle<'static>> {
        environment()?
            .connect_with_connection_string(connection_string, ConnectionOptions::default())
            .map_err(|e| IbmDbError::connection_failed(connection_string, e))
    }
}

impl std::fmt::Debug for OdbcDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdbcDriver")
            .field("idle", &self.idle.len())
            .field(
                "available_permits",
                &self.permits.as_ref().map(|p| p.available_permits()),
            )
            .finish()
    }
}

#[async_trait]
impl Driver for OdbcDriver {
    fn name(&self) -> &str {
        "odbc"
    }

    async fn init(&self, min_pool_size: u32, connection_string: &str) -> Result<()> {
        let wanted = usize::try_from(min_pool_size).unwrap_or(0);
        while self.idle.len() < wanted {
            let handle = Self::connect(connection_string)?;
            self.idle
                .put(Zeroizing::new(connection_string.to_string()), handle);
        }
        tracing::debug!("ODBC pool warmed with {} idle connections", self.idle.len());
        Ok(())
    }

    async fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>> {
        let permit = match &self.permits {
            Some(permits) => Some(
                Arc::clone(permits)
                    .acquire_owned()
                    .await
                    .map_err(|_| IbmDbError::not_connected("ODBC connection pool is closed"))?,
            ),
            None => None,
        };
        let handle = match self.idle.take(connection_string) {
            Some(handle) => handle,
            None => Self::connect(connection_string)?,
        };
        Ok(Box::new(OdbcConnection {
            handle: Some(handle),
            connection_string: Zeroizing::new(connection_string.to_string()),
            idle: Arc::clone(&self.idle),
            in_transaction: false,
            _permit: permit,
        }))
    }
}

/// One pooled ODBC connection
pub struct OdbcConnection {
    handle: Option<OdbcHandle<'static>>,
    connection_string: Zeroizing<String>,
    idle: Arc<IdlePool>,
    in_transaction: bool,
    _permit: Option<OwnedSemaphorePermit>,
}

impl OdbcConnection {
    fn handle(&self) -> Result<&OdbcHandle<'static>> {
        self.handle
            .as_ref()
            .ok_or_else(|| IbmDbError::not_connected("connection already closed"))
    }

    fn run(&self, sql: &str, params: &[SqlValue], fetch: bool) -> Result<Vec<Row>> {
        let handle = self.handle()?;
        let params: Vec<Box<dyn InputParameter>> = params.iter().map(to_parameter).collect();
        let cursor = handle
            .execute(sql, params.as_slice())
            .map_err(|e| odbc_error("Statement failed", e))?;
        let Some(mut cursor) = cursor else {
            return Ok(Vec::new());
        };
        if !fetch {
            return Ok(Vec::new());
        }

        let names = cursor
            .column_names()
            .map_err(|e| odbc_error("Failed to describe result", e))?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(|e| odbc_error("Failed to read column name", e))?;
        let mut buffers = TextRowSet::for_cursor(BATCH_SIZE, &mut cursor, Some(MAX_TEXT_LENGTH))
            .map_err(|e| odbc_error("Failed to allocate row buffers", e))?;
        let mut row_cursor = cursor
            .bind_buffer(&mut buffers)
            .map_err(|e| odbc_error("Failed to bind row buffers", e))?;

        let mut rows = Vec::new();
        while let Some(batch) = row_cursor
            .fetch_with_truncation_check(true)
            .map_err(|e| fetch_error(e, &names))?
        {
            for row_index in 0..batch.num_rows() {
                let row: Row = names
                    .iter()
                    .enumerate()
                    .map(|(column, name)| {
                        let value = batch.at(column, row_index).map_or(SqlValue::Null, |bytes| {
                            SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
                        });
                        (name.clone(), value)
                    })
                    .collect();
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl Connection for OdbcConnection {
    async fn query(&mut self, statement: &Statement) -> Result<Vec<Row>> {
        self.run(&statement.sql, &statement.params, !statement.no_results)
    }

    fn query_sync(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.run(sql, &[], true)
    }

    async fn begin_transaction(&mut self, isolation: IsolationLevel) -> Result<()> {
        let handle = self.handle()?;
        handle
            .execute(
                &format!("SET CURRENT ISOLATION = {}", isolation.db2_code()),
                (),
            )
            .map_err(|e| odbc_error("Failed to set isolation level", e))?;
        handle
            .set_autocommit(false)
            .map_err(|e| odbc_error("Failed to begin transaction", e))?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        let handle = self.handle()?;
        handle
            .commit()
            .map_err(|e| odbc_error("Failed to commit transaction", e))?;
        handle
            .set_autocommit(true)
            .map_err(|e| odbc_error("Failed to restore autocommit", e))?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> Result<()> {
        let handle = self.handle()?;
        handle
            .rollback()
            .map_err(|e| odbc_error("Failed to roll back transaction", e))?;
        handle
            .set_autocommit(true)
            .map_err(|e| odbc_error("Failed to restore autocommit", e))?;
        self.in_transaction = false;
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        // Connections left mid-transaction are dropped instead of pooled
        if !self.in_transaction {
            let connection_string = std::mem::take(&mut *self.connection_string);
            self.idle.put(Zeroizing::new(connection_string), handle);
        }
        Ok(())
    }
}
