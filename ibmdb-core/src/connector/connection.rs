//! Connection lifecycle.

use tokio::sync::watch;

use super::{ConnectionState, Db2Connector, Transaction};
use crate::builder::statements::first_count;
use crate::driver::{Connection, Statement};
use crate::error::{IbmDbError, redact_connection_string};
use crate::Result;

/// Liveness probe run by [`Db2Connector::ping`]
pub const PING_SQL: &str = "SELECT COUNT(*) AS COUNT FROM SYSIBM.SYSDUMMY1";

const PROBE_COLUMN: &str = "COUNT";

impl Db2Connector {
    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Opens a connection through the driver.
    ///
    /// Returns `Ok(None)` without contacting the driver when the settings
    /// lack a DSN or any of hostname, port, username, password and protocol.
    ///
    /// # Errors
    /// Driver failures are returned after the state falls back to
    /// [`ConnectionState::Disconnected`].
    pub async fn connect(&self) -> Result<Option<Box<dyn Connection>>> {
        if !self.settings.has_required_settings() {
            tracing::warn!(
                "Connection settings are incomplete, not connecting: {}",
                redact_connection_string(&self.connection_string)
            );
            return Ok(None);
        }

        self.set_state(ConnectionState::Connecting);
        match self.driver.open(&self.connection_string).await {
            Ok(conn) => {
                self.set_state(ConnectionState::Connected);
                tracing::info!("Connected to {}", self.settings);
                Ok(Some(conn))
            }
            Err(error) => {
                self.set_state(ConnectionState::Disconnected);
                tracing::warn!("Connection to {} failed: {}", self.settings, error);
                Err(error)
            }
        }
    }

    /// Like [`connect`](Self::connect), but a missing connection is an error
    pub(crate) async fn require_connection(&self) -> Result<Box<dyn Connection>> {
        self.connect().await?.ok_or_else(|| {
            IbmDbError::not_connected(
                "connection settings need a DSN or hostname, port, username, password and protocol",
            )
        })
    }

    /// Marks the connector disconnected
    pub fn disconnect(&self) {
        self.set_state(ConnectionState::Disconnected);
        tracing::debug!("Disconnected from {}", self.settings);
    }

    /// Checks the database answers.
    ///
    /// The probe runs on the caller's transaction when one is given,
    /// otherwise on a fresh connection closed afterwards.
    pub async fn ping(&self, transaction: Option<&mut Transaction>) -> Result<bool> {
        let mut scope = self.scope(transaction).await?;
        let result = match scope.connection() {
            Ok(conn) => conn
                .query(&Statement::new(PING_SQL, Vec::new()))
                .await
                .map(|rows| first_count(&rows, PROBE_COLUMN) > 0),
            Err(error) => Err(error),
        };
        scope.finish(result).await
    }

    /// Runs a count probe synchronously on an existing connection
    pub fn test_connection(&self, conn: &mut dyn Connection, sql: &str) -> Result<bool> {
        let rows = conn.query_sync(sql)?;
        Ok(first_count(&rows, PROBE_COLUMN) > 0)
    }
}
