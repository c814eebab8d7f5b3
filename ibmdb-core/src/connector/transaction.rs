//! Transactions and scoped connection use.

use uuid::Uuid;

use super::Db2Connector;
use crate::driver::{Connection, IsolationLevel};
use crate::error::IbmDbError;
use crate::Result;

/// An open transaction owning exactly one connection.
///
/// `commit` and `rollback` consume the handle, so a finished transaction
/// cannot be used again. Dropping an unfinished transaction logs a warning
/// and leaves cleanup to the connection's own drop.
pub struct Transaction {
    id: Uuid,
    isolation: IsolationLevel,
    connection: Option<Box<dyn Connection>>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("isolation", &self.isolation)
            .field("active", &self.connection.is_some())
            .finish()
    }
}

impl Transaction {
    /// Starts a transaction on `conn`; the connection is closed if that fails
    pub async fn begin(mut conn: Box<dyn Connection>, isolation: IsolationLevel) -> Result<Self> {
        if let Err(error) = conn.begin_transaction(isolation).await {
            if let Err(close_error) = conn.close().await {
                tracing::warn!("Failed to close connection after begin failed: {}", close_error);
            }
            return Err(error);
        }
        let id = Uuid::new_v4();
        tracing::debug!("Transaction {} started ({})", id, isolation);
        Ok(Self {
            id,
            isolation,
            connection: Some(conn),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    /// The connection the transaction runs on
    pub fn connection(&mut self) -> Result<&mut dyn Connection> {
        match self.connection.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(IbmDbError::not_connected("transaction already finished")),
        }
    }

    fn take_connection(&mut self) -> Result<Box<dyn Connection>> {
        self.connection
            .take()
            .ok_or_else(|| IbmDbError::not_connected("transaction already finished"))
    }

    /// Commits and closes the connection
    pub async fn commit(mut self) -> Result<()> {
        let mut conn = self.take_connection()?;
        let committed = conn.commit_transaction().await;
        if committed.is_err()
            && let Err(error) = conn.rollback_transaction().await
        {
            tracing::warn!("Rollback after failed commit of {} failed: {}", self.id, error);
        }
        let closed = conn.close().await;
        committed?;
        closed?;
        tracing::debug!("Transaction {} committed", self.id);
        Ok(())
    }

    /// Rolls back and closes the connection
    pub async fn rollback(mut self) -> Result<()> {
        let mut conn = self.take_connection()?;
        let rolled_back = conn.rollback_transaction().await;
        let closed = conn.close().await;
        rolled_back?;
        closed?;
        tracing::debug!("Transaction {} rolled back", self.id);
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.connection.is_some() {
            tracing::warn!(
                "Transaction {} dropped without commit or rollback",
                self.id
            );
        }
    }
}

/// Where an operation gets its connection from.
pub(crate) enum TransactionScope<'t> {
    /// The caller's transaction; finishing it is the caller's business
    Ambient(&'t mut Transaction),
    /// A transaction begun for this operation alone
    Local(Transaction),
    /// An autocommit connection closed when the operation ends
    Direct(Box<dyn Connection>),
}

impl TransactionScope<'_> {
    pub(crate) fn connection(&mut self) -> Result<&mut dyn Connection> {
        match self {
            Self::Ambient(transaction) => transaction.connection(),
            Self::Local(transaction) => transaction.connection(),
            Self::Direct(conn) => Ok(conn.as_mut()),
        }
    }

    /// Ends the scope: commit or roll back a local transaction, close a
    /// direct connection. The operation's own error wins over cleanup errors.
    pub(crate) async fn finish<T>(self, result: Result<T>) -> Result<T> {
        match (self, result) {
            (Self::Ambient(_), result) => result,
            (Self::Local(transaction), Ok(value)) => {
                transaction.commit().await?;
                Ok(value)
            }
            (Self::Local(transaction), Err(error)) => {
                let id = transaction.id();
                if let Err(rollback_error) = transaction.rollback().await {
                    tracing::warn!("Rollback of {} failed: {}", id, rollback_error);
                } else {
                    tracing::warn!("Transaction {} rolled back: {}", id, error);
                }
                Err(error)
            }
            (Self::Direct(conn), Ok(value)) => {
                conn.close().await?;
                Ok(value)
            }
            (Self::Direct(conn), Err(error)) => {
                if let Err(close_error) = conn.close().await {
                    tracing::warn!("Failed to close connection: {}", close_error);
                }
                Err(error)
            }
        }
    }
}

impl Db2Connector {
    /// Opens a connection and begins a transaction on it
    pub async fn begin_transaction(&self, isolation: IsolationLevel) -> Result<Transaction> {
        let conn = self.require_connection().await?;
        Transaction::begin(conn, isolation).await
    }

    /// The caller's transaction, or a fresh autocommit connection
    pub(crate) async fn scope<'t>(
        &self,
        transaction: Option<&'t mut Transaction>,
    ) -> Result<TransactionScope<'t>> {
        match transaction {
            Some(transaction) => Ok(TransactionScope::Ambient(transaction)),
            None => Ok(TransactionScope::Direct(self.require_connection().await?)),
        }
    }

    /// The caller's transaction, or a new READ COMMITTED one owned by the scope
    pub(crate) async fn transactional_scope<'t>(
        &self,
        transaction: Option<&'t mut Transaction>,
    ) -> Result<TransactionScope<'t>> {
        match transaction {
            Some(transaction) => Ok(TransactionScope::Ambient(transaction)),
            None => Ok(TransactionScope::Local(
                self.begin_transaction(IsolationLevel::ReadCommitted).await?,
            )),
        }
    }
}
