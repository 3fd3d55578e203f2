//! Managed connections and transactions.
//!
//! A [`ManagedConnection`] is the scoped-acquisition wrapper every operation
//! goes through: it owns a driver session outright, borrows one from the
//! pool, or shares the session inside a caller-supplied
//! [`ManagedTransaction`]. Disposal behavior follows ownership:
//!
//! - `close_on_dispose` connections close their session on drop
//! - pool-owned connections go back to the pool on drop, with a diagnostic
//!   warning if a transaction was left open on them
//! - transaction-backed connections never touch the session; only the scope
//!   that created the transaction may end it

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

use crate::dialect::registry::RegistryError;
use crate::dialect::DatabaseType;
use crate::driver::{ConnectionState, DriverConnection, DriverError, ResultSet};

use super::pool::{self, PoolSlot};

/// Errors from managed connection and transaction handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("transaction is already {0:?}; no further work is possible on it")]
    TransactionClosed(TransactionState),

    #[error("connection handle was already disposed")]
    Disposed,
}

/// Lifecycle of a managed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

struct TransactionInner {
    connection: Option<Box<dyn DriverConnection>>,
    state: TransactionState,
}

/// A driver transaction plus the session it runs on.
///
/// Cloning shares the same transaction; subordinate managed connections
/// created from a clone can run work inside it but cannot end it
/// accidentally, because both terminal calls are idempotent and only the
/// creating scope holds the intent to call them.
#[derive(Clone)]
pub struct ManagedTransaction {
    inner: Arc<Mutex<TransactionInner>>,
}

impl std::fmt::Debug for ManagedTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedTransaction")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ManagedTransaction {
    /// Begin a transaction on a freshly opened session, taking ownership of
    /// it until commit or rollback.
    pub fn begin(mut connection: Box<dyn DriverConnection>) -> Result<Self, ConnectionError> {
        connection.begin()?;
        Ok(Self {
            inner: Arc::new(Mutex::new(TransactionInner {
                connection: Some(connection),
                state: TransactionState::Active,
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, TransactionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> TransactionState {
        self.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    /// Commit and close the session. A no-op after any terminal call.
    pub fn commit_and_close(&self) -> Result<(), ConnectionError> {
        let mut inner = self.lock();
        if inner.state != TransactionState::Active {
            return Ok(());
        }
        if let Some(connection) = inner.connection.as_mut() {
            connection.commit()?;
            if let Err(e) = connection.close() {
                debug!("error closing connection after commit: {}", e);
            }
        }
        inner.connection = None;
        inner.state = TransactionState::Committed;
        Ok(())
    }

    /// Roll back and close the session. A no-op after any terminal call.
    pub fn abandon_and_close(&self) -> Result<(), ConnectionError> {
        let mut inner = self.lock();
        if inner.state != TransactionState::Active {
            return Ok(());
        }
        if let Some(connection) = inner.connection.as_mut() {
            connection.rollback()?;
            if let Err(e) = connection.close() {
                debug!("error closing connection after rollback: {}", e);
            }
        }
        inner.connection = None;
        inner.state = TransactionState::RolledBack;
        Ok(())
    }

    fn run<T>(
        &self,
        f: impl FnOnce(&mut dyn DriverConnection) -> Result<T, DriverError>,
    ) -> Result<T, ConnectionError> {
        let mut inner = self.lock();
        if inner.state != TransactionState::Active {
            return Err(ConnectionError::TransactionClosed(inner.state));
        }
        let connection = inner
            .connection
            .as_mut()
            .ok_or(ConnectionError::Disposed)?;
        Ok(f(connection.as_mut())?)
    }
}

enum Handle {
    Owned(Option<Box<dyn DriverConnection>>),
    Transaction(ManagedTransaction),
}

/// The scoped wrapper all SQL goes through.
pub struct ManagedConnection {
    handle: Handle,
    close_on_dispose: bool,
    pool_slot: Option<PoolSlot>,
    database_type: DatabaseType,
}

impl std::fmt::Debug for ManagedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedConnection")
            .field("database_type", &self.database_type)
            .field("close_on_dispose", &self.close_on_dispose)
            .field("pooled", &self.pool_slot.is_some())
            .finish_non_exhaustive()
    }
}

impl ManagedConnection {
    /// A connection this wrapper owns outright.
    pub(crate) fn from_owned(connection: Box<dyn DriverConnection>, close_on_dispose: bool) -> Self {
        let database_type = connection.database_type();
        Self {
            handle: Handle::Owned(Some(connection)),
            close_on_dispose,
            pool_slot: None,
            database_type,
        }
    }

    /// A connection checked out of the pool; it goes back on drop.
    pub(crate) fn from_pool(connection: Box<dyn DriverConnection>, slot: PoolSlot) -> Self {
        let database_type = connection.database_type();
        Self {
            handle: Handle::Owned(Some(connection)),
            close_on_dispose: false,
            pool_slot: Some(slot),
            database_type,
        }
    }

    /// A view into a caller-supplied transaction; the session is shared and
    /// never closed here.
    pub fn from_transaction(transaction: ManagedTransaction, database_type: DatabaseType) -> Self {
        Self {
            handle: Handle::Transaction(transaction),
            close_on_dispose: false,
            pool_slot: None,
            database_type,
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    pub fn close_on_dispose(&self) -> bool {
        self.close_on_dispose
    }

    pub fn transaction(&self) -> Option<&ManagedTransaction> {
        match &self.handle {
            Handle::Transaction(tx) => Some(tx),
            Handle::Owned(_) => None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match &self.handle {
            Handle::Owned(Some(connection)) => connection.state(),
            Handle::Owned(None) => ConnectionState::Closed,
            Handle::Transaction(tx) => {
                if tx.is_active() {
                    ConnectionState::Open
                } else {
                    ConnectionState::Closed
                }
            }
        }
    }

    pub fn in_transaction(&self) -> bool {
        match &self.handle {
            Handle::Owned(Some(connection)) => connection.in_transaction(),
            Handle::Owned(None) => false,
            Handle::Transaction(tx) => tx.is_active(),
        }
    }

    pub fn execute(&mut self, sql: &str) -> Result<u64, ConnectionError> {
        self.run(|connection| connection.execute(sql))
    }

    pub fn query(&mut self, sql: &str) -> Result<ResultSet, ConnectionError> {
        self.run(|connection| connection.query(sql))
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        if let Handle::Owned(Some(connection)) = &mut self.handle {
            connection.set_timeout(timeout);
        }
    }

    fn run<T>(
        &mut self,
        f: impl FnOnce(&mut dyn DriverConnection) -> Result<T, DriverError>,
    ) -> Result<T, ConnectionError> {
        match &mut self.handle {
            Handle::Owned(Some(connection)) => Ok(f(connection.as_mut())?),
            Handle::Owned(None) => Err(ConnectionError::Disposed),
            Handle::Transaction(tx) => tx.run(f),
        }
    }
}

impl Drop for ManagedConnection {
    fn drop(&mut self) {
        let Handle::Owned(slot) = &mut self.handle else {
            // the transaction's creating scope owns the session
            return;
        };
        let Some(mut connection) = slot.take() else {
            return;
        };
        if self.close_on_dispose {
            if let Err(e) = connection.close() {
                debug!("error closing connection on dispose: {}", e);
            }
            return;
        }
        if let Some(pool_slot) = self.pool_slot.take() {
            if connection.in_transaction() {
                warn!(
                    "connection returned to pool key {:?} with a dangling transaction; \
                     it will be evicted on next acquire",
                    pool_slot.key()
                );
            }
            pool::checkin(pool_slot, connection);
        }
    }
}
