//! The process-wide dialect registry.
//!
//! A read-mostly map from engine identity to its [`Dialect`] (and its
//! [`DriverFactory`], for engines with a driver linked in). Reads clone an
//! immutable snapshot out of an `RwLock`; writes rebuild the snapshot under
//! the write lock, so registration is safe at any time and lookups never
//! block each other.
//!
//! Initialization is explicit: hosts call [`initialize`] once at startup
//! (extra calls are harmless) before anything asks for a connection. No
//! static-initialization ordering is relied on.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::connection::{pool, ConnectionStringBuilder};
use crate::driver::{DriverConnection, DriverFactory, SqliteDriverFactory};

use super::{
    DatabaseType, Dialect, MsSqlDialect, MySqlDialect, OracleDialect, PostgreSqlDialect,
    SqliteDialect,
};

/// Errors from registry lookups.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No dialect has been registered for the engine. Usually means
    /// [`initialize`] was never called.
    #[error("no dialect implementation registered for {0}; was the registry initialized?")]
    ImplementationNotFound(DatabaseType),

    /// The dialect exists but no driver factory was registered for it.
    #[error("no driver factory registered for {0}; register one with register_driver")]
    DriverNotFound(DatabaseType),
}

#[derive(Default, Clone)]
struct Snapshot {
    dialects: HashMap<DatabaseType, Arc<dyn Dialect>>,
    drivers: HashMap<DatabaseType, Arc<dyn DriverFactory>>,
}

static REGISTRY: Lazy<RwLock<Arc<Snapshot>>> =
    Lazy::new(|| RwLock::new(Arc::new(Snapshot::default())));

fn read() -> Arc<Snapshot> {
    REGISTRY
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

fn mutate(f: impl FnOnce(&mut Snapshot)) {
    let mut guard = REGISTRY
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut next = (**guard).clone();
    f(&mut next);
    *guard = Arc::new(next);
}

/// Register every dialect compiled into the crate, plus the in-process
/// SQLite driver. Idempotent; re-registration overwrites with no effect.
pub fn initialize() {
    register(Arc::new(MsSqlDialect::new()));
    register(Arc::new(MySqlDialect::new()));
    register(Arc::new(PostgreSqlDialect::new()));
    register(Arc::new(OracleDialect::new()));
    register(Arc::new(SqliteDialect::new()));
    register_driver(Arc::new(SqliteDriverFactory));
}

/// Register (or replace) a dialect.
pub fn register(dialect: Arc<dyn Dialect>) {
    mutate(|snapshot| {
        snapshot.dialects.insert(dialect.database_type(), dialect);
    });
}

/// Register (or replace) a driver factory for its engine.
pub fn register_driver(factory: Arc<dyn DriverFactory>) {
    mutate(|snapshot| {
        snapshot.drivers.insert(factory.database_type(), factory);
    });
}

/// The dialect for an engine.
pub fn get(database_type: DatabaseType) -> Result<Arc<dyn Dialect>, RegistryError> {
    read()
        .dialects
        .get(&database_type)
        .cloned()
        .ok_or(RegistryError::ImplementationNotFound(database_type))
}

/// The dialect a connection-string builder belongs to.
pub fn dialect_for_builder(
    builder: &ConnectionStringBuilder,
) -> Result<Arc<dyn Dialect>, RegistryError> {
    get(builder.database_type())
}

/// The dialect a live driver connection belongs to.
pub fn dialect_for_connection(
    connection: &dyn DriverConnection,
) -> Result<Arc<dyn Dialect>, RegistryError> {
    get(connection.database_type())
}

/// The driver factory for an engine.
pub fn driver(database_type: DatabaseType) -> Result<Arc<dyn DriverFactory>, RegistryError> {
    read()
        .drivers
        .get(&database_type)
        .cloned()
        .ok_or(RegistryError::DriverNotFound(database_type))
}

/// Dispose pooled connections everywhere. Errors during disposal are
/// swallowed; registered dialects stay registered.
pub fn shutdown() {
    pool::clear_all();
}
