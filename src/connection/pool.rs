//! The thread-affine connection pool.
//!
//! Pool state is a process-wide map from thread identity to that thread's
//! own key→session map, so regular operations never contend across threads
//! and shutdown can still walk everything. A session checked out on thread A
//! can only check back in on thread A.
//!
//! Reuse strategy is the dialect's choice:
//!
//! - MsSql/MySql: one session per server, keyed on the connection string
//!   with the database stripped; the session binds to `master`/`mysql`
//!   first and switches databases on demand
//! - PostgreSql/Sqlite: one session per (server, database); no switching
//! - Oracle: no thread-local pooling at all, the driver's native pool is
//!   relied on
//!
//! Before a pooled session is handed out it must be open, transaction-free,
//! answer the dialect's liveness probe, and (where the engine can say, which
//! is MsSql via `@@TRANCOUNT`) report no dangling transaction. Anything that
//! fails validation is disposed silently and replaced.

use std::collections::HashMap;
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use log::debug;
use once_cell::sync::Lazy;

use crate::config;
use crate::dialect::registry;
use crate::dialect::{Dialect, PoolStrategy};
use crate::driver::{ConnectionState, DriverConnection};

use super::managed::{ConnectionError, ManagedConnection, ManagedTransaction};
use super::string::ConnectionStringBuilder;

struct PoolEntry {
    connection: Option<Box<dyn DriverConnection>>,
    current_database: Option<String>,
}

type ThreadPools = HashMap<ThreadId, HashMap<String, PoolEntry>>;

static POOLS: Lazy<Mutex<ThreadPools>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Where a checked-out session goes back to on drop.
#[derive(Debug)]
pub(crate) struct PoolSlot {
    key: String,
    thread: ThreadId,
    current_database: Option<String>,
}

impl PoolSlot {
    pub(crate) fn key(&self) -> &str {
        &self.key
    }
}

/// Acquire a managed connection for the builder's server and database.
///
/// A caller-supplied transaction always wins: the returned wrapper shares
/// the transaction's session and the pool is never consulted. Otherwise the
/// dialect's strategy decides between pooled reuse and a fresh
/// close-on-dispose connection.
pub fn acquire(
    builder: &ConnectionStringBuilder,
    transaction: Option<&ManagedTransaction>,
) -> Result<ManagedConnection, ConnectionError> {
    if let Some(transaction) = transaction {
        return Ok(ManagedConnection::from_transaction(
            transaction.clone(),
            builder.database_type(),
        ));
    }

    let dialect = registry::get(builder.database_type())?;
    match dialect.pool_strategy() {
        PoolStrategy::NoPooling => {
            let connection = open_connection(dialect.as_ref(), builder)?;
            Ok(ManagedConnection::from_owned(connection, true))
        }
        PoolStrategy::DatabaseLevel => pooled_acquire(
            builder.connection_string(),
            builder,
            dialect.as_ref(),
            None,
        ),
        PoolStrategy::ServerLevel { system_database } => {
            let key = builder.connection_string_without_database();
            let open_builder = builder.clone().with_database(system_database);
            pooled_acquire(key, &open_builder, dialect.as_ref(), builder.database())
        }
    }
}

fn pooled_acquire(
    key: String,
    open_builder: &ConnectionStringBuilder,
    dialect: &dyn Dialect,
    target_database: Option<String>,
) -> Result<ManagedConnection, ConnectionError> {
    let thread = thread::current().id();

    let existing = {
        let mut pools = lock_pools();
        pools
            .entry(thread)
            .or_default()
            .get_mut(&key)
            .and_then(|entry| {
                entry
                    .connection
                    .take()
                    .map(|c| (c, entry.current_database.take()))
            })
    };

    if let Some((mut connection, mut current_database)) = existing {
        if validate(connection.as_mut(), dialect) {
            let mut switched_ok = true;
            if let Some(target) = &target_database {
                if current_database.as_deref() != Some(target.as_str()) {
                    match connection.change_database(target) {
                        Ok(()) => current_database = Some(target.clone()),
                        Err(e) => {
                            debug!("evicting pooled connection, database switch failed: {}", e);
                            switched_ok = false;
                        }
                    }
                }
            }
            if switched_ok {
                return Ok(ManagedConnection::from_pool(
                    connection,
                    PoolSlot {
                        key,
                        thread,
                        current_database,
                    },
                ));
            }
        } else {
            debug!("evicting pooled connection for key {:?}", key);
        }
        dispose(connection);
    }

    let mut connection = open_connection(dialect, open_builder)?;
    let mut current_database = open_builder.database();
    if let Some(target) = &target_database {
        connection.change_database(target)?;
        current_database = Some(target.clone());
    }
    Ok(ManagedConnection::from_pool(
        connection,
        PoolSlot {
            key,
            thread,
            current_database,
        },
    ))
}

/// Put a session back in its thread's pool. Called from
/// [`ManagedConnection`]'s drop; a session returned on the wrong thread is
/// disposed instead of pooled.
pub(crate) fn checkin(slot: PoolSlot, connection: Box<dyn DriverConnection>) {
    if slot.thread != thread::current().id() {
        debug!("connection for key {:?} returned on a different thread; disposing", slot.key);
        dispose(connection);
        return;
    }
    let mut pools = lock_pools();
    let entries = pools.entry(slot.thread).or_default();
    let entry = entries.entry(slot.key).or_insert(PoolEntry {
        connection: None,
        current_database: None,
    });
    if let Some(previous) = entry.connection.replace(connection) {
        // a fresh session was pooled while this one was out; keep the newer
        dispose(previous);
    }
    entry.current_database = slot.current_database;
}

fn open_connection(
    dialect: &dyn Dialect,
    builder: &ConnectionStringBuilder,
) -> Result<Box<dyn DriverConnection>, ConnectionError> {
    let factory = registry::driver(dialect.database_type())?;
    let retry = dialect.retry_policy();
    let mut attempt = 0u32;
    loop {
        match factory.open(builder) {
            Ok(connection) => return Ok(connection),
            Err(e) => {
                attempt += 1;
                match retry {
                    Some(policy) if attempt < policy.max_attempts => {
                        debug!("connection open attempt {} failed, retrying: {}", attempt, e);
                        thread::sleep(policy.backoff);
                    }
                    _ => return Err(e.into()),
                }
            }
        }
    }
}

fn validate(connection: &mut dyn DriverConnection, dialect: &dyn Dialect) -> bool {
    if connection.state() != ConnectionState::Open {
        return false;
    }
    if connection.in_transaction() {
        return false;
    }
    connection.set_timeout(config::Settings::global().probe_timeout);
    if connection.query(dialect.alive_probe_sql()).is_err() {
        return false;
    }
    if let Some(probe) = dialect.dangling_transaction_probe_sql() {
        match connection.query(probe) {
            Ok(result) => {
                if result.scalar().and_then(|v| v.as_i64()).unwrap_or(0) > 0 {
                    return false;
                }
            }
            Err(_) => return false,
        }
    }
    true
}

fn dispose(mut connection: Box<dyn DriverConnection>) {
    if let Err(e) = connection.close() {
        debug!("error disposing evicted connection: {}", e);
    }
}

fn lock_pools() -> std::sync::MutexGuard<'static, ThreadPools> {
    POOLS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Dispose every session pooled by the calling thread. Close errors are
/// swallowed.
pub fn clear_current_thread() {
    let entries = lock_pools().remove(&thread::current().id());
    if let Some(entries) = entries {
        for (_, entry) in entries {
            if let Some(connection) = entry.connection {
                dispose(connection);
            }
        }
    }
}

/// Dispose every pooled session on every thread. Shutdown hook; close
/// errors are swallowed.
pub fn clear_all() {
    let all: ThreadPools = std::mem::take(&mut *lock_pools());
    for (_, entries) in all {
        for (_, entry) in entries {
            if let Some(connection) = entry.connection {
                dispose(connection);
            }
        }
    }
}

/// Number of sessions currently parked for the calling thread.
pub fn pooled_count_for_current_thread() -> usize {
    lock_pools()
        .get(&thread::current().id())
        .map(|entries| {
            entries
                .values()
                .filter(|entry| entry.connection.is_some())
                .count()
        })
        .unwrap_or(0)
}
