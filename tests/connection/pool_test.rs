//! Pool behavior: session reuse, dangling-transaction eviction, server-level
//! database switching, and transaction lifecycle guarantees.
//!
//! SQLite exercises the real driver end to end. Server-level pooling (the
//! MsSql/MySql strategy) is exercised through a scripted driver registered
//! for MsSql, which records opens and database switches and answers the
//! `@@TRANCOUNT` probe from its own transaction flag.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use omnisql::connection::{pool, ConnectionStringBuilder};
use omnisql::dialect::{registry, DatabaseType};
use omnisql::discovery::DiscoveredServer;
use omnisql::driver::{
    ConnectionState, DriverConnection, DriverFactory, DriverResult, ResultSet, Value,
};

/// Capture the pool's eviction/disposal diagnostics when a test runs with
/// `RUST_LOG` set.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sqlite_server() -> DiscoveredServer {
    init_logging();
    registry::initialize();
    pool::clear_current_thread();
    DiscoveredServer::new(
        ConnectionStringBuilder::new(DatabaseType::Sqlite).with_database(":memory:"),
    )
}

#[test]
fn test_pooled_session_is_reused_on_the_same_thread() {
    let server = sqlite_server();
    {
        let mut connection = server.get_managed_connection(None).unwrap();
        assert!(!connection.close_on_dispose());
        connection.execute("CREATE TABLE marker (x INTEGER)").unwrap();
    }
    assert_eq!(pool::pooled_count_for_current_thread(), 1);

    // an in-memory table only survives if the same session came back
    let mut connection = server.get_managed_connection(None).unwrap();
    let result = connection.query("SELECT count(*) FROM marker").unwrap();
    assert_eq!(result.scalar().and_then(|v| v.as_i64()), Some(0));
}

#[test]
fn test_pooled_connection_is_open_and_transaction_free() {
    let server = sqlite_server();
    drop(server.get_managed_connection(None).unwrap());

    let connection = server.get_managed_connection(None).unwrap();
    assert_eq!(connection.state(), ConnectionState::Open);
    assert!(!connection.in_transaction());
}

#[test]
fn test_dangling_transaction_yields_a_clean_connection() {
    let server = sqlite_server();
    {
        let mut connection = server.get_managed_connection(None).unwrap();
        connection.execute("CREATE TABLE marker (x INTEGER)").unwrap();
        // a raw BEGIN the wrapper knows nothing about, never finished
        connection.execute("BEGIN TRANSACTION").unwrap();
        assert!(connection.in_transaction());
    }

    // next acquire must never see the dirty session
    let mut connection = server.get_managed_connection(None).unwrap();
    assert!(!connection.in_transaction());
    // the dirty session was evicted wholesale: this is a fresh in-memory
    // database with no marker table
    assert!(connection.query("SELECT count(*) FROM marker").is_err());
}

#[test]
fn test_clear_current_thread_disposes_everything() {
    let server = sqlite_server();
    drop(server.get_managed_connection(None).unwrap());
    assert_eq!(pool::pooled_count_for_current_thread(), 1);

    pool::clear_current_thread();
    assert_eq!(pool::pooled_count_for_current_thread(), 0);
}

#[test]
fn test_caller_transaction_bypasses_the_pool() {
    let server = sqlite_server();
    let transaction = server.begin_new_transacted_connection().unwrap();

    {
        let mut connection = server.get_managed_connection(Some(&transaction)).unwrap();
        connection.execute("CREATE TABLE t (x INTEGER)").unwrap();
        connection.execute("INSERT INTO t VALUES (1)").unwrap();
    }
    // nothing was checked in; the transaction owns its session
    assert_eq!(pool::pooled_count_for_current_thread(), 0);

    transaction.commit_and_close().unwrap();
    // terminal calls are idempotent in any order
    transaction.commit_and_close().unwrap();
    transaction.abandon_and_close().unwrap();
}

#[test]
fn test_subordinate_connection_cannot_close_the_transaction() {
    let server = sqlite_server();
    let transaction = server.begin_new_transacted_connection().unwrap();
    {
        let mut subordinate = server.get_managed_connection(Some(&transaction)).unwrap();
        subordinate.execute("CREATE TABLE t (x INTEGER)").unwrap();
        // subordinate goes out of scope here
    }
    // the transaction is still usable afterwards
    assert!(transaction.is_active());
    let mut again = server.get_managed_connection(Some(&transaction)).unwrap();
    again.execute("INSERT INTO t VALUES (1)").unwrap();
    transaction.abandon_and_close().unwrap();
}

// =============================================================================
// Server-level pooling via a scripted MsSql driver
// =============================================================================

#[derive(Debug, Default)]
struct ScriptLog {
    opens: AtomicUsize,
    switches: Mutex<Vec<String>>,
}

#[derive(Debug)]
struct ScriptedConnection {
    log: Arc<ScriptLog>,
    state: ConnectionState,
    in_transaction: bool,
}

impl DriverConnection for ScriptedConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MsSql
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn execute(&mut self, sql: &str) -> DriverResult<u64> {
        let upper = sql.trim().to_uppercase();
        if upper.starts_with("BEGIN") {
            self.in_transaction = true;
        } else if upper.starts_with("COMMIT") || upper.starts_with("ROLLBACK") {
            self.in_transaction = false;
        }
        Ok(0)
    }

    fn query(&mut self, sql: &str) -> DriverResult<ResultSet> {
        let value = if sql.contains("@@TRANCOUNT") {
            Value::Int(i64::from(self.in_transaction))
        } else {
            Value::Int(1)
        };
        Ok(ResultSet {
            columns: vec!["value".into()],
            rows: vec![vec![value]],
        })
    }

    fn begin(&mut self) -> DriverResult<()> {
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> DriverResult<()> {
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> DriverResult<()> {
        self.in_transaction = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn change_database(&mut self, database: &str) -> DriverResult<()> {
        self.log.switches.lock().unwrap().push(database.to_string());
        Ok(())
    }

    fn set_timeout(&mut self, _timeout: Duration) {}

    fn close(&mut self) -> DriverResult<()> {
        self.state = ConnectionState::Closed;
        Ok(())
    }
}

#[derive(Debug)]
struct ScriptedFactory {
    log: Arc<ScriptLog>,
}

impl DriverFactory for ScriptedFactory {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MsSql
    }

    fn open(&self, _builder: &ConnectionStringBuilder) -> DriverResult<Box<dyn DriverConnection>> {
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedConnection {
            log: self.log.clone(),
            state: ConnectionState::Open,
            in_transaction: false,
        }))
    }
}

fn scripted_mssql() -> (DiscoveredServer, Arc<ScriptLog>) {
    init_logging();
    registry::initialize();
    pool::clear_current_thread();
    let log = Arc::new(ScriptLog::default());
    registry::register_driver(Arc::new(ScriptedFactory { log: log.clone() }));
    let server = DiscoveredServer::new(
        ConnectionStringBuilder::new(DatabaseType::MsSql)
            .with_server("localhost")
            .with_database("db1"),
    );
    (server, log)
}

#[test]
#[serial_test::serial]
fn test_server_level_pool_switches_databases_on_one_session() {
    let (server, log) = scripted_mssql();

    drop(server.get_managed_connection(None).unwrap());
    assert_eq!(log.opens.load(Ordering::SeqCst), 1);
    assert_eq!(log.switches.lock().unwrap().as_slice(), ["db1"]);

    // a different database on the same server reuses the session via USE
    let other = DiscoveredServer::new(
        ConnectionStringBuilder::new(DatabaseType::MsSql)
            .with_server("localhost")
            .with_database("db2"),
    );
    drop(other.get_managed_connection(None).unwrap());
    assert_eq!(log.opens.load(Ordering::SeqCst), 1, "no second session");
    assert_eq!(log.switches.lock().unwrap().as_slice(), ["db1", "db2"]);

    // same database again: no redundant switch
    drop(other.get_managed_connection(None).unwrap());
    assert_eq!(log.switches.lock().unwrap().as_slice(), ["db1", "db2"]);
}

#[test]
#[serial_test::serial]
fn test_trancount_probe_evicts_dirty_mssql_sessions() {
    let (server, log) = scripted_mssql();

    {
        let mut connection = server.get_managed_connection(None).unwrap();
        connection.execute("BEGIN TRANSACTION").unwrap();
    }
    // the probe sees @@TRANCOUNT = 1 and a fresh session is opened
    let connection = server.get_managed_connection(None).unwrap();
    assert!(!connection.in_transaction());
    drop(connection);
    assert_eq!(log.opens.load(Ordering::SeqCst), 2);
}
