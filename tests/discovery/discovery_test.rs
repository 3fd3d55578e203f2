//! End-to-end discovery against the SQLite driver: create, inspect, mutate
//! and drop real objects, and verify that the engine-impossible operations
//! come back as typed errors.

use omnisql::connection::ConnectionStringBuilder;
use omnisql::dialect::{registry, DatabaseType};
use omnisql::discovery::{
    relationship_topological_sort, DiscoveredDatabase, DiscoveredServer, DiscoveryError,
};
use omnisql::scripting::ColumnDefinition;
use omnisql::types::{TypeRequest, ValueKind};

fn memory_database() -> DiscoveredDatabase {
    registry::initialize();
    let server = DiscoveredServer::new(
        ConnectionStringBuilder::new(DatabaseType::Sqlite).with_database(":memory:"),
    );
    server.expect_database(":memory:")
}

#[test]
fn test_create_table_then_exists_then_drop() {
    let database = memory_database();
    let columns = vec![
        ColumnDefinition::new("Id", TypeRequest::new(ValueKind::Int32)).primary_key(),
        ColumnDefinition::new("Name", TypeRequest::text(50)).not_null(),
    ];
    let table = database.create_table("People", &columns).unwrap();
    assert!(table.exists().unwrap());
    assert!(table.is_empty().unwrap());

    table.drop().unwrap();
    assert!(!table.exists().unwrap());
}

#[test]
fn test_discover_tables_and_views() {
    let database = memory_database();
    let mut connection = database.get_managed_connection(None).unwrap();
    connection.execute("CREATE TABLE t1 (x INTEGER)").unwrap();
    connection.execute("CREATE TABLE t2 (x INTEGER)").unwrap();
    connection
        .execute("CREATE VIEW v1 AS SELECT x FROM t1")
        .unwrap();
    drop(connection);

    let tables = database.discover_tables(false, None).unwrap();
    assert_eq!(tables.len(), 2);

    let with_views = database.discover_tables(true, None).unwrap();
    assert_eq!(with_views.len(), 3);
    assert!(with_views
        .iter()
        .any(|t| t.name() == "v1" && t.kind() == omnisql::discovery::TableKind::View));
}

#[test]
fn test_discover_columns_reports_types_keys_and_nullability() {
    let database = memory_database();
    let mut connection = database.get_managed_connection(None).unwrap();
    connection
        .execute(
            "CREATE TABLE People (\
             Id INTEGER PRIMARY KEY AUTOINCREMENT,\
             Name varchar(50) NOT NULL,\
             Height decimal(5,3),\
             Notes TEXT)",
        )
        .unwrap();
    drop(connection);

    let table = database.expect_table("People", None);
    let columns = table.discover_columns().unwrap();
    assert_eq!(columns.len(), 4);

    let id = columns.iter().find(|c| c.name == "Id").unwrap();
    assert!(id.is_primary_key);
    assert!(id.is_auto_increment);
    assert!(!id.allow_nulls);

    let name = columns.iter().find(|c| c.name == "Name").unwrap();
    assert_eq!(name.data_type, "varchar(50)");
    assert!(!name.allow_nulls);
    let request = name.type_request(DatabaseType::Sqlite).unwrap();
    assert_eq!(request.kind, ValueKind::Text);
    assert_eq!(request.width, Some(50));

    let height = columns.iter().find(|c| c.name == "Height").unwrap();
    assert!(height.allow_nulls);
    let request = height.type_request(DatabaseType::Sqlite).unwrap();
    assert_eq!(request.kind, ValueKind::Decimal);

    assert!(table.has_primary_key().unwrap());
}

#[test]
fn test_row_count_and_truncate() {
    let database = memory_database();
    let mut connection = database.get_managed_connection(None).unwrap();
    connection.execute("CREATE TABLE t (x INTEGER)").unwrap();
    connection
        .execute("INSERT INTO t VALUES (1),(2),(3)")
        .unwrap();
    drop(connection);

    let table = database.expect_table("t", None);
    assert_eq!(table.get_row_count().unwrap(), 3);
    assert!(!table.is_empty().unwrap());

    table.truncate().unwrap();
    assert_eq!(table.get_row_count().unwrap(), 0);
}

#[test]
fn test_add_column_and_index() {
    let database = memory_database();
    let table = database
        .create_table(
            "t",
            &[ColumnDefinition::new("Id", TypeRequest::new(ValueKind::Int32)).primary_key()],
        )
        .unwrap();

    table
        .add_column("Comment", &TypeRequest::text(100), true)
        .unwrap();
    let columns = table.discover_columns().unwrap();
    assert!(columns.iter().any(|c| c.name == "Comment"));

    table.create_index("ix_comment", &["Comment"], false).unwrap();
    table.drop_index("ix_comment").unwrap();
}

#[test]
fn test_engine_impossible_alters_are_typed_errors() {
    let database = memory_database();
    let table = database
        .create_table(
            "t",
            &[
                ColumnDefinition::new("Id", TypeRequest::new(ValueKind::Int32)).primary_key(),
                ColumnDefinition::new("X", TypeRequest::new(ValueKind::Int32)),
            ],
        )
        .unwrap();

    for result in [
        table.drop_column("X"),
        table.create_primary_key(&["X"]),
    ] {
        match result {
            Err(DiscoveryError::NotSupported { database, .. }) => {
                assert_eq!(database, DatabaseType::Sqlite)
            }
            other => panic!("expected NotSupported, got {:?}", other),
        }
    }
}

#[test]
fn test_failed_ddl_carries_the_offending_sql() {
    let database = memory_database();
    let table = database.expect_table("no_such_table", None);
    match table.truncate() {
        Err(DiscoveryError::AlterFailed { sql, .. }) => {
            assert!(sql.contains("no_such_table"), "{}", sql)
        }
        other => panic!("expected AlterFailed, got {:?}", other),
    }
}

#[test]
fn test_relationships_and_drop_order() {
    let database = memory_database();
    let mut connection = database.get_managed_connection(None).unwrap();
    connection
        .execute("CREATE TABLE Parent (Id INTEGER PRIMARY KEY)")
        .unwrap();
    connection
        .execute(
            "CREATE TABLE Child (\
             Id INTEGER PRIMARY KEY,\
             Parent_Id INTEGER REFERENCES Parent(Id) ON DELETE CASCADE)",
        )
        .unwrap();
    drop(connection);

    let parent = database.expect_table("Parent", None);
    let relationships = parent.discover_relationships().unwrap();
    assert_eq!(relationships.len(), 1);
    let relationship = &relationships[0];
    assert_eq!(relationship.pk_table, "Parent");
    assert_eq!(relationship.fk_table, "Child");
    assert_eq!(
        relationship.column_pairs,
        vec![("Id".to_string(), "Parent_Id".to_string())]
    );
    assert!(relationship.cascade_delete);

    let order = relationship_topological_sort(
        &["Parent".to_string(), "Child".to_string()],
        &relationships,
    )
    .unwrap();
    assert_eq!(order, vec!["Child", "Parent"]);
}

#[test]
fn test_child_table_has_no_inbound_relationships() {
    let database = memory_database();
    let mut connection = database.get_managed_connection(None).unwrap();
    connection
        .execute("CREATE TABLE Parent (Id INTEGER PRIMARY KEY)")
        .unwrap();
    connection
        .execute(
            "CREATE TABLE Child (Id INTEGER PRIMARY KEY, Parent_Id INTEGER REFERENCES Parent(Id))",
        )
        .unwrap();
    drop(connection);

    let child = database.expect_table("Child", None);
    assert!(child.discover_relationships().unwrap().is_empty());
}

#[test]
fn test_file_database_lifecycle() {
    registry::initialize();
    let path = std::env::temp_dir().join("omnisql_lifecycle_test.db");
    let path_str = path.to_string_lossy().to_string();
    let _ = std::fs::remove_file(&path);

    let server = DiscoveredServer::new(
        ConnectionStringBuilder::new(DatabaseType::Sqlite).with_database(&path_str),
    );
    let database = server.expect_database(&path_str);
    assert!(!database.exists().unwrap());

    database.create().unwrap();
    assert!(database.exists().unwrap());

    database.drop().unwrap();
    assert!(!database.exists().unwrap());
}
