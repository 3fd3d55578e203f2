//! Table scripting: reproduce a real table's DDL, retarget it across
//! dialects with type translation, and check the scripted DDL round-trips
//! through discovery.

use omnisql::connection::ConnectionStringBuilder;
use omnisql::dialect::{registry, DatabaseType};
use omnisql::discovery::{DiscoveredDatabase, DiscoveredServer};
use omnisql::scripting::{create_table_sql, ColumnDefinition, TableScriptOptions, TargetTable};
use omnisql::types::{DecimalSize, TypeRequest, ValueKind};

fn memory_database() -> DiscoveredDatabase {
    registry::initialize();
    let server = DiscoveredServer::new(
        ConnectionStringBuilder::new(DatabaseType::Sqlite).with_database(":memory:"),
    );
    server.expect_database(":memory:")
}

#[test]
fn test_scripted_ddl_round_trips_through_discovery() {
    let database = memory_database();
    let columns = vec![
        ColumnDefinition::new("MyCol", TypeRequest::text(100)).primary_key(),
        ColumnDefinition::new("DateOfBirth", TypeRequest::new(ValueKind::DateTime)),
        ColumnDefinition::new("Sanity", TypeRequest::decimal(DecimalSize::new(2, 3))).not_null(),
    ];
    let table = database.create_table("Source", &columns).unwrap();

    let script = table
        .script_table_creation(&TableScriptOptions {
            target: Some(TargetTable {
                database_type: DatabaseType::Sqlite,
                database: ":memory:".into(),
                schema: None,
                table: "Cloned".into(),
            }),
            ..TableScriptOptions::default()
        })
        .unwrap();

    let mut connection = database.get_managed_connection(None).unwrap();
    connection.execute(&script).unwrap();
    drop(connection);

    let clone = database.expect_table("Cloned", None);
    let original_columns = table.discover_columns().unwrap();
    let cloned_columns = clone.discover_columns().unwrap();
    assert_eq!(original_columns.len(), cloned_columns.len());
    for (original, cloned) in original_columns.iter().zip(&cloned_columns) {
        assert_eq!(original.name, cloned.name);
        assert_eq!(original.data_type, cloned.data_type);
        assert_eq!(original.is_primary_key, cloned.is_primary_key);
    }
}

// Cross-dialect clone: a table whose columns were declared with MsSql-shaped
// spellings scripts as MySql DDL with every type translated.
#[test]
fn test_cross_dialect_clone_translates_every_column() {
    let database = memory_database();
    let mut connection = database.get_managed_connection(None).unwrap();
    connection
        .execute(
            "CREATE TABLE Source (\
             MyCol varchar(100) NOT NULL PRIMARY KEY,\
             DateOfBirth datetime,\
             Sanity decimal(5,3))",
        )
        .unwrap();
    drop(connection);

    let table = database.expect_table("Source", None);
    let script = table
        .script_table_creation(&TableScriptOptions {
            target: Some(TargetTable {
                database_type: DatabaseType::MySql,
                database: "mydb".into(),
                schema: None,
                table: "Cloned".into(),
            }),
            ..TableScriptOptions::default()
        })
        .unwrap();

    assert!(script.starts_with("CREATE TABLE `mydb`.`Cloned`"));
    assert!(script.contains("`MyCol` varchar(100) NOT NULL"));
    assert!(script.contains("`DateOfBirth` datetime NULL"));
    assert!(script.contains("`Sanity` decimal(5,3) NULL"));
    assert!(script.contains("PRIMARY KEY (`MyCol`)"));
}

#[test]
fn test_script_options_drop_constraints() {
    let database = memory_database();
    let mut connection = database.get_managed_connection(None).unwrap();
    connection
        .execute("CREATE TABLE Source (Id int NOT NULL PRIMARY KEY, Name varchar(10) NOT NULL)")
        .unwrap();
    drop(connection);

    let table = database.expect_table("Source", None);
    let script = table
        .script_table_creation(&TableScriptOptions {
            drop_primary_keys: true,
            drop_nullability: true,
            target: Some(TargetTable {
                database_type: DatabaseType::MsSql,
                database: "mydb".into(),
                schema: None,
                table: "Relaxed".into(),
            }),
            ..TableScriptOptions::default()
        })
        .unwrap();

    assert!(!script.contains("PRIMARY KEY"));
    assert!(!script.contains("NOT NULL"));
    assert!(script.contains("[Id] int NULL"));
}

#[test]
fn test_convert_identity_becomes_a_plain_int() {
    let database = memory_database();
    let mut connection = database.get_managed_connection(None).unwrap();
    connection
        .execute("CREATE TABLE Source (Id INTEGER PRIMARY KEY AUTOINCREMENT, Name varchar(10))")
        .unwrap();
    drop(connection);

    let table = database.expect_table("Source", None);
    let script = table
        .script_table_creation(&TableScriptOptions {
            convert_identity_to_int: true,
            target: Some(TargetTable {
                database_type: DatabaseType::MsSql,
                database: "mydb".into(),
                schema: None,
                table: "Plain".into(),
            }),
            ..TableScriptOptions::default()
        })
        .unwrap();

    assert!(script.contains("[Id] int"));
    assert!(!script.contains("IDENTITY"));
}

#[test]
fn test_create_table_sql_per_dialect_identity() {
    registry::initialize();
    let columns = vec![
        ColumnDefinition::new("Id", TypeRequest::new(ValueKind::Int32))
            .primary_key()
            .auto_increment(),
    ];
    let cases = [
        (DatabaseType::MsSql, "IDENTITY(1,1)"),
        (DatabaseType::MySql, "AUTO_INCREMENT"),
        (DatabaseType::PostgreSql, "GENERATED ALWAYS AS IDENTITY"),
        (DatabaseType::Oracle, "GENERATED BY DEFAULT AS IDENTITY"),
        (DatabaseType::Sqlite, "INTEGER PRIMARY KEY AUTOINCREMENT"),
    ];
    for (db, expected) in cases {
        let sql = create_table_sql(db, "mydb", None, "t", &columns).unwrap();
        assert!(sql.contains(expected), "{}: {}", db, sql);
    }
}
