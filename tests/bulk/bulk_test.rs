//! Bulk-ingest validation against real destination columns: width overflow,
//! integer ranges, decimal scale, null rejection, and the fail-before-execute
//! guarantee.

use omnisql::bulk::{BulkError, TableData};
use omnisql::connection::ConnectionStringBuilder;
use omnisql::dialect::{registry, DatabaseType};
use omnisql::discovery::{DiscoveredDatabase, DiscoveredServer};
use omnisql::driver::Value;
use omnisql::types::ValueKind;

fn memory_database() -> DiscoveredDatabase {
    registry::initialize();
    let server = DiscoveredServer::new(
        ConnectionStringBuilder::new(DatabaseType::Sqlite).with_database(":memory:"),
    );
    server.expect_database(":memory:")
}

fn create(database: &DiscoveredDatabase, ddl: &str) {
    let mut connection = database.get_managed_connection(None).unwrap();
    connection.execute(ddl).unwrap();
}

#[test]
fn test_string_overflow_aborts_with_row_indexed_error() {
    let database = memory_database();
    create(&database, "CREATE TABLE t (Name varchar(10))");
    let table = database.expect_table("t", None);

    let mut data = TableData::new();
    data.add_column("Name", ValueKind::Text);
    data.add_row(vec![Value::from("Hello World!")]).unwrap();

    let mut bulk = table.begin_bulk_insert().unwrap();
    match bulk.upload(&mut data) {
        Err(BulkError::Validation {
            row,
            column,
            value,
            problem,
        }) => {
            assert_eq!(row, 1);
            assert_eq!(column, "Name");
            assert_eq!(value, "Hello World!");
            assert!(problem.contains("12"), "{}", problem);
            assert!(problem.contains("10"), "{}", problem);
        }
        other => panic!("expected a validation failure, got {:?}", other),
    }
    // fail-before-execute: nothing was inserted
    bulk.dispose();
    assert_eq!(table.get_row_count().unwrap(), 0);
}

#[test]
fn test_integer_boundaries_are_exact() {
    let database = memory_database();
    create(&database, "CREATE TABLE t (Small tinyint)");
    let table = database.expect_table("t", None);

    let mut ok = TableData::new();
    ok.add_column("Small", ValueKind::Int32);
    ok.add_row(vec![Value::Int(255)]).unwrap();
    assert_eq!(table.begin_bulk_insert().unwrap().upload(&mut ok).unwrap(), 1);

    let mut too_big = TableData::new();
    too_big.add_column("Small", ValueKind::Int32);
    too_big.add_row(vec![Value::Int(256)]).unwrap();
    let err = table
        .begin_bulk_insert()
        .unwrap()
        .upload(&mut too_big)
        .unwrap_err();
    assert!(matches!(err, BulkError::Validation { row: 1, .. }), "{}", err);
    assert_eq!(table.get_row_count().unwrap(), 1);
}

#[test]
fn test_decimal_scale_and_magnitude() {
    let database = memory_database();
    create(&database, "CREATE TABLE t (Sanity decimal(5,3))");
    let table = database.expect_table("t", None);

    let mut ok = TableData::new();
    ok.add_column("Sanity", ValueKind::Text);
    ok.add_row(vec![Value::from("12.345")]).unwrap();
    // trailing zeros do not count toward scale
    ok.add_row(vec![Value::from("1.5000")]).unwrap();
    assert_eq!(table.begin_bulk_insert().unwrap().upload(&mut ok).unwrap(), 2);

    // four significant decimal places exceeds scale 3
    let mut too_precise = TableData::new();
    too_precise.add_column("Sanity", ValueKind::Text);
    too_precise.add_row(vec![Value::from("1.2345")]).unwrap();
    assert!(table
        .begin_bulk_insert()
        .unwrap()
        .upload(&mut too_precise)
        .is_err());

    // three digits before the point exceeds precision - scale = 2
    let mut too_big = TableData::new();
    too_big.add_column("Sanity", ValueKind::Text);
    too_big.add_row(vec![Value::from("123.45")]).unwrap();
    assert!(table
        .begin_bulk_insert()
        .unwrap()
        .upload(&mut too_big)
        .is_err());
}

#[test]
fn test_blank_strings_coerce_to_null_then_fail_not_null() {
    let database = memory_database();
    create(&database, "CREATE TABLE t (Name varchar(10) NOT NULL)");
    let table = database.expect_table("t", None);

    let mut data = TableData::new();
    data.add_column("Name", ValueKind::Text);
    data.add_row(vec![Value::from("   ")]).unwrap();

    let err = table
        .begin_bulk_insert()
        .unwrap()
        .upload(&mut data)
        .unwrap_err();
    match err {
        BulkError::Validation { problem, .. } => {
            assert!(problem.contains("null"), "{}", problem)
        }
        other => panic!("expected a null rejection, got {}", other),
    }
}

#[test]
fn test_unmatched_input_column_is_a_mapping_error() {
    let database = memory_database();
    create(&database, "CREATE TABLE t (Name varchar(10))");
    let table = database.expect_table("t", None);

    let mut data = TableData::new();
    data.add_column("Name", ValueKind::Text);
    data.add_column("Uninvited", ValueKind::Text);
    data.add_row(vec![Value::from("a"), Value::from("b")]).unwrap();

    let err = table
        .begin_bulk_insert()
        .unwrap()
        .upload(&mut data)
        .unwrap_err();
    assert!(matches!(err, BulkError::ColumnMapping(name) if name == "Uninvited"));

    // the caller can opt into tolerating extras
    let mut bulk = table.begin_bulk_insert().unwrap();
    bulk.allow_unmatched_input_columns = true;
    assert_eq!(bulk.upload(&mut data).unwrap(), 1);
}

#[test]
fn test_string_dates_convert_with_sniffed_ordering() {
    let database = memory_database();
    create(&database, "CREATE TABLE t (Seen datetime)");
    let table = database.expect_table("t", None);

    let mut data = TableData::new();
    data.add_column("Seen", ValueKind::Text);
    // 25/12 forces day-first; the ambiguous rows follow suit
    data.add_row(vec![Value::from("25/12/2001")]).unwrap();
    data.add_row(vec![Value::from("01/02/2002")]).unwrap();

    assert_eq!(
        table.begin_bulk_insert().unwrap().upload(&mut data).unwrap(),
        2
    );
    assert_eq!(data.columns()[0].kind, ValueKind::DateTime);

    let mut connection = database.get_managed_connection(None).unwrap();
    let result = connection
        .query("SELECT Seen FROM t ORDER BY Seen")
        .unwrap();
    assert_eq!(result.rows[0][0].as_str(), Some("2001-12-25 00:00:00"));
    assert_eq!(result.rows[1][0].as_str(), Some("2002-02-01 00:00:00"));
}

#[test]
fn test_unparseable_date_aborts_the_whole_load() {
    let database = memory_database();
    create(&database, "CREATE TABLE t (Seen datetime)");
    let table = database.expect_table("t", None);

    let mut data = TableData::new();
    data.add_column("Seen", ValueKind::Text);
    data.add_row(vec![Value::from("2001-01-01")]).unwrap();
    data.add_row(vec![Value::from("the future")]).unwrap();

    let err = table
        .begin_bulk_insert()
        .unwrap()
        .upload(&mut data)
        .unwrap_err();
    assert!(
        matches!(err, BulkError::Parse { row: 2, .. }),
        "expected a parse failure on row 2, got {}",
        err
    );
    assert_eq!(table.get_row_count().unwrap(), 0);
}

#[test]
fn test_happy_path_inserts_every_row() {
    let database = memory_database();
    create(
        &database,
        "CREATE TABLE People (Id int NOT NULL, Name varchar(20), Score decimal(5,2))",
    );
    let table = database.expect_table("People", None);

    let mut data = TableData::new();
    data.add_column("Id", ValueKind::Int32);
    data.add_column("Name", ValueKind::Text);
    data.add_column("Score", ValueKind::Text);
    for i in 0..1200i64 {
        data.add_row(vec![
            Value::Int(i),
            Value::from(format!("person {}", i)),
            Value::from("12.5"),
        ])
        .unwrap();
    }

    // more rows than one batch, so chunking is exercised
    let uploaded = table.begin_bulk_insert().unwrap().upload(&mut data).unwrap();
    assert_eq!(uploaded, 1200);
    assert_eq!(table.get_row_count().unwrap(), 1200);
}
