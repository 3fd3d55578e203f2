//! Calendar-axis aggregates, executed for real against the SQLite driver.
//!
//! The load-bearing invariant: the result row count equals the bucket count
//! between the axis start and end inclusive, whether or not any source row
//! lands in a bucket.

use chrono::NaiveDate;
use omnisql::aggregate::{
    AggregateBuilder, AggregateLine, AggregateSql, AxisIncrement, LineRole, QueryAxis,
    QueryComponent,
};
use omnisql::connection::ConnectionStringBuilder;
use omnisql::dialect::{registry, DatabaseType};
use omnisql::discovery::DiscoveredServer;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// An in-memory database with 14 rows spread over 2001-01-01..2003-05-01.
fn seeded_database() -> omnisql::discovery::DiscoveredDatabase {
    registry::initialize();
    let server = DiscoveredServer::new(
        ConnectionStringBuilder::new(DatabaseType::Sqlite).with_database(":memory:"),
    );
    let database = server.expect_database(":memory:");
    let mut connection = database.get_managed_connection(None).unwrap();
    connection
        .execute("CREATE TABLE Sales (EventDate TEXT, Amount INTEGER)")
        .unwrap();
    let dates = [
        "2001-01-01",
        "2001-01-01",
        "2001-01-02",
        "2001-01-05",
        "2001-02-01",
        "2001-03-15",
        "2001-06-01",
        "2001-12-31",
        "2002-01-01",
        "2002-05-05",
        "2002-09-09",
        "2003-01-01",
        "2003-04-30",
        "2003-05-01",
    ];
    for (i, d) in dates.iter().enumerate() {
        connection
            .execute(&format!(
                "INSERT INTO Sales VALUES ('{} 10:00:00', {})",
                d, i
            ))
            .unwrap();
    }
    database
}

fn axis_sql(db: DatabaseType, axis: QueryAxis) -> String {
    let builder = AggregateBuilder::new(db)
        .line(
            AggregateLine::new("count(*) AS MyCount", QueryComponent::Select)
                .with_role(LineRole::CountFunction),
        )
        .line(AggregateLine::new("EventDate", QueryComponent::TimeColumn).with_role(LineRole::Axis))
        .line(AggregateLine::new("Sales", QueryComponent::From))
        .axis(axis);
    match builder.build().unwrap() {
        AggregateSql::Query(sql) => sql,
        other => panic!("expected a plain query, got {:?}", other),
    }
}

#[test]
fn test_day_axis_returns_one_row_per_day() {
    let database = seeded_database();
    let axis = QueryAxis::new(date(2001, 1, 1), date(2001, 1, 5), AxisIncrement::Day);
    let sql = axis_sql(DatabaseType::Sqlite, axis);

    let mut connection = database.get_managed_connection(None).unwrap();
    let result = connection.query(&sql).unwrap();
    assert_eq!(result.rows.len() as u64, axis.bucket_count().unwrap());
    assert_eq!(result.rows.len(), 5);

    // 2001-01-01 has two sales, 2001-01-03 has none (NULL from the join)
    assert_eq!(result.rows[0][0].as_str(), Some("2001-01-01"));
    assert_eq!(result.rows[0][1].as_i64(), Some(2));
    assert_eq!(result.rows[2][0].as_str(), Some("2001-01-03"));
    assert!(result.rows[2][1].is_null());
    assert_eq!(result.rows[4][1].as_i64(), Some(1));
}

#[test]
fn test_month_axis_pads_empty_buckets() {
    let database = seeded_database();
    let axis = QueryAxis::new(date(2001, 1, 1), date(2001, 6, 30), AxisIncrement::Month);
    let sql = axis_sql(DatabaseType::Sqlite, axis);

    let mut connection = database.get_managed_connection(None).unwrap();
    let result = connection.query(&sql).unwrap();
    assert_eq!(result.rows.len(), 6);
    assert_eq!(result.rows[0][0].as_str(), Some("2001-01"));
    // April and May 2001 are empty but present
    assert!(result.rows[3][1].is_null());
    assert!(result.rows[4][1].is_null());
}

#[test]
fn test_quarter_axis_buckets_as_yyyyqn() {
    let database = seeded_database();
    let axis = QueryAxis::new(date(2001, 1, 1), date(2001, 12, 31), AxisIncrement::Quarter);
    let sql = axis_sql(DatabaseType::Sqlite, axis);

    let mut connection = database.get_managed_connection(None).unwrap();
    let result = connection.query(&sql).unwrap();
    assert_eq!(result.rows.len(), 4);
    assert_eq!(result.rows[0][0].as_str(), Some("2001Q1"));
    assert_eq!(result.rows[3][0].as_str(), Some("2001Q4"));
    // Q1 2001 holds six sales
    assert_eq!(result.rows[0][1].as_i64(), Some(6));
}

#[test]
fn test_year_axis_spans_the_whole_range() {
    let database = seeded_database();
    let axis = QueryAxis::new(date(2001, 1, 1), date(2003, 12, 31), AxisIncrement::Year);
    let sql = axis_sql(DatabaseType::Sqlite, axis);

    let mut connection = database.get_managed_connection(None).unwrap();
    let result = connection.query(&sql).unwrap();
    assert_eq!(result.rows.len(), 3);
    assert_eq!(result.rows[0][1].as_i64(), Some(8));
    assert_eq!(result.rows[1][1].as_i64(), Some(3));
    assert_eq!(result.rows[2][1].as_i64(), Some(3));
}

#[test]
fn test_axis_over_empty_table_still_yields_every_bucket() {
    registry::initialize();
    let server = DiscoveredServer::new(
        ConnectionStringBuilder::new(DatabaseType::Sqlite).with_database(":memory:"),
    );
    let database = server.expect_database(":memory:");
    let mut connection = database.get_managed_connection(None).unwrap();
    connection
        .execute("CREATE TABLE Sales (EventDate TEXT, Amount INTEGER)")
        .unwrap();

    let axis = QueryAxis::new(date(2001, 1, 1), date(2001, 1, 10), AxisIncrement::Day);
    let sql = axis_sql(DatabaseType::Sqlite, axis);
    let result = connection.query(&sql).unwrap();
    assert_eq!(result.rows.len(), 10);
    assert!(result.rows.iter().all(|row| row[1].is_null()));
}

#[test]
fn test_where_lines_filter_the_dataset_not_the_calendar() {
    let database = seeded_database();
    let axis = QueryAxis::new(date(2001, 1, 1), date(2001, 1, 5), AxisIncrement::Day);
    let builder = AggregateBuilder::new(DatabaseType::Sqlite)
        .line(
            AggregateLine::new("count(*) AS MyCount", QueryComponent::Select)
                .with_role(LineRole::CountFunction),
        )
        .line(AggregateLine::new("EventDate", QueryComponent::TimeColumn).with_role(LineRole::Axis))
        .line(AggregateLine::new("Sales", QueryComponent::From))
        .line(AggregateLine::new("Amount > 0", QueryComponent::Where))
        .axis(axis);
    let AggregateSql::Query(sql) = builder.build().unwrap() else {
        panic!("expected a plain query");
    };

    let mut connection = database.get_managed_connection(None).unwrap();
    let result = connection.query(&sql).unwrap();
    // the filter removed one of the two 2001-01-01 rows, not the bucket
    assert_eq!(result.rows.len(), 5);
    assert_eq!(result.rows[0][1].as_i64(), Some(1));
}

#[test]
fn test_every_dialect_renders_a_calendar() {
    let axis = QueryAxis::new(date(2001, 1, 1), date(2001, 1, 5), AxisIncrement::Day);
    for db in DatabaseType::all() {
        let sql = axis_sql(db, axis);
        assert!(sql.contains("LEFT JOIN"), "{}: {}", db, sql);
        assert!(sql.contains("joinDt"), "{}: {}", db, sql);
    }
}
