//! Pivot plans: discovery-phase SQL, CASE-per-value synthesis, TOP-N
//! selection idioms, and the engines that refuse.

use chrono::NaiveDate;
use omnisql::aggregate::{
    AggregateBuilder, AggregateError, AggregateLine, AggregateSql, AxisIncrement, LineRole,
    PivotTopX, QueryAxis, QueryComponent,
};
use omnisql::dialect::DatabaseType;

fn pivot_builder(db: DatabaseType) -> AggregateBuilder {
    AggregateBuilder::new(db)
        .line(
            AggregateLine::new("sum(Amount) AS TotalSales", QueryComponent::Select)
                .with_role(LineRole::CountFunction),
        )
        .line(AggregateLine::new("Region", QueryComponent::Select).with_role(LineRole::Pivot))
        .line(AggregateLine::new("SaleYear", QueryComponent::Select))
        .line(AggregateLine::new("Sales", QueryComponent::From))
        .line(AggregateLine::new("SaleYear", QueryComponent::GroupBy))
}

fn plan(builder: AggregateBuilder) -> omnisql::aggregate::PivotPlan {
    match builder.build().unwrap() {
        AggregateSql::Pivot(plan) => plan,
        other => panic!("expected a pivot plan, got {:?}", other),
    }
}

#[test]
fn test_discovery_phase_enumerates_pivot_values() {
    let plan = plan(pivot_builder(DatabaseType::MySql));
    let sql = &plan.discovery_sql;
    assert!(sql.contains("SELECT Region AS piv"));
    assert!(sql.contains("Region IS NOT NULL"));
    assert!(sql.contains("GROUP BY\nRegion"));
    assert!(sql.contains("ORDER BY\nsum(Amount) DESC"));
}

#[test]
fn test_discovery_honors_having_lines() {
    let builder =
        pivot_builder(DatabaseType::MySql).line(AggregateLine::new("sum(Amount) > 100", QueryComponent::Having));
    let plan = plan(builder);
    assert!(plan.discovery_sql.contains("HAVING\nsum(Amount) > 100"));
}

#[test]
fn test_top_x_uses_each_engines_limit_idiom() {
    let top = PivotTopX {
        count: 5,
        order_by: String::new(),
        descending: true,
    };
    assert!(plan(pivot_builder(DatabaseType::MsSql).top_x(top.clone()))
        .discovery_sql
        .starts_with("SELECT TOP 5"));
    assert!(plan(pivot_builder(DatabaseType::MySql).top_x(top.clone()))
        .discovery_sql
        .ends_with("LIMIT 5"));
    assert!(plan(pivot_builder(DatabaseType::Oracle).top_x(top))
        .discovery_sql
        .ends_with("FETCH FIRST 5 ROWS ONLY"));
}

#[test]
fn test_top_x_secondary_ordering() {
    let top = PivotTopX {
        count: 3,
        order_by: "max(SaleDate)".into(),
        descending: false,
    };
    let plan = plan(pivot_builder(DatabaseType::MySql).top_x(top));
    assert!(plan.discovery_sql.contains("ORDER BY\nmax(SaleDate) ASC"));
}

#[test]
fn test_final_sql_rewrites_the_aggregate_per_value() {
    let plan = plan(pivot_builder(DatabaseType::MySql));
    let sql = plan.final_sql(&["North".into(), "South".into()]).unwrap();
    assert!(sql.contains("sum(CASE WHEN Region = 'North' THEN Amount ELSE NULL END) AS `North`"));
    assert!(sql.contains("sum(CASE WHEN Region = 'South' THEN Amount ELSE NULL END) AS `South`"));
    // the pivot column itself is not selected raw
    assert!(!sql.contains("SELECT\nRegion"));
}

#[test]
fn test_count_star_pivots_as_count_of_one() {
    let builder = AggregateBuilder::new(DatabaseType::MsSql)
        .line(
            AggregateLine::new("count(*)", QueryComponent::Select)
                .with_role(LineRole::CountFunction),
        )
        .line(AggregateLine::new("Region", QueryComponent::Select).with_role(LineRole::Pivot))
        .line(AggregateLine::new("Sales", QueryComponent::From));
    let plan = plan(builder);
    let sql = plan.final_sql(&["North".into()]).unwrap();
    assert!(sql.contains("count(CASE WHEN Region = 'North' THEN 1 ELSE NULL END) AS [North]"));
}

#[test]
fn test_pivot_unsupported_engines() {
    for db in [DatabaseType::PostgreSql, DatabaseType::Sqlite] {
        match pivot_builder(db).build() {
            Err(AggregateError::PivotNotSupported(reported)) => assert_eq!(reported, db),
            other => panic!("{}: expected PivotNotSupported, got {:?}", db, other),
        }
    }
}

#[test]
fn test_axis_pivot_composes_calendar_and_cases() {
    let builder = pivot_builder(DatabaseType::MsSql)
        .line(AggregateLine::new("SaleDate", QueryComponent::TimeColumn).with_role(LineRole::Axis))
        .axis(QueryAxis::new(
            NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2001, 12, 31).unwrap(),
            AxisIncrement::Quarter,
        ));
    let plan = plan(builder);
    let sql = plan.final_sql(&["North".into(), "South".into()]).unwrap();
    assert!(sql.contains("WITH dateAxis AS"));
    assert!(sql.contains("DATEADD(quarter, 1, dt)"));
    assert!(sql.contains("dataset.[North]"));
    assert!(sql.contains("dataset.[South]"));
    assert!(sql.contains("OPTION (MAXRECURSION 0)"));
}
