//! Calendar-axis aggregates.
//!
//! The user's GROUP BY query becomes a subquery LEFT JOINed onto a dense
//! generated calendar, so the result has one row per bucket between the
//! axis start and end regardless of the data. Calendar generation is the
//! dialect's own idiom:
//!
//! - MsSql: recursive CTE stepped with `DATEADD`, `OPTION (MAXRECURSION 0)`
//! - MySql: `WITH RECURSIVE` stepped with `DATE_ADD`
//! - PostgreSql: `generate_series` over an interval
//! - Oracle: `CONNECT BY rownum <= N` from `DUAL` (N computed here)
//! - Sqlite: `WITH RECURSIVE` stepped with `date(dt, '+1 day')` modifiers
//!
//! Buckets with no source rows come back with a NULL count (the LEFT JOIN
//! misses); callers wanting 0 wrap the count in a coalesce themselves.

use super::{AggregateBuilder, AggregateError, AxisIncrement, QueryAxis};
use crate::dialect::DatabaseType;

/// The expression extracting the axis bucket from a date column.
pub fn date_part_expression(
    database: DatabaseType,
    increment: AxisIncrement,
    column: &str,
) -> String {
    use AxisIncrement::*;
    use DatabaseType::*;
    match (database, increment) {
        (MsSql, Day) => format!("CONVERT(date, {})", column),
        (MsSql, Month) => format!("CONVERT(char(7), {}, 126)", column),
        (MsSql, Quarter) => format!(
            "CONVERT(varchar(4), YEAR({0})) + 'Q' + CONVERT(varchar(1), DATEPART(q, {0}))",
            column
        ),
        (MsSql, Year) => format!("YEAR({})", column),

        (MySql, Day) => format!("DATE({})", column),
        (MySql, Month) => format!("DATE_FORMAT({}, '%Y-%m')", column),
        (MySql, Quarter) => format!("CONCAT(YEAR({0}), 'Q', QUARTER({0}))", column),
        (MySql, Year) => format!("YEAR({})", column),

        (PostgreSql, Day) => format!("date_trunc('day', {})", column),
        (PostgreSql, Month) => format!("to_char({}, 'YYYY-MM')", column),
        (PostgreSql, Quarter) => format!("to_char({}, 'YYYY\"Q\"Q')", column),
        (PostgreSql, Year) => format!("EXTRACT(YEAR FROM {})", column),

        (Oracle, Day) => format!("TRUNC({})", column),
        (Oracle, Month) => format!("to_char({}, 'YYYY-MM')", column),
        (Oracle, Quarter) => format!("to_char({}, 'YYYY\"Q\"Q')", column),
        (Oracle, Year) => format!("to_number(to_char({}, 'YYYY'))", column),

        (Sqlite, Day) => format!("date({})", column),
        (Sqlite, Month) => format!("strftime('%Y-%m', {})", column),
        (Sqlite, Quarter) => format!(
            "strftime('%Y', {0}) || 'Q' || ((CAST(strftime('%m', {0}) AS INTEGER) + 2) / 3)",
            column
        ),
        (Sqlite, Year) => format!("strftime('%Y', {})", column),
    }
}

/// The generated-calendar pieces for one dialect: an optional CTE prefix,
/// the FROM source producing a `dt` column, and an optional trailing hint.
pub(crate) struct CalendarParts {
    pub(crate) prefix: String,
    pub(crate) source: String,
    pub(crate) suffix: String,
}

pub(crate) fn calendar_parts(
    database: DatabaseType,
    axis: QueryAxis,
) -> Result<CalendarParts, AggregateError> {
    let start = axis.start.format("%Y-%m-%d").to_string();
    let end = axis.end.format("%Y-%m-%d").to_string();
    let increment = axis.increment;

    let cal = match database {
        DatabaseType::MsSql => {
            let unit = match increment {
                AxisIncrement::Day => "day",
                AxisIncrement::Month => "month",
                AxisIncrement::Quarter => "quarter",
                AxisIncrement::Year => "year",
            };
            CalendarParts {
                prefix: format!(
                    "WITH dateAxis AS (\n\
                     SELECT CONVERT(date, '{start}') AS dt\n\
                     UNION ALL\n\
                     SELECT DATEADD({unit}, 1, dt) FROM dateAxis WHERE DATEADD({unit}, 1, dt) <= '{end}'\n\
                     )"
                ),
                source: "dateAxis".into(),
                suffix: "OPTION (MAXRECURSION 0)".into(),
            }
        }
        DatabaseType::MySql => {
            let unit = match increment {
                AxisIncrement::Day => "DAY",
                AxisIncrement::Month => "MONTH",
                AxisIncrement::Quarter => "QUARTER",
                AxisIncrement::Year => "YEAR",
            };
            CalendarParts {
                prefix: format!(
                    "WITH RECURSIVE dateAxis AS (\n\
                     SELECT DATE('{start}') AS dt\n\
                     UNION ALL\n\
                     SELECT DATE_ADD(dt, INTERVAL 1 {unit}) FROM dateAxis WHERE DATE_ADD(dt, INTERVAL 1 {unit}) <= '{end}'\n\
                     )"
                ),
                source: "dateAxis".into(),
                suffix: String::new(),
            }
        }
        DatabaseType::PostgreSql => {
            let step = match increment {
                AxisIncrement::Day => "1 day",
                AxisIncrement::Month => "1 month",
                AxisIncrement::Quarter => "3 months",
                AxisIncrement::Year => "1 year",
            };
            CalendarParts {
                prefix: String::new(),
                source: format!(
                    "(SELECT generate_series(DATE '{start}', DATE '{end}', INTERVAL '{step}')::date AS dt)"
                ),
                suffix: String::new(),
            }
        }
        DatabaseType::Oracle => {
            let rows = axis.bucket_count()?;
            let seed = format!("TO_DATE('{start}', 'YYYY-MM-DD')");
            let expr = match increment {
                AxisIncrement::Day => format!("{seed} + (rownum - 1)"),
                AxisIncrement::Month => format!("ADD_MONTHS({seed}, rownum - 1)"),
                AxisIncrement::Quarter => format!("ADD_MONTHS({seed}, (rownum - 1) * 3)"),
                AxisIncrement::Year => format!("ADD_MONTHS({seed}, (rownum - 1) * 12)"),
            };
            CalendarParts {
                prefix: String::new(),
                source: format!(
                    "(SELECT {expr} AS dt FROM DUAL CONNECT BY rownum <= {rows})"
                ),
                suffix: String::new(),
            }
        }
        DatabaseType::Sqlite => {
            let modifier = match increment {
                AxisIncrement::Day => "+1 day",
                AxisIncrement::Month => "+1 month",
                AxisIncrement::Quarter => "+3 months",
                AxisIncrement::Year => "+1 year",
            };
            CalendarParts {
                prefix: format!(
                    "WITH RECURSIVE dateAxis(dt) AS (\n\
                     SELECT date('{start}')\n\
                     UNION ALL\n\
                     SELECT date(dt, '{modifier}') FROM dateAxis WHERE date(dt, '{modifier}') <= date('{end}')\n\
                     )"
                ),
                source: "dateAxis".into(),
                suffix: String::new(),
            }
        }
    };
    Ok(cal)
}

/// Build the axis aggregate: calendar LEFT JOIN (user query grouped by
/// bucket), ordered by bucket.
pub fn axis_aggregate(
    builder: &AggregateBuilder,
    axis: QueryAxis,
) -> Result<String, AggregateError> {
    // validates the range up front for every dialect
    axis.bucket_count()?;

    let database = builder.database_type();
    let cal = calendar_parts(database, axis)?;

    let (count_sql, count_alias) = builder.count_parts()?;
    let count_sql = builder.wrap_aggregate_function(&count_sql);
    let time_expr = {
        let line = builder.time_column_line()?;
        let (sql, _) = builder.syntax().split_line(&line.text);
        sql.to_string()
    };

    let source_bucket = date_part_expression(database, axis.increment, &time_expr);
    let axis_bucket = date_part_expression(database, axis.increment, "axis.dt");

    let mut inner = format!(
        "SELECT\n{source_bucket} AS joinDt,\n{count_sql} AS {count_alias}\n{}",
        builder.from_block()?
    );
    let where_block = builder.where_block(&[]);
    if !where_block.is_empty() {
        inner.push('\n');
        inner.push_str(&where_block);
    }
    inner.push_str(&format!("\nGROUP BY\n{source_bucket}"));

    let mut sql = String::new();
    if !cal.prefix.is_empty() {
        sql.push_str(&cal.prefix);
        sql.push('\n');
    }
    sql.push_str(&format!(
        "SELECT\n\
         {axis_bucket} AS joinDt,\n\
         dataset.{count_alias}\n\
         FROM {} axis\n\
         LEFT JOIN (\n{inner}\n) dataset ON dataset.joinDt = {axis_bucket}\n\
         ORDER BY {axis_bucket}",
        cal.source
    ));
    if !cal.suffix.is_empty() {
        sql.push('\n');
        sql.push_str(&cal.suffix);
    }
    Ok(sql)
}
