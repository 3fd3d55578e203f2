//! Pivot aggregates.
//!
//! Pivoting is two-phase: a discovery query enumerates the distinct values
//! of the pivot column (optionally HAVING-filtered and TOP-N limited by a
//! secondary ordering), then the caller feeds the values back and one
//! `CASE WHEN pivot = 'value' THEN ... END` aggregate column is emitted per
//! value. MsSql, MySql and Oracle take this form; PostgreSql and Sqlite
//! report pivot as unsupported in this implementation.
//!
//! With an axis, the per-value CASE columns move inside the dataset
//! subquery and the calendar LEFT JOIN from the axis shape wraps them, so
//! every bucket appears for every surviving pivot value.

use once_cell::sync::Lazy;
use regex::Regex;

use super::axis::{calendar_parts, date_part_expression};
use super::{AggregateBuilder, AggregateError, LineRole, QueryAxis, QueryComponent};
use crate::dialect::DatabaseType;

static AGGREGATE_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*\((.*)\)\s*$")
        .expect("aggregate function pattern is static and valid")
});

/// A two-phase pivot: run [`discovery_sql`], collect the values, then ask
/// for the final query.
///
/// [`discovery_sql`]: PivotPlan::discovery_sql
#[derive(Debug, Clone)]
pub struct PivotPlan {
    pub discovery_sql: String,
    builder: AggregateBuilder,
    axis: Option<QueryAxis>,
}

pub fn pivot_aggregate(
    builder: &AggregateBuilder,
    axis: Option<QueryAxis>,
) -> Result<PivotPlan, AggregateError> {
    let database = builder.database_type();
    if !matches!(
        database,
        DatabaseType::MsSql | DatabaseType::MySql | DatabaseType::Oracle
    ) {
        return Err(AggregateError::PivotNotSupported(database));
    }

    Ok(PivotPlan {
        discovery_sql: discovery_sql(builder)?,
        builder: builder.clone(),
        axis,
    })
}

/// Phase 1: enumerate distinct pivot values, most significant first.
fn discovery_sql(builder: &AggregateBuilder) -> Result<String, AggregateError> {
    let database = builder.database_type();
    let pivot_expr = pivot_expression(builder)?;
    let (count_sql, _) = builder.count_parts()?;
    let top = builder.top_x_config();

    let order_expr = match top {
        Some(t) if !t.order_by.trim().is_empty() => t.order_by.clone(),
        _ => count_sql,
    };
    let direction = match top {
        Some(t) if !t.descending => "ASC",
        _ => "DESC",
    };

    let select = match (database, top) {
        (DatabaseType::MsSql, Some(t)) => {
            format!("SELECT TOP {} {} AS piv", t.count, pivot_expr)
        }
        _ => format!("SELECT {} AS piv", pivot_expr),
    };

    let mut sql = select;
    sql.push('\n');
    sql.push_str(&builder.from_block()?);
    sql.push('\n');
    sql.push_str(&builder.where_block(&[format!("{} IS NOT NULL", pivot_expr)]));
    sql.push_str(&format!("\nGROUP BY\n{}", pivot_expr));

    let havings: Vec<String> = builder
        .lines_of(QueryComponent::Having)
        .iter()
        .map(|l| l.text.clone())
        .collect();
    if !havings.is_empty() {
        sql.push_str("\nHAVING\n");
        sql.push_str(&havings.join("\nAND "));
    }

    sql.push_str(&format!("\nORDER BY\n{} {}", order_expr, direction));

    match (database, top) {
        (DatabaseType::MySql, Some(t)) => sql.push_str(&format!("\nLIMIT {}", t.count)),
        (DatabaseType::Oracle, Some(t)) => {
            sql.push_str(&format!("\nFETCH FIRST {} ROWS ONLY", t.count))
        }
        _ => {}
    }
    Ok(sql)
}

impl PivotPlan {
    /// Phase 2: the final query, one aggregate CASE column per discovered
    /// pivot value.
    pub fn final_sql(&self, pivot_values: &[String]) -> Result<String, AggregateError> {
        match self.axis {
            Some(axis) => self.final_sql_with_axis(pivot_values, axis),
            None => self.final_sql_plain(pivot_values),
        }
    }

    fn case_columns(&self, pivot_values: &[String]) -> Result<Vec<String>, AggregateError> {
        let builder = &self.builder;
        let syntax = builder.syntax();
        let pivot_expr = pivot_expression(builder)?;
        let (count_sql, _) = builder.count_parts()?;

        let caps = AGGREGATE_FUNCTION
            .captures(&count_sql)
            .ok_or_else(|| AggregateError::UnpivotableAggregate(count_sql.clone()))?;
        let function = caps.get(1).map(|m| m.as_str()).unwrap_or("count");
        let argument = match caps.get(2).map(|m| m.as_str().trim()).unwrap_or("*") {
            "*" => "1",
            other => other,
        }
        .to_string();

        Ok(pivot_values
            .iter()
            .map(|value| {
                format!(
                    "{}(CASE WHEN {} = {} THEN {} ELSE NULL END) AS {}",
                    function,
                    pivot_expr,
                    syntax.quote_string(value),
                    argument,
                    syntax.ensure_wrapped(value)
                )
            })
            .collect())
    }

    fn final_sql_plain(&self, pivot_values: &[String]) -> Result<String, AggregateError> {
        let builder = &self.builder;
        let mut select_exprs: Vec<String> = builder
            .lines_of(QueryComponent::Select)
            .iter()
            .chain(builder.lines_of(QueryComponent::TimeColumn).iter())
            .filter(|l| l.role != Some(LineRole::Pivot) && l.role != Some(LineRole::CountFunction))
            .map(|l| l.text.clone())
            .collect();
        select_exprs.extend(self.case_columns(pivot_values)?);

        let mut sql = format!("SELECT\n{}", select_exprs.join(",\n"));
        sql.push('\n');
        sql.push_str(&builder.from_block()?);

        let where_block = builder.where_block(&[]);
        if !where_block.is_empty() {
            sql.push('\n');
            sql.push_str(&where_block);
        }

        let group_bys: Vec<String> = builder
            .lines_of(QueryComponent::GroupBy)
            .iter()
            .map(|l| l.text.clone())
            .collect();
        if !group_bys.is_empty() {
            sql.push_str("\nGROUP BY\n");
            sql.push_str(&group_bys.join(",\n"));
        }

        let order_bys: Vec<String> = builder
            .lines_of(QueryComponent::OrderBy)
            .iter()
            .filter(|l| l.role != Some(LineRole::TopX))
            .map(|l| l.text.clone())
            .collect();
        if !order_bys.is_empty() {
            sql.push_str("\nORDER BY\n");
            sql.push_str(&order_bys.join(",\n"));
        }
        Ok(sql)
    }

    fn final_sql_with_axis(
        &self,
        pivot_values: &[String],
        axis: QueryAxis,
    ) -> Result<String, AggregateError> {
        let builder = &self.builder;
        let database = builder.database_type();
        let syntax = builder.syntax();
        let cal = calendar_parts(database, axis)?;

        let time_expr = {
            let line = builder.time_column_line()?;
            let (sql, _) = syntax.split_line(&line.text);
            sql.to_string()
        };
        let source_bucket = date_part_expression(database, axis.increment, &time_expr);
        let axis_bucket = date_part_expression(database, axis.increment, "axis.dt");

        let mut inner = format!(
            "SELECT\n{source_bucket} AS joinDt,\n{}\n{}",
            self.case_columns(pivot_values)?.join(",\n"),
            builder.from_block()?
        );
        let where_block = builder.where_block(&[]);
        if !where_block.is_empty() {
            inner.push('\n');
            inner.push_str(&where_block);
        }
        inner.push_str(&format!("\nGROUP BY\n{source_bucket}"));

        let outer_columns: Vec<String> = pivot_values
            .iter()
            .map(|value| format!("dataset.{}", syntax.ensure_wrapped(value)))
            .collect();

        let mut sql = String::new();
        if !cal.prefix.is_empty() {
            sql.push_str(&cal.prefix);
            sql.push('\n');
        }
        sql.push_str(&format!(
            "SELECT\n\
             {axis_bucket} AS joinDt,\n\
             {}\n\
             FROM {} axis\n\
             LEFT JOIN (\n{inner}\n) dataset ON dataset.joinDt = {axis_bucket}\n\
             ORDER BY {axis_bucket}",
            outer_columns.join(",\n"),
            cal.source
        ));
        if !cal.suffix.is_empty() {
            sql.push('\n');
            sql.push_str(&cal.suffix);
        }
        Ok(sql)
    }
}

fn pivot_expression(builder: &AggregateBuilder) -> Result<String, AggregateError> {
    let line = builder
        .pivot_line()
        .ok_or(AggregateError::MissingLine("a pivot column line"))?;
    let (sql, _) = builder.syntax().split_line(&line.text);
    Ok(sql.to_string())
}
