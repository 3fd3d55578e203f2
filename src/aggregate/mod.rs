//! Dialect-aware synthesis of GROUP BY queries.
//!
//! Callers describe the aggregate as an ordered collection of annotated
//! lines (the intermediate form an expression adapter produces) plus an
//! optional calendar axis and TOP-N pivot selection. The builder routes to
//! one of four shapes:
//!
//! - no axis, no pivot: a plain GROUP BY query
//! - axis only: the query LEFT JOINed onto a dense generated calendar so
//!   every bucket appears, data or not
//! - pivot only: a two-phase plan — a discovery query enumerating the
//!   distinct pivot values, then one `CASE WHEN` column per value
//! - axis and pivot: the calendar join with a `CASE WHEN` column per value
//!
//! Line text carries bare expressions; keywords (`WHERE`, `GROUP BY`, ...)
//! are emitted here. Join lines are the exception: they carry their own
//! `JOIN` clause because the join type varies.

mod axis;
mod pivot;

pub use axis::{axis_aggregate, date_part_expression};
pub use pivot::{pivot_aggregate, PivotPlan};

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::dialect::DatabaseType;
use crate::syntax::SyntaxHelper;

/// Errors from aggregate synthesis.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// The engine has no workable pivot idiom in this implementation.
    #[error("pivot aggregates are not supported on {0}")]
    PivotNotSupported(DatabaseType),

    #[error("aggregate is missing a required line: {0}")]
    MissingLine(&'static str),

    #[error("query axis is invalid: {0}")]
    InvalidAxis(String),

    /// The aggregate select expression is not a single `FUNC(args)` call and
    /// cannot be rewritten into per-value CASE columns.
    #[error("cannot pivot aggregate expression {0:?}")]
    UnpivotableAggregate(String),
}

/// Which part of the query a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryComponent {
    Select,
    /// The date expression an axis joins on.
    TimeColumn,
    From,
    /// A complete join clause (`LEFT JOIN x ON ...`).
    Join,
    Where,
    GroupBy,
    Having,
    OrderBy,
    /// Raw trailing SQL.
    Postfix,
}

/// Extra meaning attached to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRole {
    /// The aggregate function select expression.
    CountFunction,
    /// The line participating in the calendar axis.
    Axis,
    /// The column whose distinct values become output columns.
    Pivot,
    /// A line controlling TOP-N pivot value selection.
    TopX,
}

/// One annotated SQL fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateLine {
    pub text: String,
    pub component: QueryComponent,
    pub role: Option<LineRole>,
}

impl AggregateLine {
    pub fn new(text: impl Into<String>, component: QueryComponent) -> Self {
        Self {
            text: text.into(),
            component,
            role: None,
        }
    }

    pub fn with_role(mut self, role: LineRole) -> Self {
        self.role = Some(role);
        self
    }
}

/// Calendar granularity for axis padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisIncrement {
    Day,
    Month,
    Quarter,
    Year,
}

/// A dense calendar axis between two dates inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryAxis {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub increment: AxisIncrement,
}

impl QueryAxis {
    pub fn new(start: NaiveDate, end: NaiveDate, increment: AxisIncrement) -> Self {
        Self {
            start,
            end,
            increment,
        }
    }

    /// Buckets between start and end inclusive. This is the row count every
    /// dialect's axis aggregate must produce, whether or not any source row
    /// lands in a bucket.
    pub fn bucket_count(&self) -> Result<u64, AggregateError> {
        if self.end < self.start {
            return Err(AggregateError::InvalidAxis(format!(
                "end date {} is before start date {}",
                self.end, self.start
            )));
        }
        let buckets = match self.increment {
            AxisIncrement::Day => (self.end - self.start).num_days() + 1,
            AxisIncrement::Month => {
                months_of(self.end) - months_of(self.start) + 1
            }
            AxisIncrement::Quarter => {
                quarters_of(self.end) - quarters_of(self.start) + 1
            }
            AxisIncrement::Year => i64::from(self.end.year() - self.start.year()) + 1,
        };
        Ok(buckets as u64)
    }
}

fn months_of(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

fn quarters_of(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 4 + i64::from(date.month0() / 3)
}

/// TOP-N selection of pivot values in the discovery phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotTopX {
    pub count: u64,
    /// Ordering expression for choosing which values survive; defaults to
    /// the aggregate function itself when empty.
    pub order_by: String,
    pub descending: bool,
}

/// The synthesized output: a runnable query, or a two-phase pivot plan.
#[derive(Debug, Clone)]
pub enum AggregateSql {
    Query(String),
    Pivot(PivotPlan),
}

/// Assembles aggregate SQL from a line collection.
#[derive(Debug, Clone)]
pub struct AggregateBuilder {
    database: DatabaseType,
    lines: Vec<AggregateLine>,
    axis: Option<QueryAxis>,
    top_x: Option<PivotTopX>,
}

impl AggregateBuilder {
    pub fn new(database: DatabaseType) -> Self {
        Self {
            database,
            lines: Vec::new(),
            axis: None,
            top_x: None,
        }
    }

    pub fn line(mut self, line: AggregateLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn lines(mut self, lines: impl IntoIterator<Item = AggregateLine>) -> Self {
        self.lines.extend(lines);
        self
    }

    pub fn axis(mut self, axis: QueryAxis) -> Self {
        self.axis = Some(axis);
        self
    }

    pub fn top_x(mut self, top_x: PivotTopX) -> Self {
        self.top_x = Some(top_x);
        self
    }

    pub fn database_type(&self) -> DatabaseType {
        self.database
    }

    pub(crate) fn syntax(&self) -> SyntaxHelper {
        SyntaxHelper::new(self.database)
    }

    /// Route to the right synthesis shape.
    pub fn build(&self) -> Result<AggregateSql, AggregateError> {
        let has_pivot = self.pivot_line().is_some();
        match (&self.axis, has_pivot) {
            (None, false) => Ok(AggregateSql::Query(self.basic_aggregate()?)),
            (Some(axis), false) => Ok(AggregateSql::Query(axis_aggregate(self, *axis)?)),
            (_, true) => Ok(AggregateSql::Pivot(pivot_aggregate(self, self.axis)?)),
        }
    }

    // =========================================================================
    // Line accessors shared by the synthesis shapes
    // =========================================================================

    pub(crate) fn lines_of(&self, component: QueryComponent) -> Vec<&AggregateLine> {
        self.lines
            .iter()
            .filter(|l| l.component == component)
            .collect()
    }

    pub(crate) fn count_line(&self) -> Result<&AggregateLine, AggregateError> {
        self.lines
            .iter()
            .find(|l| l.role == Some(LineRole::CountFunction))
            .ok_or(AggregateError::MissingLine("an aggregate function line"))
    }

    pub(crate) fn time_column_line(&self) -> Result<&AggregateLine, AggregateError> {
        self.lines
            .iter()
            .find(|l| l.component == QueryComponent::TimeColumn)
            .ok_or(AggregateError::MissingLine("a time column line"))
    }

    pub(crate) fn pivot_line(&self) -> Option<&AggregateLine> {
        self.lines.iter().find(|l| l.role == Some(LineRole::Pivot))
    }

    pub(crate) fn from_line(&self) -> Result<&AggregateLine, AggregateError> {
        self.lines
            .iter()
            .find(|l| l.component == QueryComponent::From)
            .ok_or(AggregateError::MissingLine("a FROM line"))
    }

    pub(crate) fn top_x_config(&self) -> Option<&PivotTopX> {
        self.top_x.as_ref()
    }

    /// FROM plus any join clauses.
    pub(crate) fn from_block(&self) -> Result<String, AggregateError> {
        let mut block = format!("FROM {}", self.from_line()?.text);
        for join in self.lines_of(QueryComponent::Join) {
            block.push('\n');
            block.push_str(&join.text);
        }
        Ok(block)
    }

    /// WHERE with predicates AND-joined, or empty.
    pub(crate) fn where_block(&self, extra_predicates: &[String]) -> String {
        let mut predicates: Vec<String> = self
            .lines_of(QueryComponent::Where)
            .iter()
            .map(|l| l.text.clone())
            .collect();
        predicates.extend(extra_predicates.iter().cloned());
        if predicates.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", predicates.join("\nAND "))
        }
    }

    /// The aggregate function expression and its alias (defaulted when the
    /// caller gave none).
    pub(crate) fn count_parts(&self) -> Result<(String, String), AggregateError> {
        let syntax = self.syntax();
        let line = self.count_line()?;
        let (sql, alias) = syntax.split_line(&line.text);
        Ok((
            sql.to_string(),
            alias.unwrap_or("MyCount").to_string(),
        ))
    }

    // =========================================================================
    // Basic aggregate (no axis, no pivot)
    // =========================================================================

    fn basic_aggregate(&self) -> Result<String, AggregateError> {
        let mut select_exprs: Vec<String> = Vec::new();
        for line in &self.lines {
            let is_select = matches!(
                line.component,
                QueryComponent::Select | QueryComponent::TimeColumn
            );
            if !is_select {
                continue;
            }
            if line.role == Some(LineRole::CountFunction) {
                select_exprs.push(self.wrap_aggregate_function(&line.text));
            } else {
                select_exprs.push(line.text.clone());
            }
        }
        if select_exprs.is_empty() {
            return Err(AggregateError::MissingLine("a SELECT line"));
        }

        let mut sql = format!("SELECT\n{}", select_exprs.join(",\n"));
        sql.push('\n');
        sql.push_str(&self.from_block()?);

        let where_block = self.where_block(&[]);
        if !where_block.is_empty() {
            sql.push('\n');
            sql.push_str(&where_block);
        }

        let group_bys: Vec<String> = self
            .lines_of(QueryComponent::GroupBy)
            .iter()
            .map(|l| l.text.clone())
            .collect();
        if !group_bys.is_empty() {
            sql.push_str("\nGROUP BY\n");
            sql.push_str(&group_bys.join(",\n"));
        }

        let havings: Vec<String> = self
            .lines_of(QueryComponent::Having)
            .iter()
            .map(|l| l.text.clone())
            .collect();
        if !havings.is_empty() {
            sql.push_str("\nHAVING\n");
            sql.push_str(&havings.join("\nAND "));
        }

        let order_bys: Vec<String> = self
            .lines_of(QueryComponent::OrderBy)
            .iter()
            .map(|l| l.text.clone())
            .collect();
        if !order_bys.is_empty() {
            sql.push_str("\nORDER BY\n");
            sql.push_str(&order_bys.join(",\n"));
        }

        for postfix in self.lines_of(QueryComponent::Postfix) {
            sql.push('\n');
            sql.push_str(&postfix.text);
        }
        Ok(sql)
    }

    /// Dialect hook applied to the aggregate function select line. Oracle
    /// wraps AVG in ROUND(..., 10), otherwise a `count(*)` over enough rows
    /// overflows its NUMBER precision.
    pub(crate) fn wrap_aggregate_function(&self, line_text: &str) -> String {
        if self.database != DatabaseType::Oracle {
            return line_text.to_string();
        }
        let syntax = self.syntax();
        let (sql, alias) = syntax.split_line(line_text);
        if !sql.trim_start().to_uppercase().starts_with("AVG(") {
            return line_text.to_string();
        }
        let wrapped = format!("ROUND({}, 10)", sql.trim());
        match alias {
            Some(alias) => format!("{} AS {}", wrapped, alias),
            None => wrapped,
        }
    }
}
