//! String-to-hard-type conversion ahead of validation.
//!
//! When a string-typed source column feeds a date, time, numeric, boolean
//! or GUID destination, every value is parsed up front and the column is
//! replaced in place (same ordinal, same primary-key membership). Dates are
//! the awkward case: `01/02/2001` is February or January depending on who
//! wrote the file, so a [`DateFormatDecider`] sniffs the day/month ordering
//! from the first 500 non-null values before parsing begins.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::driver::Value;
use crate::types::ValueKind;

use super::{BulkError, MappedColumn, TableData};

/// Decides day-first vs month-first parsing by looking at the data.
///
/// A value like `25/12/2001` can only be day-first; `12/25/2001` can only
/// be month-first. Votes are tallied over the sample and the majority wins;
/// a tie (all values ambiguous) falls to day-first.
#[derive(Debug, Clone, Copy)]
pub struct DateFormatDecider {
    day_first: bool,
}

impl DateFormatDecider {
    /// How many leading non-null values are examined.
    pub const SAMPLE_SIZE: usize = 500;

    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a str>) -> Self {
        let mut day_votes = 0usize;
        let mut month_votes = 0usize;
        for sample in samples.into_iter().take(Self::SAMPLE_SIZE) {
            let mut numbers = sample
                .split(|c: char| !c.is_ascii_digit())
                .filter(|s| !s.is_empty());
            let (Some(first), Some(second)) = (numbers.next(), numbers.next()) else {
                continue;
            };
            // a four-digit lead is a year; ordering is unambiguous ISO
            if first.len() == 4 {
                continue;
            }
            let first: u32 = first.parse().unwrap_or(0);
            let second: u32 = second.parse().unwrap_or(0);
            if first > 12 {
                day_votes += 1;
            } else if second > 12 {
                month_votes += 1;
            }
        }
        Self {
            day_first: day_votes >= month_votes,
        }
    }

    pub fn day_first(&self) -> bool {
        self.day_first
    }

    /// Parse a date or date-time using the decided ordering. ISO forms are
    /// always accepted.
    pub fn parse(&self, value: &str) -> Option<NaiveDateTime> {
        const ISO: &[&str] = &[
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%d",
            "%Y/%m/%d",
        ];
        const DAY_FIRST: &[&str] = &[
            "%d/%m/%Y %H:%M:%S",
            "%d/%m/%Y %H:%M",
            "%d/%m/%Y",
            "%d-%m-%Y",
            "%d.%m.%Y",
        ];
        const MONTH_FIRST: &[&str] = &[
            "%m/%d/%Y %H:%M:%S",
            "%m/%d/%Y %H:%M",
            "%m/%d/%Y",
            "%m-%d-%Y",
            "%m.%d.%Y",
        ];

        let value = value.trim();
        let ordered = if self.day_first { DAY_FIRST } else { MONTH_FIRST };
        for format in ISO.iter().chain(ordered) {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
                return Some(parsed);
            }
            if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
                return Some(parsed.and_hms_opt(0, 0, 0)?);
            }
        }
        None
    }
}

fn is_problematic(kind: ValueKind) -> bool {
    !matches!(kind, ValueKind::Text | ValueKind::Bytes)
}

/// Parse string columns into their destination's hard type, in place.
pub(super) fn convert_string_columns(
    data: &mut TableData,
    mapped: &[MappedColumn],
) -> Result<(), BulkError> {
    for m in mapped {
        let ordinal = m.source_ordinal;
        let source_is_string = data
            .columns()
            .get(ordinal)
            .map(|c| c.kind == ValueKind::Text)
            .unwrap_or(false);
        let target_kind = m.request.kind;
        if !source_is_string || !is_problematic(target_kind) {
            continue;
        }

        let column_name = data.columns()[ordinal].name.clone();

        let decider = match target_kind {
            ValueKind::DateTime | ValueKind::Date => {
                let samples: Vec<String> = data
                    .rows()
                    .iter()
                    .filter_map(|row| row.get(ordinal))
                    .filter_map(|v| v.as_str())
                    .filter(|s| !s.trim().is_empty())
                    .take(DateFormatDecider::SAMPLE_SIZE)
                    .map(|s| s.to_string())
                    .collect();
                Some(DateFormatDecider::from_samples(
                    samples.iter().map(|s| s.as_str()),
                ))
            }
            _ => None,
        };

        for row_index in 0..data.row_count() {
            let Some(cell) = data.cell_mut(row_index, ordinal) else {
                continue;
            };
            let Value::Text(raw) = cell else {
                continue;
            };
            let raw = raw.clone();
            if raw.trim().is_empty() {
                *cell = Value::Null;
                continue;
            }
            let parsed = parse_hard_value(&raw, target_kind, decider.as_ref());
            match parsed {
                Some(parsed) => *cell = parsed,
                None => {
                    return Err(BulkError::Parse {
                        row: row_index + 1,
                        column: column_name,
                        value: raw,
                        kind: target_kind,
                    })
                }
            }
        }
        data.set_kind(ordinal, target_kind);
    }
    Ok(())
}

/// One string value into the canonical [`Value`] for a destination kind.
/// Dates and times normalize to ISO text, which every dialect's literal
/// rendering understands.
fn parse_hard_value(
    raw: &str,
    kind: ValueKind,
    decider: Option<&DateFormatDecider>,
) -> Option<Value> {
    let trimmed = raw.trim();
    match kind {
        ValueKind::Bool => match trimmed.to_lowercase().as_str() {
            "true" | "1" | "y" | "yes" => Some(Value::Bool(true)),
            "false" | "0" | "n" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        ValueKind::Byte | ValueKind::Int16 | ValueKind::Int32 | ValueKind::Int64 => {
            trimmed.parse::<i64>().ok().map(Value::Int)
        }
        ValueKind::Float32 | ValueKind::Float64 => trimmed.parse::<f64>().ok().map(Value::Float),
        // kept as validated text so no precision is lost to binary floats
        ValueKind::Decimal => {
            let unsigned = trimmed.strip_prefix(['-', '+']).unwrap_or(trimmed);
            let numeric = !unsigned.is_empty()
                && unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
                && unsigned.chars().filter(|c| *c == '.').count() <= 1;
            numeric.then(|| Value::Text(trimmed.to_string()))
        }
        ValueKind::DateTime => {
            let parsed = decider?.parse(trimmed)?;
            Some(Value::Text(
                parsed.format("%Y-%m-%d %H:%M:%S").to_string(),
            ))
        }
        ValueKind::Date => {
            let parsed = decider?.parse(trimmed)?;
            Some(Value::Text(parsed.format("%Y-%m-%d").to_string()))
        }
        ValueKind::Time | ValueKind::Duration => {
            const FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];
            let parsed = FORMATS
                .iter()
                .find_map(|f| NaiveTime::parse_from_str(trimmed, f).ok())?;
            Some(Value::Text(parsed.format("%H:%M:%S").to_string()))
        }
        ValueKind::Uuid => uuid::Uuid::parse_str(trimmed)
            .ok()
            .map(|u| Value::Text(u.hyphenated().to_string())),
        ValueKind::Text | ValueKind::Bytes => Some(Value::Text(trimmed.to_string())),
    }
}
