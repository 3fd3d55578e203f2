//! The precompute-then-check validation pass.
//!
//! One [`ColumnRule`] is computed per mapped column pair, then every row is
//! checked against every rule in a single pass. Blank strings coerce to
//! null before anything else, so a blank-only column still trips a NOT NULL
//! destination.

use crate::driver::Value;
use crate::types::{DecimalSize, ValueKind};

use super::{BulkError, MappedColumn, TableData};

/// Precomputed constraints for one source→destination column pair.
pub(super) struct ColumnRule {
    source_ordinal: usize,
    column_name: String,
    max_length: Option<usize>,
    decimal: Option<DecimalSize>,
    int_range: Option<(i64, i64)>,
    rejects_nulls: bool,
}

pub(super) fn build_rules(data: &TableData, mapped: &[MappedColumn]) -> Vec<ColumnRule> {
    mapped
        .iter()
        .map(|m| {
            let kind = m.request.kind;
            ColumnRule {
                source_ordinal: m.source_ordinal,
                column_name: data
                    .columns()
                    .get(m.source_ordinal)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| m.destination.name.clone()),
                max_length: match kind {
                    ValueKind::Text => m.request.width.filter(|w| *w != crate::types::UNBOUNDED),
                    _ => None,
                },
                decimal: match kind {
                    ValueKind::Decimal => m.request.decimal_size,
                    _ => None,
                },
                int_range: kind.integer_range(),
                rejects_nulls: !m.destination.allow_nulls,
            }
        })
        .collect()
}

/// Check every row against every rule. The first failure aborts the batch;
/// nothing has been sent to the engine yet.
pub(super) fn validate_rows(data: &mut TableData, rules: &[ColumnRule]) -> Result<(), BulkError> {
    for row_index in 0..data.row_count() {
        for rule in rules {
            // blank string coerces to null before any other check
            if let Some(cell) = data.cell_mut(row_index, rule.source_ordinal) {
                if matches!(cell, Value::Text(s) if s.trim().is_empty()) {
                    *cell = Value::Null;
                }
            }
            let Some(cell) = data
                .rows()
                .get(row_index)
                .and_then(|r| r.get(rule.source_ordinal))
            else {
                continue;
            };

            let fail = |problem: String| -> BulkError {
                BulkError::Validation {
                    row: row_index + 1,
                    column: rule.column_name.clone(),
                    value: cell.to_display_string(),
                    problem,
                }
            };

            if cell.is_null() {
                if rule.rejects_nulls {
                    return Err(fail("is null but the destination column rejects nulls".into()));
                }
                continue;
            }

            if let Some(max_length) = rule.max_length {
                let length = cell.to_display_string().chars().count();
                if length > max_length {
                    return Err(fail(format!(
                        "is {} characters long but the destination column allows at most {}",
                        length, max_length
                    )));
                }
            }

            if let Some(decimal) = rule.decimal {
                let text = cell.to_display_string();
                let Some((before, after)) = decimal_parts(&text) else {
                    return Err(fail("is not numeric".into()));
                };
                if before > decimal.digits_before_point {
                    return Err(fail(format!(
                        "magnitude does not fit decimal({},{})",
                        decimal.precision(),
                        decimal.scale()
                    )));
                }
                if after > decimal.digits_after_point {
                    return Err(fail(format!(
                        "has {} decimal places but the destination scale is {}",
                        after,
                        decimal.scale()
                    )));
                }
            }

            if let Some((min, max)) = rule.int_range {
                match cell.as_i64() {
                    Some(parsed) if parsed >= min && parsed <= max => {}
                    Some(_) => {
                        return Err(fail(format!(
                            "is out of range for the destination type [{}, {}]",
                            min, max
                        )))
                    }
                    None => return Err(fail("is not an integer".into())),
                }
            }
        }
    }
    Ok(())
}

/// Digit counts either side of the point, leading zeros on the integer part
/// and trailing zeros on the fraction not counted.
fn decimal_parts(value: &str) -> Option<(u32, u32)> {
    let unsigned = value.trim().strip_prefix(['-', '+']).unwrap_or(value.trim());
    let (before, after) = match unsigned.split_once('.') {
        Some((b, a)) => (b, a),
        None => (unsigned, ""),
    };
    if before.is_empty() && after.is_empty() {
        return None;
    }
    if !before.chars().all(|c| c.is_ascii_digit()) || !after.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let significant_before = before.trim_start_matches('0').len().max(1) as u32;
    let significant_after = after.trim_end_matches('0').len() as u32;
    Some((significant_before, significant_after))
}
