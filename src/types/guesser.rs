//! Progressive type inference over streamed string values.
//!
//! Feed a [`Guesser`] the raw strings of an untyped column and it keeps the
//! narrowest [`TypeRequest`] that would still losslessly hold everything seen
//! so far. The widening lattice is
//!
//! ```text
//! bool -> byte -> int16 -> int32 -> int64 -> decimal -> text
//! ```
//!
//! Date, time and binary seeds stay put while values keep parsing as the
//! seeded kind and fall straight to text when one does not. A column seeded
//! as date-time never coerces to a string narrower than 27 characters
//! (`yyyy-MM-dd HH:mm:ss.fffffff`), and a duration never narrower than 16.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::{DecimalSize, TypeRequest, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Classified {
    Bool,
    Int(ValueKind, u32),
    Dec(DecimalSize),
    Other,
}

/// Infers the narrowest lossless type for a stream of string values.
#[derive(Debug, Clone)]
pub struct Guesser {
    kind: ValueKind,
    unicode: bool,
    max_len: usize,
    decimal_size: DecimalSize,
    /// Floor on the text width if this column ever falls to text.
    coercion_floor: usize,
    seen_value: bool,
    saw_null: bool,
}

impl Default for Guesser {
    fn default() -> Self {
        Self::new()
    }
}

impl Guesser {
    /// Width of `yyyy-MM-dd HH:mm:ss.fffffff`.
    pub const MIN_DATE_STRING_WIDTH: usize = 27;
    /// Width of `HH:MM:SS.fffffff`.
    pub const MIN_TIME_STRING_WIDTH: usize = 16;

    /// A fresh guesser with no seed; widens from bool upward.
    pub fn new() -> Self {
        Self {
            kind: ValueKind::Bool,
            unicode: false,
            max_len: 0,
            decimal_size: DecimalSize::default(),
            coercion_floor: 0,
            seen_value: false,
            saw_null: false,
        }
    }

    /// Seed from a column's current type request.
    pub fn from_request(request: TypeRequest) -> Self {
        let mut guesser = Self::new();
        guesser.kind = request.kind;
        guesser.unicode = request.unicode;
        guesser.max_len = match request.kind {
            ValueKind::Text => request.width.unwrap_or(0),
            _ => 0,
        };
        guesser.decimal_size = request.decimal_size.unwrap_or_default();
        guesser.coercion_floor = request.kind.string_coercion_floor();
        guesser
    }

    /// Whether any null or blank value has been seen.
    pub fn saw_null(&self) -> bool {
        self.saw_null
    }

    /// Account for one value. Blank strings count as null and change nothing
    /// except nullability.
    pub fn feed(&mut self, value: &str) {
        if value.trim().is_empty() {
            self.saw_null = true;
            return;
        }
        self.seen_value = true;
        self.max_len = self.max_len.max(value.chars().count());
        if !value.is_ascii() {
            self.unicode = true;
        }

        match self.kind {
            ValueKind::DateTime | ValueKind::Date => {
                if !parses_as_date_time(value) {
                    self.fall_to_text();
                }
            }
            ValueKind::Time | ValueKind::Duration => {
                if !parses_as_time(value) {
                    self.fall_to_text();
                }
            }
            ValueKind::Uuid => {
                if uuid::Uuid::parse_str(value).is_err() {
                    self.fall_to_text();
                }
            }
            ValueKind::Bytes => {
                // Raw binary never arrives as strings; any value demotes.
                self.fall_to_text();
            }
            ValueKind::Float32 | ValueKind::Float64 => {
                if value.parse::<f64>().is_err() {
                    self.fall_to_text();
                }
            }
            ValueKind::Text => {}
            _ => self.widen_numeric(classify(value)),
        }
    }

    pub fn feed_all<'a>(&mut self, values: impl IntoIterator<Item = &'a str>) {
        for value in values {
            self.feed(value);
        }
    }

    /// The narrowest request that holds every value seen so far.
    pub fn current(&self) -> TypeRequest {
        let mut request = TypeRequest::new(self.kind);
        match self.kind {
            ValueKind::Text => {
                request.width = Some(self.max_len.max(self.coercion_floor).max(1));
                request.unicode = self.unicode;
                request.explicit_width = true;
            }
            ValueKind::Decimal => {
                if !self.decimal_size.is_empty() {
                    request.decimal_size = Some(self.decimal_size);
                }
            }
            _ => {}
        }
        request
    }

    fn fall_to_text(&mut self) {
        self.kind = ValueKind::Text;
    }

    fn widen_numeric(&mut self, classified: Classified) {
        match classified {
            Classified::Bool => {
                // "true" fits no numeric kind; a mixed column is text
                if self.kind != ValueKind::Bool {
                    self.fall_to_text();
                }
            }
            Classified::Int(kind, digits) => {
                if rank(kind) > rank(self.kind) && self.kind != ValueKind::Decimal {
                    self.kind = kind;
                }
                self.decimal_size = self.decimal_size.union(&DecimalSize::new(digits, 0));
            }
            Classified::Dec(size) => {
                if rank(ValueKind::Decimal) > rank(self.kind) {
                    self.kind = ValueKind::Decimal;
                }
                self.decimal_size = self.decimal_size.union(&size);
            }
            Classified::Other => self.fall_to_text(),
        }
    }
}

fn rank(kind: ValueKind) -> u8 {
    match kind {
        ValueKind::Bool => 0,
        ValueKind::Byte => 1,
        ValueKind::Int16 => 2,
        ValueKind::Int32 => 3,
        ValueKind::Int64 => 4,
        ValueKind::Decimal => 5,
        _ => 6,
    }
}

fn classify(value: &str) -> Classified {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
        return Classified::Bool;
    }
    if let Ok(parsed) = trimmed.parse::<i64>() {
        let digits = count_digits(parsed);
        let kind = if (0..=255).contains(&parsed) {
            ValueKind::Byte
        } else if i64::from(i16::MIN) <= parsed && parsed <= i64::from(i16::MAX) {
            ValueKind::Int16
        } else if i64::from(i32::MIN) <= parsed && parsed <= i64::from(i32::MAX) {
            ValueKind::Int32
        } else {
            ValueKind::Int64
        };
        return Classified::Int(kind, digits);
    }
    if let Some(size) = decimal_size_of(trimmed) {
        return Classified::Dec(size);
    }
    Classified::Other
}

fn count_digits(value: i64) -> u32 {
    let mut magnitude = value.unsigned_abs();
    let mut digits = 1;
    while magnitude >= 10 {
        magnitude /= 10;
        digits += 1;
    }
    digits
}

/// Digits either side of the point for a plain decimal literal, with
/// trailing zeros on the fraction not counted.
fn decimal_size_of(value: &str) -> Option<DecimalSize> {
    let unsigned = value.strip_prefix(['-', '+']).unwrap_or(value);
    let (before, after) = unsigned.split_once('.')?;
    if before.is_empty() && after.is_empty() {
        return None;
    }
    if !before.chars().all(|c| c.is_ascii_digit()) || !after.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let significant_before = before.trim_start_matches('0').len().max(1);
    let significant_after = after.trim_end_matches('0').len();
    Some(DecimalSize::new(
        significant_before as u32,
        significant_after as u32,
    ))
}

fn parses_as_date_time(value: &str) -> bool {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d",
    ];
    FORMATS.iter().any(|format| {
        NaiveDateTime::parse_from_str(value, format).is_ok()
            || NaiveDate::parse_from_str(value, format).is_ok()
    })
}

fn parses_as_time(value: &str) -> bool {
    const FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];
    FORMATS
        .iter()
        .any(|format| NaiveTime::parse_from_str(value, format).is_ok())
}
