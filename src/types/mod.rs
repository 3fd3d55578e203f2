//! The engine-independent type model.
//!
//! A [`TypeRequest`] describes the column type a caller wants without
//! committing to any engine's spelling. The per-engine [`TypeTranslator`]
//! turns a request into a concrete SQL type string and parses engine
//! spellings back into requests. The [`Guesser`] computes the narrowest
//! request that losslessly holds a stream of string values.

mod guesser;
mod translator;

pub use guesser::Guesser;
pub use translator::{TypeMapError, TypeTranslator};

use serde::{Deserialize, Serialize};

/// Sentinel width for unbounded string/binary columns (`varchar(max)`,
/// `text`, `CLOB`, ...).
pub const UNBOUNDED: usize = usize::MAX;

/// The closed set of logical value kinds a request can ask for.
///
/// Every kind maps to a concrete spelling on every engine; anything outside
/// this set fails with [`TypeMapError::NotMapped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    /// Unsigned 8-bit integer (`tinyint`).
    Byte,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    Text,
    /// Date and time of day.
    DateTime,
    /// Date only.
    Date,
    /// Time of day only.
    Time,
    /// Elapsed time (`TimeSpan` in source systems).
    Duration,
    Bytes,
    Uuid,
}

impl ValueKind {
    /// Whether this kind is one of the integer family.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ValueKind::Byte | ValueKind::Int16 | ValueKind::Int32 | ValueKind::Int64
        )
    }

    /// Inclusive value range for integer kinds, `None` otherwise.
    ///
    /// `Byte` is unsigned (the SQL `tinyint` convention); the rest are
    /// two's-complement signed.
    pub fn integer_range(&self) -> Option<(i64, i64)> {
        match self {
            ValueKind::Byte => Some((0, 255)),
            ValueKind::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            ValueKind::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            ValueKind::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// Minimum string width a value of this kind needs when coerced to text
    /// at streaming time.
    ///
    /// `DateTime` needs 27 characters (`yyyy-MM-dd HH:mm:ss.fffffff`) and
    /// `Duration` needs 16 (`HH:MM:SS.fffffff`); truncating either loses
    /// information.
    pub fn string_coercion_floor(&self) -> usize {
        match self {
            ValueKind::DateTime => 27,
            ValueKind::Duration | ValueKind::Time => 16,
            ValueKind::Date => 10,
            _ => 0,
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Byte => "byte",
            ValueKind::Int16 => "int16",
            ValueKind::Int32 => "int32",
            ValueKind::Int64 => "int64",
            ValueKind::Float32 => "float32",
            ValueKind::Float64 => "float64",
            ValueKind::Decimal => "decimal",
            ValueKind::Text => "text",
            ValueKind::DateTime => "datetime",
            ValueKind::Date => "date",
            ValueKind::Time => "time",
            ValueKind::Duration => "duration",
            ValueKind::Bytes => "bytes",
            ValueKind::Uuid => "uuid",
        };
        write!(f, "{}", name)
    }
}

/// Decimal width as digits either side of the point.
///
/// DBMS "precision" is the total digit count and "scale" is the count after
/// the point, so `precision = before + after` and `scale = after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecimalSize {
    pub digits_before_point: u32,
    pub digits_after_point: u32,
}

impl DecimalSize {
    pub fn new(digits_before_point: u32, digits_after_point: u32) -> Self {
        Self {
            digits_before_point,
            digits_after_point,
        }
    }

    /// Build from the `(precision, scale)` pair as SQL writes it.
    pub fn from_precision_scale(precision: u32, scale: u32) -> Self {
        Self {
            digits_before_point: precision.saturating_sub(scale),
            digits_after_point: scale,
        }
    }

    pub fn precision(&self) -> u32 {
        self.digits_before_point + self.digits_after_point
    }

    pub fn scale(&self) -> u32 {
        self.digits_after_point
    }

    /// Grow to cover another size.
    pub fn union(&self, other: &DecimalSize) -> DecimalSize {
        DecimalSize {
            digits_before_point: self.digits_before_point.max(other.digits_before_point),
            digits_after_point: self.digits_after_point.max(other.digits_after_point),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.digits_before_point == 0 && self.digits_after_point == 0
    }
}

/// A DBMS-independent column type request.
///
/// Width applies only to `Text` (and is [`UNBOUNDED`] for `(max)`-style
/// columns); `decimal_size` applies only to `Decimal`; `unicode` applies only
/// to `Text`. The translators ignore the inapplicable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRequest {
    pub kind: ValueKind,
    pub width: Option<usize>,
    pub decimal_size: Option<DecimalSize>,
    pub unicode: bool,
    /// Whether `width` was supplied by the caller rather than defaulted.
    pub explicit_width: bool,
}

impl TypeRequest {
    pub fn new(kind: ValueKind) -> Self {
        Self {
            kind,
            width: None,
            decimal_size: None,
            unicode: false,
            explicit_width: false,
        }
    }

    pub fn text(width: usize) -> Self {
        Self {
            kind: ValueKind::Text,
            width: Some(width),
            decimal_size: None,
            unicode: false,
            explicit_width: true,
        }
    }

    pub fn unicode_text(width: usize) -> Self {
        Self {
            unicode: true,
            ..Self::text(width)
        }
    }

    pub fn decimal(size: DecimalSize) -> Self {
        Self {
            kind: ValueKind::Decimal,
            width: None,
            decimal_size: Some(size),
            unicode: false,
            explicit_width: false,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self.explicit_width = true;
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.width == Some(UNBOUNDED)
    }

    /// The width a string column would need to hold this type's values,
    /// never less than the kind's coercion floor.
    pub fn width_for_string_coercion(&self) -> usize {
        let floor = self.kind.string_coercion_floor();
        match self.kind {
            ValueKind::Text => self.width.unwrap_or(0).max(floor),
            ValueKind::Decimal => {
                let size = self.decimal_size.unwrap_or_default();
                // sign + digits + point
                (size.precision() as usize + 2).max(floor)
            }
            _ => floor,
        }
    }

    /// Equivalence modulo fields that do not apply to the kind.
    pub fn is_equivalent_to(&self, other: &TypeRequest) -> bool {
        if self.kind != other.kind {
            return false;
        }
        match self.kind {
            ValueKind::Text => self.width == other.width && self.unicode == other.unicode,
            ValueKind::Decimal => {
                self.decimal_size.unwrap_or_default() == other.decimal_size.unwrap_or_default()
            }
            _ => true,
        }
    }
}
