//! The closed set of storable field types.
//!
//! A record field must be one of `i32`, `i64`, `f64`, `bool`, `String` or
//! `DateTime<Utc>`. The set is enforced by the [`Field`] trait: there is no
//! implementation for anything else, so an unsupported field type is a
//! compile error in the `record!` expansion rather than a runtime failure.
//!
//! Timestamps are stored as integer milliseconds since the Unix epoch.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};

/// Primitive type of a single record field.
///
/// The [`Display`](fmt::Display) form is the type name embedded in column
/// names (`_<index><type name>`), so it is part of the on-disk format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Real,
    /// Boolean, stored as 0/1.
    Bool,
    /// UTF-8 text.
    Text,
    /// UTC timestamp, stored as integer milliseconds.
    Timestamp,
}

impl FieldType {
    /// All field types in declaration order.
    pub const ALL: [FieldType; 6] = [
        Self::Int32,
        Self::Int64,
        Self::Real,
        Self::Bool,
        Self::Text,
        Self::Timestamp,
    ];

    /// Type name used inside column names.
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Int32 => "i32",
            Self::Int64 => "i64",
            Self::Real => "f64",
            Self::Bool => "bool",
            Self::Text => "String",
            Self::Timestamp => "DateTime",
        }
    }

    /// Declared SQL type used in `CREATE TABLE`.
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Int32 | Self::Int64 | Self::Timestamp => "INTEGER",
            Self::Real => "REAL",
            Self::Bool => "BOOLEAN",
            Self::Text => "TEXT",
        }
    }

    /// Whether `declared` is an acceptable declared type for this field
    /// when validating an existing file.
    ///
    /// Text columns written by older builds were declared `STRING`. SQLite
    /// gives such columns NUMERIC affinity, so numeric-looking text (`"007"`)
    /// was stored as a number there; the store warns when it opens one.
    pub fn accepts_declared(self, declared: &str) -> bool {
        declared.eq_ignore_ascii_case(self.sql_type())
            || (self == Self::Text && declared.eq_ignore_ascii_case("STRING"))
    }

    /// `const` equality, usable in compile-time schema checks.
    pub const fn same_as(self, other: FieldType) -> bool {
        self as u8 == other as u8
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A decoded or to-be-bound field value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Real(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 text.
    Text(String),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Type of this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Int32(_) => FieldType::Int32,
            Self::Int64(_) => FieldType::Int64,
            Self::Real(_) => FieldType::Real,
            Self::Bool(_) => FieldType::Bool,
            Self::Text(_) => FieldType::Text,
            Self::Timestamp(_) => FieldType::Timestamp,
        }
    }

    /// Render this value as an inline SQL literal.
    ///
    /// Literals are inlined into filter fragments, not bound as parameters.
    /// Text is single-quoted with embedded quotes doubled. Reals always carry
    /// an exponent so SQLite parses them as REAL, never INTEGER; infinities
    /// render as out-of-range exponents (`9e999`) and NaN as `NULL`, which
    /// matches no row.
    pub fn sql_literal(&self) -> String {
        match self {
            Self::Int32(v) => v.to_string(),
            Self::Int64(v) => v.to_string(),
            Self::Real(v) if v.is_finite() => format!("{v:e}"),
            Self::Real(v) if v.is_nan() => "NULL".to_string(),
            Self::Real(v) if *v > 0.0 => "9e999".to_string(),
            Self::Real(_) => "-9e999".to_string(),
            Self::Bool(v) => if *v { "1" } else { "0" }.to_string(),
            Self::Text(v) => format!("'{}'", v.replace('\'', "''")),
            Self::Timestamp(v) => v.timestamp_millis().to_string(),
        }
    }
}

/// A Rust type that can be stored in a record field.
///
/// Implemented only for the closed set listed in the module docs.
pub trait Field: Clone + PartialOrd + Send + Sync + 'static {
    /// Column type for this field.
    const TYPE: FieldType;

    /// Encode into a [`FieldValue`].
    fn to_value(&self) -> FieldValue;

    /// Decode from a [`FieldValue`]; `None` when the variant does not match.
    fn from_value(value: FieldValue) -> Option<Self>;

    /// Compare two values the way the database compares their stored form.
    fn compare(&self, other: &Self) -> Option<Ordering> {
        self.partial_cmp(other)
    }
}

macro_rules! impl_field {
    ($ty:ty, $variant:ident, $field_type:expr) => {
        impl Field for $ty {
            const TYPE: FieldType = $field_type;

            fn to_value(&self) -> FieldValue {
                FieldValue::$variant(self.clone())
            }

            fn from_value(value: FieldValue) -> Option<Self> {
                match value {
                    FieldValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_field!(i32, Int32, FieldType::Int32);
impl_field!(i64, Int64, FieldType::Int64);
impl_field!(f64, Real, FieldType::Real);
impl_field!(bool, Bool, FieldType::Bool);
impl_field!(String, Text, FieldType::Text);

impl Field for DateTime<Utc> {
    const TYPE: FieldType = FieldType::Timestamp;

    fn to_value(&self) -> FieldValue {
        FieldValue::Timestamp(*self)
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Timestamp(v) => Some(v),
            _ => None,
        }
    }

    // Stored with millisecond precision.
    fn compare(&self, other: &Self) -> Option<Ordering> {
        Some(self.timestamp_millis().cmp(&other.timestamp_millis()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
