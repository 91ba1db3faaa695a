//! Error types for record decoding.
//!
//! Encoding a record can never fail: every [`Field`](crate::Field) maps to
//! exactly one [`FieldValue`](crate::FieldValue). Decoding can, when a row
//! handed to [`Record::from_values`](crate::Record::from_values) does not
//! match the record's declared layout.

use thiserror::Error;

use crate::field::FieldType;

/// Errors raised while rebuilding a record from decoded column values.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DecodeError {
    /// The number of values differs from the record's field count.
    #[error("field count mismatch: expected {expected}, found {found}")]
    FieldCount {
        /// Declared field count.
        expected: usize,
        /// Number of values supplied.
        found: usize,
    },

    /// A value's type differs from the declared field type.
    #[error("field {index}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Field position within the record.
        index: usize,
        /// Declared type.
        expected: FieldType,
        /// Type of the supplied value.
        found: FieldType,
    },
}

/// Convenience alias for decode results.
pub type Result<T> = std::result::Result<T, DecodeError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
