//! Record shapes and the `record!` declaration macro.
//!
//! A [`Record`] is a plain-data struct whose fields map, in declaration
//! order, to the columns of one table. The field list is fixed at compile
//! time by [`record!`](crate::record); nothing is discovered at runtime.

use std::ops::{Deref, DerefMut};
use std::vec;

use crate::errors::{DecodeError, Result};
use crate::field::{Field, FieldType, FieldValue};

/// A plain-data shape stored as one table.
///
/// Normally implemented through [`record!`](crate::record).
pub trait Record: Sized + Send + 'static {
    /// Field types in declaration order. Fixes column order and names.
    const FIELDS: &'static [FieldType];

    /// Encode all fields in declaration order.
    fn to_values(&self) -> Vec<FieldValue>;

    /// Rebuild a record from values in declaration order.
    fn from_values(values: Vec<FieldValue>) -> Result<Self>;
}

/// A record whose layout embeds a parent ("activation") identifier.
///
/// The field at [`ACTIVATION_FIELD`](Self::ACTIVATION_FIELD) must be an
/// `i64`; [`Filter::activation_id`](crate::Filter::activation_id) checks
/// this at compile time.
pub trait ActivationKeyed: Record {
    /// Position of the activation identifier field.
    const ACTIVATION_FIELD: usize;
}

/// A decoded record paired with its backend-assigned row identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredRow<R> {
    /// Row identifier; strictly increasing per table.
    pub row_id: i64,
    /// Decoded record fields.
    pub record: R,
}

impl<R> StoredRow<R> {
    /// Pair a record with a row identifier.
    pub fn new(row_id: i64, record: R) -> Self {
        Self { row_id, record }
    }

    /// Discard the row identifier.
    pub fn into_record(self) -> R {
        self.record
    }
}

impl<R> Deref for StoredRow<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.record
    }
}

impl<R> DerefMut for StoredRow<R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.record
    }
}

/// Check the value count before decoding field by field.
#[doc(hidden)]
pub fn begin_decode(
    values: Vec<FieldValue>,
    expected: usize,
) -> Result<std::iter::Enumerate<vec::IntoIter<FieldValue>>> {
    if values.len() != expected {
        return Err(DecodeError::FieldCount {
            expected,
            found: values.len(),
        });
    }
    Ok(values.into_iter().enumerate())
}

/// Decode the next field of a record.
#[doc(hidden)]
pub fn decode_next<T: Field>(
    values: &mut std::iter::Enumerate<vec::IntoIter<FieldValue>>,
    expected: usize,
) -> Result<T> {
    let (index, value) = values.next().ok_or(DecodeError::FieldCount {
        expected,
        found: expected.saturating_sub(values.len() + 1),
    })?;
    let found = value.field_type();
    T::from_value(value).ok_or(DecodeError::TypeMismatch {
        index,
        expected: T::TYPE,
        found,
    })
}

/// Declare a record struct and implement [`Record`] for it.
///
/// ```ignore
/// structdb_core::record! {
///     #[derive(Clone, Debug, PartialEq)]
///     pub struct Reading {
///         pub sensor: i32,
///         pub label: String,
///     }
/// }
/// ```
///
/// Field order is the column order. Every field type must implement
/// [`Field`]; anything else fails to compile.
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )+
        }

        impl $crate::Record for $name {
            const FIELDS: &'static [$crate::FieldType] =
                &[$(<$ty as $crate::Field>::TYPE),+];

            fn to_values(&self) -> ::std::vec::Vec<$crate::FieldValue> {
                ::std::vec![$($crate::Field::to_value(&self.$field)),+]
            }

            fn from_values(
                values: ::std::vec::Vec<$crate::FieldValue>,
            ) -> ::std::result::Result<Self, $crate::DecodeError> {
                let expected = <Self as $crate::Record>::FIELDS.len();
                let mut values = $crate::record::begin_decode(values, expected)?;
                ::std::result::Result::Ok(Self {
                    $(
                        $field: $crate::record::decode_next::<$ty>(&mut values, expected)?,
                    )+
                })
            }
        }
    };
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
