//! Compile-time table list: which record type lives at which position.
//!
//! A store is parametrized by a tuple of record types, `(A, B, C)`. The tuple
//! position of a type is its table position, resolved at compile time through
//! [`TableAt`]. Operations take the position as a const generic, so an
//! out-of-range position or a record of the wrong type does not compile.
//!
//! [`TableOf`] goes the other way, from a record type to its position. The
//! position marker `P` is inferred; a type listed twice leaves it ambiguous
//! and such calls must use the positional form.

use crate::record::Record;
use crate::schema::TableSchema;

/// An ordered list of record types, one table each.
pub trait Tables: 'static {
    /// Number of declared tables.
    const COUNT: usize;

    /// Derived layouts of every table, in position order.
    fn schemas() -> Vec<TableSchema>;
}

/// Resolves the record type stored at table position `N`.
pub trait TableAt<const N: usize>: Tables {
    /// Record type of table `N`.
    type Record: Record;
}

/// Record type at position `N` of table list `S`.
pub type RecordAt<S, const N: usize> = <S as TableAt<N>>::Record;

/// Position marker used by [`TableOf`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct At<const N: usize>;

/// Resolves the table position of record type `R`.
pub trait TableOf<R: Record, P>: Tables {
    /// Table position of `R`.
    const POSITION: usize;
}

macro_rules! impl_tables {
    ($( ($T:ident $idx:tt) ),+) => {
        impl<$($T: Record),+> Tables for ($($T,)+) {
            const COUNT: usize = [$($idx),+].len();

            fn schemas() -> Vec<TableSchema> {
                vec![$(TableSchema::of::<$T>($idx)),+]
            }
        }

        impl_tables!(@at [$($T),+] ($($T,)+); $( ($T $idx) )+);
    };
    (@at [$($G:ident),+] $tuple:ty; ) => {};
    (@at [$($G:ident),+] $tuple:ty; ($T:ident $idx:tt) $($rest:tt)*) => {
        impl<$($G: Record),+> TableAt<$idx> for $tuple {
            type Record = $T;
        }

        impl<$($G: Record),+> TableOf<$T, At<$idx>> for $tuple {
            const POSITION: usize = $idx;
        }

        impl_tables!(@at [$($G),+] $tuple; $($rest)*);
    };
}

impl_tables!((A 0));
impl_tables!((A 0), (B 1));
impl_tables!((A 0), (B 1), (C 2));
impl_tables!((A 0), (B 1), (C 2), (D 3));
impl_tables!((A 0), (B 1), (C 2), (D 3), (E 4));
impl_tables!((A 0), (B 1), (C 2), (D 3), (E 4), (F 5));
impl_tables!((A 0), (B 1), (C 2), (D 3), (E 4), (F 5), (G 6));
impl_tables!((A 0), (B 1), (C 2), (D 3), (E 4), (F 5), (G 6), (H 7));

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
