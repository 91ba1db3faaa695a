//! One-shot comparison predicates with a SQL form and an in-memory form.
//!
//! A [`Filter`] is bound at construction to a target: nothing ([`Blank`]),
//! the row identifier, a field by position, the activation identifier of an
//! [`ActivationKeyed`] record, or the single field of a given type. The
//! comparison kind and the comparand are each set once; later calls are
//! ignored.
//!
//! [`Filter::query`] renders `" WHERE <column> <op> <literal>"` with the
//! comparand inlined as a literal. [`Filter::try_pass`] evaluates the same
//! predicate against a decoded row without touching storage, so a caller can
//! tell whether a row it just wrote is visible under the filter. The two
//! forms agree for every comparison kind, including an incomplete filter:
//! no `WHERE` clause, and every candidate passes.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

use crate::field::{Field, FieldType, FieldValue};
use crate::record::{ActivationKeyed, Record, StoredRow};
use crate::schema::{column_has_type, column_name, count_of_type, index_of_type};

/// Comparison kind of a filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// Not set yet.
    #[default]
    None,
    /// `=`
    Equal,
    /// `>`
    Greater,
    /// `<`
    Less,
    /// `>=`
    GreaterOrEqual,
    /// `<=`
    LessOrEqual,
}

impl Comparison {
    /// All settable kinds.
    pub const ALL: [Comparison; 5] = [
        Self::Equal,
        Self::Greater,
        Self::Less,
        Self::GreaterOrEqual,
        Self::LessOrEqual,
    ];

    /// SQL operator, or `None` when unset.
    pub fn sql_operator(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Equal => Some("="),
            Self::Greater => Some(">"),
            Self::Less => Some("<"),
            Self::GreaterOrEqual => Some(">="),
            Self::LessOrEqual => Some("<="),
        }
    }

    /// Whether `candidate <op> bound` holds, given `candidate.cmp(bound)`.
    ///
    /// An unordered pair (e.g. NaN) never matches a set comparison.
    pub fn holds(self, ordering: Option<Ordering>) -> bool {
        match (self, ordering) {
            (Self::None, _) => true,
            (_, None) => false,
            (Self::Equal, Some(o)) => o == Ordering::Equal,
            (Self::Greater, Some(o)) => o == Ordering::Greater,
            (Self::Less, Some(o)) => o == Ordering::Less,
            (Self::GreaterOrEqual, Some(o)) => o != Ordering::Less,
            (Self::LessOrEqual, Some(o)) => o != Ordering::Greater,
        }
    }
}

/// What a filter compares against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterTarget {
    /// Matches everything; renders no SQL.
    Blank,
    /// The row identifier.
    RowId,
    /// A field selected by position.
    Column(usize),
    /// The embedded activation identifier field.
    ActivationId(usize),
    /// The unique field of a given type, resolved to its position.
    ExactType(usize),
}

impl FilterTarget {
    fn field_index(self) -> Option<usize> {
        match self {
            Self::Blank | Self::RowId => None,
            Self::Column(i) | Self::ActivationId(i) | Self::ExactType(i) => Some(i),
        }
    }

    fn column_sql(self, fields: &[FieldType]) -> Option<String> {
        match self {
            Self::Blank => None,
            Self::RowId => Some("rowid".to_string()),
            Self::Column(i) | Self::ActivationId(i) | Self::ExactType(i) => {
                fields.get(i).map(|ty| column_name(i, *ty))
            }
        }
    }
}

/// Comparand type of a filter that has no target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Blank;

/// A value a filter can compare against.
///
/// Implemented for every [`Field`] type and for [`Blank`].
pub trait Comparand: Clone + Send + Sync + 'static {
    /// Inline SQL literal.
    fn literal(&self) -> String;

    /// Extract a comparand from a decoded field value.
    fn from_field_value(value: FieldValue) -> Option<Self>;

    /// Order `self` against `other` the way the database would.
    fn compare_to(&self, other: &Self) -> Option<Ordering>;
}

impl<T: Field> Comparand for T {
    fn literal(&self) -> String {
        self.to_value().sql_literal()
    }

    fn from_field_value(value: FieldValue) -> Option<Self> {
        T::from_value(value)
    }

    fn compare_to(&self, other: &Self) -> Option<Ordering> {
        self.compare(other)
    }
}

impl Comparand for Blank {
    fn literal(&self) -> String {
        String::new()
    }

    fn from_field_value(_value: FieldValue) -> Option<Self> {
        Some(Blank)
    }

    fn compare_to(&self, _other: &Self) -> Option<Ordering> {
        Some(Ordering::Equal)
    }
}

/// A one-shot comparison predicate over records of type `R`.
///
/// `T` is the comparand type: `i64` for row and activation identifiers, the
/// field type for column and exact-type targets, [`Blank`] for the blank
/// filter.
pub struct Filter<R, T = Blank> {
    target: FilterTarget,
    column: Option<String>,
    comparison: Comparison,
    value: Option<T>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record, T: Comparand> Filter<R, T> {
    fn with_target(target: FilterTarget) -> Self {
        Self {
            target,
            column: target.column_sql(R::FIELDS),
            comparison: Comparison::None,
            value: None,
            _record: PhantomData,
        }
    }

    fn set_comparison(mut self, comparison: Comparison) -> Self {
        if self.target != FilterTarget::Blank && self.comparison == Comparison::None {
            self.comparison = comparison;
        }
        self
    }

    /// Compare with `=`.
    #[must_use]
    pub fn equal(self) -> Self {
        self.set_comparison(Comparison::Equal)
    }

    /// Compare with `>`.
    #[must_use]
    pub fn greater(self) -> Self {
        self.set_comparison(Comparison::Greater)
    }

    /// Compare with `<`.
    #[must_use]
    pub fn less(self) -> Self {
        self.set_comparison(Comparison::Less)
    }

    /// Compare with `>=`.
    #[must_use]
    pub fn greater_or_equal(self) -> Self {
        self.set_comparison(Comparison::GreaterOrEqual)
    }

    /// Compare with `<=`.
    #[must_use]
    pub fn less_or_equal(self) -> Self {
        self.set_comparison(Comparison::LessOrEqual)
    }

    /// Bind the comparand. Only the first call takes effect.
    #[must_use]
    pub fn value(mut self, value: T) -> Self {
        if self.target != FilterTarget::Blank && self.value.is_none() {
            self.value = Some(value);
        }
        self
    }

    /// Target this filter was built for.
    pub fn target(&self) -> FilterTarget {
        self.target
    }

    /// Comparison kind, [`Comparison::None`] until set.
    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    /// Bound comparand, if any.
    pub fn bound_value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Whether both kind and comparand are set.
    pub fn is_complete(&self) -> bool {
        self.comparison != Comparison::None && self.value.is_some()
    }

    /// SQL fragment, `" WHERE <column> <op> <literal>"`, or empty text
    /// unless both kind and comparand are set.
    pub fn query(&self) -> String {
        match (&self.column, self.comparison.sql_operator(), &self.value) {
            (Some(column), Some(op), Some(value)) => {
                format!(" WHERE {column} {op} {}", value.literal())
            }
            _ => String::new(),
        }
    }

    /// Evaluate the predicate against a bare comparand value.
    pub fn try_pass_value(&self, candidate: &T) -> bool {
        match (&self.value, self.target) {
            (_, FilterTarget::Blank) | (None, _) => true,
            (Some(bound), _) => self.comparison.holds(candidate.compare_to(bound)),
        }
    }

    /// Evaluate the predicate against a stored row, in memory.
    pub fn try_pass(&self, row: &StoredRow<R>) -> bool {
        if !self.is_complete() {
            return true;
        }
        let candidate = match self.target {
            FilterTarget::Blank => return true,
            FilterTarget::RowId => T::from_field_value(FieldValue::Int64(row.row_id)),
            target => target
                .field_index()
                .and_then(|i| row.record.to_values().into_iter().nth(i))
                .and_then(T::from_field_value),
        };
        candidate.is_some_and(|c| self.try_pass_value(&c))
    }
}

impl<R: Record> Filter<R, Blank> {
    /// A filter that matches every row.
    pub fn blank() -> Self {
        Self::with_target(FilterTarget::Blank)
    }
}

impl<R: Record> Default for Filter<R, Blank> {
    fn default() -> Self {
        Self::blank()
    }
}

impl<R: Record> Filter<R, i64> {
    /// Filter on the row identifier.
    pub fn row_id() -> Self {
        Self::with_target(FilterTarget::RowId)
    }
}

impl<R: ActivationKeyed> Filter<R, i64> {
    /// Filter on the record's embedded activation identifier.
    pub fn activation_id() -> Self {
        let index = const {
            assert!(
                column_has_type(R::FIELDS, R::ACTIVATION_FIELD, FieldType::Int64),
                "activation field must be an i64 field of the record"
            );
            R::ACTIVATION_FIELD
        };
        Self::with_target(FilterTarget::ActivationId(index))
    }
}

impl<R: Record, T: Field> Filter<R, T> {
    /// Filter on the field at position `I`, whose type must be `T`.
    pub fn column<const I: usize>() -> Self {
        const {
            assert!(
                column_has_type(R::FIELDS, I, T::TYPE),
                "column position out of range or comparand type differs from the field type"
            );
        }
        Self::with_target(FilterTarget::Column(I))
    }

    /// Filter on the single field of type `T`.
    ///
    /// A record with zero or several `T` fields is rejected at compile time;
    /// use [`Filter::column`] to pick one of several.
    pub fn of_type() -> Self {
        let index = const {
            assert!(
                count_of_type(R::FIELDS, T::TYPE) == 1,
                "exact-type filter needs exactly one field of the comparand type"
            );
            index_of_type(R::FIELDS, T::TYPE)
        };
        Self::with_target(FilterTarget::ExactType(index))
    }
}

impl<R, T: Clone> Clone for Filter<R, T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target,
            column: self.column.clone(),
            comparison: self.comparison,
            value: self.value.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record, T: Comparand> fmt::Debug for Filter<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("target", &self.target)
            .field("comparison", &self.comparison)
            .field("value", &self.value.as_ref().map(Comparand::literal))
            .finish()
    }
}

/// Filters are equal when they render the same SQL.
impl<R: Record, T: Comparand> PartialEq for Filter<R, T> {
    fn eq(&self, other: &Self) -> bool {
        self.query() == other.query()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    use super::*;

    crate::record! {
        #[derive(Clone, Debug, PartialEq)]
        struct Reading {
            sensor: i32,
            label: String,
            level: f64,
        }
    }

    crate::record! {
        #[derive(Clone, Debug, PartialEq)]
        struct Event {
            activation: i64,
            at: DateTime<Utc>,
            code: i32,
        }
    }

    impl ActivationKeyed for Event {
        const ACTIVATION_FIELD: usize = 0;
    }

    fn reading(sensor: i32, label: &str, level: f64) -> StoredRow<Reading> {
        StoredRow::new(
            1,
            Reading {
                sensor,
                label: label.into(),
                level,
            },
        )
    }

    fn reference(kind: Comparison, candidate: i32, bound: i32) -> bool {
        match kind {
            Comparison::None => true,
            Comparison::Equal => candidate == bound,
            Comparison::Greater => candidate > bound,
            Comparison::Less => candidate < bound,
            Comparison::GreaterOrEqual => candidate >= bound,
            Comparison::LessOrEqual => candidate <= bound,
        }
    }

    fn with_kind<T: Comparand>(filter: Filter<Reading, T>, kind: Comparison) -> Filter<Reading, T> {
        match kind {
            Comparison::None => filter,
            Comparison::Equal => filter.equal(),
            Comparison::Greater => filter.greater(),
            Comparison::Less => filter.less(),
            Comparison::GreaterOrEqual => filter.greater_or_equal(),
            Comparison::LessOrEqual => filter.less_or_equal(),
        }
    }

    // ── SQL rendering ───────────────────────────────────────────────

    #[test]
    fn blank_renders_nothing_and_passes_everything() {
        let filter = Filter::<Reading>::blank().equal().value(Blank);
        assert_eq!(filter.query(), "");
        assert_eq!(filter.comparison(), Comparison::None);
        assert!(filter.try_pass(&reading(1, "a", 0.0)));
    }

    #[test]
    fn row_id_query() {
        let filter = Filter::<Reading, i64>::row_id().greater().value(5);
        assert_eq!(filter.query(), " WHERE rowid > 5");
    }

    #[test]
    fn column_query() {
        let filter = Filter::<Reading, String>::column::<1>().equal().value("it's".into());
        assert_eq!(filter.query(), " WHERE _1String = 'it''s'");
    }

    #[test]
    fn exact_type_query() {
        let filter = Filter::<Reading, f64>::of_type().less_or_equal().value(1.5);
        assert_eq!(filter.target(), FilterTarget::ExactType(2));
        assert_eq!(filter.query(), " WHERE _2f64 <= 1.5e0");
    }

    #[test]
    fn activation_query() {
        let filter = Filter::<Event, i64>::activation_id().equal().value(77);
        assert_eq!(filter.target(), FilterTarget::ActivationId(0));
        assert_eq!(filter.query(), " WHERE _0i64 = 77");
    }

    #[test]
    fn incomplete_filter_renders_nothing() {
        let kind_only = Filter::<Reading, i32>::column::<0>().greater();
        assert_eq!(kind_only.query(), "");
        let value_only = Filter::<Reading, i32>::column::<0>().value(3);
        assert_eq!(value_only.query(), "");
        assert!(!value_only.is_complete());
    }

    #[test]
    fn value_before_kind_is_accepted() {
        let filter = Filter::<Reading, i32>::column::<0>().value(3).greater_or_equal();
        assert_eq!(filter.query(), " WHERE _0i32 >= 3");
    }

    // ── One-shot semantics ──────────────────────────────────────────

    #[test]
    fn comparison_is_set_once() {
        let filter = Filter::<Reading, i64>::row_id().equal().greater().less();
        assert_eq!(filter.comparison(), Comparison::Equal);
    }

    #[test]
    fn value_is_bound_once() {
        let filter = Filter::<Reading, i64>::row_id().equal().value(1).value(2);
        assert_eq!(filter.bound_value(), Some(&1));
        assert_eq!(filter.query(), " WHERE rowid = 1");
    }

    // ── In-memory evaluation ────────────────────────────────────────

    #[test]
    fn boundary_values_for_every_kind() {
        for kind in Comparison::ALL {
            let filter = with_kind(Filter::<Reading, i32>::column::<0>(), kind).value(10);
            for candidate in [9, 10, 11] {
                assert_eq!(
                    filter.try_pass(&reading(candidate, "x", 0.0)),
                    reference(kind, candidate, 10),
                    "{kind:?} with candidate {candidate}"
                );
            }
        }
    }

    #[test]
    fn row_id_try_pass_uses_identifier() {
        let filter = Filter::<Reading, i64>::row_id().less().value(5);
        assert!(filter.try_pass(&StoredRow::new(4, reading(0, "", 0.0).record)));
        assert!(!filter.try_pass(&StoredRow::new(5, reading(0, "", 0.0).record)));
        assert!(filter.try_pass_value(&-1));
    }

    #[test]
    fn activation_try_pass() {
        let filter = Filter::<Event, i64>::activation_id().equal().value(3);
        let event = |activation| {
            StoredRow::new(
                1,
                Event {
                    activation,
                    at: DateTime::from_timestamp_millis(0).unwrap(),
                    code: 0,
                },
            )
        };
        assert!(filter.try_pass(&event(3)));
        assert!(!filter.try_pass(&event(4)));
    }

    #[test]
    fn text_compares_bytewise() {
        let filter = Filter::<Reading, String>::column::<1>().greater().value("b".into());
        assert!(filter.try_pass(&reading(0, "c", 0.0)));
        assert!(filter.try_pass(&reading(0, "ba", 0.0)));
        assert!(!filter.try_pass(&reading(0, "B", 0.0)));
        assert!(!filter.try_pass(&reading(0, "b", 0.0)));
    }

    #[test]
    fn nan_never_matches_set_comparison() {
        let filter = Filter::<Reading, f64>::of_type().less_or_equal().value(1.0);
        assert!(!filter.try_pass(&reading(0, "", f64::NAN)));
    }

    #[test]
    fn incomplete_filter_passes_everything() {
        let filter = Filter::<Reading, i32>::column::<0>().greater();
        assert!(filter.try_pass(&reading(-100, "", 0.0)));
        assert!(filter.try_pass_value(&-100));
    }

    #[test]
    fn equality_follows_query() {
        let a = Filter::<Reading, i64>::row_id().equal().value(1);
        let b = Filter::<Reading, i64>::row_id().value(1).equal();
        let c = Filter::<Reading, i64>::row_id().equal().value(2);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.clone(), a);
    }

    proptest! {
        #[test]
        fn try_pass_matches_comparison(
            kind_index in 0usize..5,
            bound in -50i32..50,
            candidate in -50i32..50,
        ) {
            let kind = Comparison::ALL[kind_index];
            let filter = with_kind(Filter::<Reading, i32>::column::<0>(), kind).value(bound);
            prop_assert_eq!(
                filter.try_pass(&reading(candidate, "", 0.0)),
                reference(kind, candidate, bound)
            );
            prop_assert_eq!(filter.try_pass_value(&candidate), reference(kind, candidate, bound));
        }
    }
}
