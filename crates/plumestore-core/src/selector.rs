//! Row and column selection.
//!
//! Selections are small tagged unions rather than a predicate language:
//! rows are chosen by explicit index values or by `before` / `after` /
//! `between` boundaries, columns by explicit names or an SQL-flavoured
//! `like` pattern (`%` matches any run, `?` a single character, both
//! case-insensitive).
//!
//! Row selections drive two layers of filtering. Partition pruning compares
//! the selection's value interval against stored per-partition min/max
//! statistics and is sound but loose: it may keep a partition with no
//! matches, never the reverse. The exact boolean mask is then evaluated
//! against the decoded index of the surviving partitions.

use std::collections::HashSet;
use std::ops::Range;

use arrow::array::{Array, BooleanArray, Int64Array, Scalar, StringArray};
use arrow::compute::kernels::{boolean, cmp};
use arrow::error::ArrowError;
use regex::{Regex, RegexBuilder};
use snafu::{Backtrace, prelude::*};

use crate::frame::IndexView;
use crate::metadata::{IndexDtype, IndexValue, PartitionStats};

/// Errors raised while validating or evaluating a selection.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SelectorError {
    /// A row selection value does not match the index's comparison class.
    #[snafu(display("Selection value of class {found} cannot query a {expected} index"))]
    ClassMismatch {
        /// The class of the stored index.
        expected: IndexDtype,
        /// The class the selection value arrived with.
        found: IndexDtype,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A `between` selection whose low bound exceeds its high bound.
    #[snafu(display("Between selection is inverted: {low} > {high}"))]
    InvertedRange {
        /// The low bound.
        low: IndexValue,
        /// The high bound.
        high: IndexValue,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A `like` pattern that does not compile.
    #[snafu(display("Invalid like pattern {pattern:?}: {source}"))]
    BadPattern {
        /// The offending pattern.
        pattern: String,
        /// Underlying regex error.
        source: regex::Error,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// An Arrow kernel failed while evaluating a mask.
    #[snafu(display("Arrow failure while building a row mask: {source}"))]
    Mask {
        /// Underlying Arrow error.
        source: ArrowError,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },
}

/// Which rows of a table to touch, expressed against the index.
#[derive(Debug, Clone, PartialEq)]
pub enum RowSelection {
    /// Rows whose index value appears in the list.
    Explicit(Vec<IndexValue>),
    /// Rows at or before the value (`index <= value`).
    Before(IndexValue),
    /// Rows at or after the value (`index >= value`).
    After(IndexValue),
    /// Rows between the bounds, both inclusive.
    Between(IndexValue, IndexValue),
}

impl RowSelection {
    /// Selection of the listed index values.
    pub fn explicit<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<IndexValue>,
    {
        Self::Explicit(values.into_iter().map(Into::into).collect())
    }

    /// Selection of rows at or before `value`.
    pub fn before(value: impl Into<IndexValue>) -> Self {
        Self::Before(value.into())
    }

    /// Selection of rows at or after `value`.
    pub fn after(value: impl Into<IndexValue>) -> Self {
        Self::After(value.into())
    }

    /// Selection of rows between `low` and `high`, both inclusive.
    pub fn between(low: impl Into<IndexValue>, high: impl Into<IndexValue>) -> Self {
        Self::Between(low.into(), high.into())
    }

    /// Coerce every value to the index class, failing on a class the index
    /// cannot compare against. Integer literals are accepted for datetime
    /// indexes (and vice versa) as raw epoch values of the stored unit.
    pub fn coerce_to(&self, class: IndexDtype) -> Result<RowSelection, SelectorError> {
        Ok(match self {
            Self::Explicit(values) => Self::Explicit(
                values
                    .iter()
                    .map(|v| coerce_value(v, class))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Before(v) => Self::Before(coerce_value(v, class)?),
            Self::After(v) => Self::After(coerce_value(v, class)?),
            Self::Between(l, h) => {
                let low = coerce_value(l, class)?;
                let high = coerce_value(h, class)?;
                if low > high {
                    return InvertedRangeSnafu { low, high }.fail();
                }
                Self::Between(low, high)
            }
        })
    }

    /// The closed value interval the selection can possibly touch, as
    /// `(low, high)` with `None` for an open end. `Explicit` collapses to
    /// the span of its values; an empty list yields `None`.
    fn interval(&self) -> Option<(Option<&IndexValue>, Option<&IndexValue>)> {
        match self {
            Self::Explicit(values) => {
                let low = values.iter().min()?;
                let high = values.iter().max()?;
                Some((Some(low), Some(high)))
            }
            Self::Before(v) => Some((None, Some(v))),
            Self::After(v) => Some((Some(v), None)),
            Self::Between(l, h) => Some((Some(l), Some(h))),
        }
    }
}

/// Coerce one selection value to the index class.
fn coerce_value(value: &IndexValue, class: IndexDtype) -> Result<IndexValue, SelectorError> {
    match (value, class) {
        (IndexValue::Int(v), IndexDtype::Datetime) => Ok(IndexValue::Timestamp(*v)),
        (IndexValue::Timestamp(v), IndexDtype::Integer) => Ok(IndexValue::Int(*v)),
        (v, class) if v.class() == class => Ok(v.clone()),
        (v, class) => ClassMismatchSnafu {
            expected: class,
            found: v.class(),
        }
        .fail(),
    }
}

/// Positions of the partitions a coerced selection can touch.
///
/// The result is a contiguous range into `entries`; an empty range still
/// carries the insertion position of the selection's interval, which
/// mutation protocols use to locate neighbours. Pruning keeps a partition
/// whenever its `[min, max]` intersects the selection interval.
pub fn prune_partitions(entries: &[PartitionStats], rows: &RowSelection) -> Range<usize> {
    let Some((low, high)) = rows.interval() else {
        return 0..0;
    };
    let first = match low {
        Some(low) => entries.partition_point(|e| e.max < *low),
        None => 0,
    };
    let last = match high {
        Some(high) => entries.partition_point(|e| e.min <= *high),
        None => entries.len(),
    };
    first..last.max(first)
}

/// Exact boolean mask of a coerced selection over a partition index view.
pub fn build_mask(view: &IndexView, rows: &RowSelection) -> Result<BooleanArray, SelectorError> {
    if let Some(ints) = view.as_int() {
        let mask = match rows {
            RowSelection::Explicit(values) => {
                let wanted = numeric_set(values, view.class())?;
                BooleanArray::from_iter(ints.values().iter().map(|v| Some(wanted.contains(v))))
            }
            RowSelection::Before(v) => {
                cmp::lt_eq(ints, &int_scalar(numeric(v, view.class())?)).context(MaskSnafu)?
            }
            RowSelection::After(v) => {
                cmp::gt_eq(ints, &int_scalar(numeric(v, view.class())?)).context(MaskSnafu)?
            }
            RowSelection::Between(l, h) => {
                let ge = cmp::gt_eq(ints, &int_scalar(numeric(l, view.class())?))
                    .context(MaskSnafu)?;
                let le = cmp::lt_eq(ints, &int_scalar(numeric(h, view.class())?))
                    .context(MaskSnafu)?;
                boolean::and(&ge, &le).context(MaskSnafu)?
            }
        };
        return Ok(mask);
    }
    let Some(strings) = view.as_str() else {
        // A view is always one of the two shapes.
        return Ok(BooleanArray::from(vec![false; view.len()]));
    };
    let mask = match rows {
        RowSelection::Explicit(values) => {
            let wanted = textual_set(values, view.class())?;
            BooleanArray::from_iter(
                (0..strings.len()).map(|i| Some(wanted.contains(strings.value(i)))),
            )
        }
        RowSelection::Before(v) => {
            cmp::lt_eq(strings, &str_scalar(textual(v, view.class())?)).context(MaskSnafu)?
        }
        RowSelection::After(v) => {
            cmp::gt_eq(strings, &str_scalar(textual(v, view.class())?)).context(MaskSnafu)?
        }
        RowSelection::Between(l, h) => {
            let ge = cmp::gt_eq(strings, &str_scalar(textual(l, view.class())?))
                .context(MaskSnafu)?;
            let le = cmp::lt_eq(strings, &str_scalar(textual(h, view.class())?))
                .context(MaskSnafu)?;
            boolean::and(&ge, &le).context(MaskSnafu)?
        }
    };
    Ok(mask)
}

fn numeric(value: &IndexValue, expected: IndexDtype) -> Result<i64, SelectorError> {
    match value {
        IndexValue::Int(v) | IndexValue::Timestamp(v) => Ok(*v),
        IndexValue::Str(_) => ClassMismatchSnafu {
            expected,
            found: value.class(),
        }
        .fail(),
    }
}

fn textual<'a>(value: &'a IndexValue, expected: IndexDtype) -> Result<&'a str, SelectorError> {
    match value {
        IndexValue::Str(s) => Ok(s),
        _ => ClassMismatchSnafu {
            expected,
            found: value.class(),
        }
        .fail(),
    }
}

fn numeric_set(values: &[IndexValue], expected: IndexDtype) -> Result<HashSet<i64>, SelectorError> {
    values.iter().map(|v| numeric(v, expected)).collect()
}

fn textual_set<'a>(
    values: &'a [IndexValue],
    expected: IndexDtype,
) -> Result<HashSet<&'a str>, SelectorError> {
    values.iter().map(|v| textual(v, expected)).collect()
}

fn int_scalar(value: i64) -> Scalar<Int64Array> {
    Scalar::new(Int64Array::from(vec![value]))
}

fn str_scalar(value: &str) -> Scalar<StringArray> {
    Scalar::new(StringArray::from(vec![value]))
}

/// Which columns of a table to touch.
#[derive(Debug, Clone, PartialEq)]
pub enum ColSelection {
    /// The listed column names.
    Explicit(Vec<String>),
    /// Columns whose name matches a `like` pattern.
    Like(String),
}

impl ColSelection {
    /// Selection of the listed column names.
    pub fn explicit<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Explicit(names.into_iter().map(Into::into).collect())
    }

    /// Selection of columns matching `pattern`.
    pub fn like(pattern: impl Into<String>) -> Self {
        Self::Like(pattern.into())
    }

    /// Resolve the selection against the available column names, preserving
    /// list order for `Explicit` and `available` order for `Like`. Explicit
    /// names are returned as-is; membership is the caller's check.
    pub fn resolve(&self, available: &[String]) -> Result<Vec<String>, SelectorError> {
        match self {
            Self::Explicit(names) => Ok(names.clone()),
            Self::Like(pattern) => filter_like(available, pattern),
        }
    }
}

/// Compile a `like` pattern into an anchored, case-insensitive regex.
///
/// `%` matches any run of characters, `?` exactly one; every other
/// character matches literally. A leading or trailing `%` lifts the
/// corresponding anchor.
pub fn like_regex(pattern: &str) -> Result<Regex, SelectorError> {
    let mut expr = String::with_capacity(pattern.len() + 4);
    if !pattern.starts_with('%') {
        expr.push('^');
    }
    for ch in pattern.chars() {
        match ch {
            '%' => expr.push_str(".*"),
            '?' => expr.push('.'),
            _ => expr.push_str(&regex::escape(ch.encode_utf8(&mut [0; 4]))),
        }
    }
    if !pattern.ends_with('%') {
        expr.push('$');
    }
    RegexBuilder::new(&expr)
        .case_insensitive(true)
        .build()
        .context(BadPatternSnafu { pattern })
}

/// The names matching a `like` pattern, preserving input order.
pub fn filter_like(names: &[String], pattern: &str) -> Result<Vec<String>, SelectorError> {
    let regex = like_regex(pattern)?;
    Ok(names
        .iter()
        .filter(|name| regex.is_match(name))
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::PartitionId;
    use arrow::array::ArrayRef;
    use std::sync::Arc;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn stats(ordinal: u64, min: i64, max: i64) -> PartitionStats {
        PartitionStats {
            id: PartitionId::from_ordinal(ordinal),
            min: IndexValue::Int(min),
            max: IndexValue::Int(max),
            num_rows: (max - min + 1) as u64,
        }
    }

    fn int_view(values: Vec<i64>) -> Result<IndexView, Box<dyn std::error::Error>> {
        let column: ArrayRef = Arc::new(Int64Array::from(values));
        Ok(IndexView::from_array(&column, "id")?)
    }

    fn mask_bits(mask: &BooleanArray) -> Vec<bool> {
        (0..mask.len()).map(|i| mask.value(i)).collect()
    }

    #[test]
    fn prune_keeps_only_intersecting_partitions() {
        let entries = vec![stats(0, 0, 99), stats(1, 100, 199), stats(2, 200, 299)];
        assert_eq!(
            prune_partitions(&entries, &RowSelection::between(150i64, 250i64)),
            1..3
        );
        assert_eq!(
            prune_partitions(&entries, &RowSelection::before(50i64)),
            0..1
        );
        assert_eq!(
            prune_partitions(&entries, &RowSelection::after(250i64)),
            2..3
        );
        assert_eq!(
            prune_partitions(&entries, &RowSelection::explicit([5i64, 250i64])),
            0..3
        );
        // A bound past the stored extremes selects everything on that side.
        assert_eq!(
            prune_partitions(&entries, &RowSelection::before(9_999i64)),
            0..3
        );
        assert_eq!(prune_partitions(&entries, &RowSelection::after(-5i64)), 0..3);
    }

    #[test]
    fn empty_prune_carries_the_insertion_point() {
        let entries = vec![stats(0, 0, 99), stats(1, 200, 299)];
        // Values in the gap between the partitions.
        let range = prune_partitions(&entries, &RowSelection::explicit([120i64, 130i64]));
        assert_eq!(range, 1..1);
        // Values past the end of the table.
        let range = prune_partitions(&entries, &RowSelection::between(500i64, 600i64));
        assert_eq!(range, 2..2);
        // Open-ended selections that miss entirely clamp to an edge.
        assert_eq!(prune_partitions(&entries, &RowSelection::before(-5i64)), 0..0);
        assert_eq!(
            prune_partitions(&entries, &RowSelection::after(500i64)),
            2..2
        );
    }

    #[test]
    fn masks_match_each_selection_form() -> TestResult {
        let view = int_view(vec![10, 20, 30, 40])?;
        let before = build_mask(&view, &RowSelection::before(20i64))?;
        assert_eq!(mask_bits(&before), vec![true, true, false, false]);
        let after = build_mask(&view, &RowSelection::after(30i64))?;
        assert_eq!(mask_bits(&after), vec![false, false, true, true]);
        let between = build_mask(&view, &RowSelection::between(20i64, 30i64))?;
        assert_eq!(mask_bits(&between), vec![false, true, true, false]);
        let explicit = build_mask(&view, &RowSelection::explicit([10i64, 40, 99]))?;
        assert_eq!(mask_bits(&explicit), vec![true, false, false, true]);
        Ok(())
    }

    #[test]
    fn string_masks_compare_lexicographically() -> TestResult {
        let column: ArrayRef = Arc::new(StringArray::from(vec!["ant", "bee", "cow"]));
        let view = IndexView::from_array(&column, "name")?;
        let mask = build_mask(&view, &RowSelection::before("bee"))?;
        assert_eq!(mask_bits(&mask), vec![true, true, false]);
        Ok(())
    }

    #[test]
    fn coercion_rejects_mismatched_classes() {
        let selection = RowSelection::before("abc");
        let err = selection.coerce_to(IndexDtype::Integer).unwrap_err();
        assert!(matches!(err, SelectorError::ClassMismatch { .. }));
    }

    #[test]
    fn coercion_reinterprets_numeric_classes() -> TestResult {
        let coerced = RowSelection::before(100i64).coerce_to(IndexDtype::Datetime)?;
        assert_eq!(coerced, RowSelection::Before(IndexValue::Timestamp(100)));
        Ok(())
    }

    #[test]
    fn inverted_between_is_rejected() {
        let err = RowSelection::between(30i64, 10i64)
            .coerce_to(IndexDtype::Integer)
            .unwrap_err();
        assert!(matches!(err, SelectorError::InvertedRange { .. }));
    }

    #[test]
    fn like_patterns_anchor_and_ignore_case() -> TestResult {
        let names: Vec<String> = ["price", "price_max", "max_price", "volume"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(filter_like(&names, "price%")?, vec!["price", "price_max"]);
        assert_eq!(filter_like(&names, "%price")?, vec!["price", "max_price"]);
        assert_eq!(filter_like(&names, "PRICE")?, vec!["price"]);
        assert_eq!(filter_like(&names, "volum?")?, vec!["volume"]);
        assert_eq!(filter_like(&names, "%")?.len(), 4);
        Ok(())
    }

    #[test]
    fn like_escapes_regex_metacharacters() -> TestResult {
        let names: Vec<String> = ["a.b", "axb"].iter().map(|s| s.to_string()).collect();
        assert_eq!(filter_like(&names, "a.b")?, vec!["a.b"]);
        Ok(())
    }
}
