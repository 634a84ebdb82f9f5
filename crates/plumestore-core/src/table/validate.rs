//! Shared precondition checks.
//!
//! Every protocol runs its full validator pass before touching the
//! filesystem, so a rejected call leaves the table byte-identical on disk.
//! The checks here are the ones several protocols share; anything specific
//! to a single protocol stays in that protocol's module.

use std::collections::HashSet;

use snafu::prelude::*;

use crate::frame::IndexView;
use crate::layout::RESERVED_COLUMN_NAME;
use crate::metadata::IndexDtype;
use crate::table::error::{
    ColumnsMismatchSnafu, DuplicateColumnsSnafu, DuplicateIndexValuesSnafu,
    IndexDtypeMismatchSnafu, InvalidPartitionSizeSnafu, MissingColumnSnafu, ReservedColumnNameSnafu,
};
use crate::table::{TableResult, WriteOptions};

/// Reject partition sizing that cannot produce at least one row per file.
pub(crate) fn ensure_partition_sizing(options: &WriteOptions) -> TableResult<()> {
    ensure!(options.partition_byte_size > 0, InvalidPartitionSizeSnafu);
    ensure!(
        options.rows_per_partition != Some(0),
        InvalidPartitionSizeSnafu
    );
    Ok(())
}

/// Reject a column list that contains the same name twice.
pub(crate) fn ensure_unique_columns(names: &[String]) -> TableResult<()> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        ensure!(seen.insert(name.as_str()), DuplicateColumnsSnafu {
            column: name
        });
    }
    Ok(())
}

/// Reject column names the selector syntax reserves.
pub(crate) fn ensure_no_reserved_columns(names: &[String]) -> TableResult<()> {
    for name in names {
        ensure!(
            !name.eq_ignore_ascii_case(RESERVED_COLUMN_NAME),
            ReservedColumnNameSnafu { column: name }
        );
    }
    Ok(())
}

/// Reject an index that carries the same value twice. The view must be in
/// ascending order.
pub(crate) fn ensure_unique_index(view: &IndexView) -> TableResult<()> {
    if let Some(value) = view.first_duplicate() {
        return DuplicateIndexValuesSnafu { value }.fail();
    }
    Ok(())
}

/// Reject data whose index class differs from the stored index.
pub(crate) fn ensure_index_class(expected: IndexDtype, found: IndexDtype) -> TableResult<()> {
    ensure!(expected == found, IndexDtypeMismatchSnafu { expected, found });
    Ok(())
}

/// Reject data whose column set differs from the stored one. Order is not
/// compared; protocols realign column order separately.
pub(crate) fn ensure_same_column_set(stored: &[String], incoming: &[String]) -> TableResult<()> {
    let mut expected: Vec<&str> = stored.iter().map(String::as_str).collect();
    let mut found: Vec<&str> = incoming.iter().map(String::as_str).collect();
    expected.sort_unstable();
    found.sort_unstable();
    ensure!(
        expected == found,
        ColumnsMismatchSnafu {
            expected: stored.to_vec(),
            found: incoming.to_vec(),
        }
    );
    Ok(())
}

/// Reject references to columns the table does not store.
pub(crate) fn ensure_known_columns(stored: &[String], requested: &[String]) -> TableResult<()> {
    for name in requested {
        ensure!(
            stored.iter().any(|c| c == name),
            MissingColumnSnafu { column: name }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::error::TableError;
    use arrow::array::{ArrayRef, Int64Array};
    use std::sync::Arc;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn partition_sizing_rejects_zero() {
        let mut options = WriteOptions::default();
        options.partition_byte_size = 0;
        assert!(matches!(
            ensure_partition_sizing(&options).unwrap_err(),
            TableError::InvalidPartitionSize { .. }
        ));

        let options = WriteOptions::default().with_rows_per_partition(0);
        assert!(matches!(
            ensure_partition_sizing(&options).unwrap_err(),
            TableError::InvalidPartitionSize { .. }
        ));

        assert!(ensure_partition_sizing(&WriteOptions::default()).is_ok());
    }

    #[test]
    fn duplicate_column_names_are_rejected() {
        let err = ensure_unique_columns(&names(&["a", "b", "a"])).unwrap_err();
        match err {
            TableError::DuplicateColumns { column, .. } => assert_eq!(column, "a"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ensure_unique_columns(&names(&["a", "b"])).is_ok());
    }

    #[test]
    fn reserved_name_is_rejected_case_insensitively() {
        for bad in ["like", "LIKE", "Like"] {
            let err = ensure_no_reserved_columns(&names(&["a", bad])).unwrap_err();
            assert!(matches!(err, TableError::ReservedColumnName { .. }), "{bad}");
        }
        assert!(ensure_no_reserved_columns(&names(&["alike", "liked"])).is_ok());
    }

    #[test]
    fn duplicate_index_values_are_rejected() {
        let column: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 2, 3]));
        let view = IndexView::from_array(&column, "id").expect("valid view");
        assert!(matches!(
            ensure_unique_index(&view).unwrap_err(),
            TableError::DuplicateIndexValues { .. }
        ));
    }

    #[test]
    fn column_set_comparison_ignores_order() {
        assert!(ensure_same_column_set(&names(&["a", "b"]), &names(&["b", "a"])).is_ok());
        assert!(matches!(
            ensure_same_column_set(&names(&["a", "b"]), &names(&["a", "c"])).unwrap_err(),
            TableError::ColumnsMismatch { .. }
        ));
    }

    #[test]
    fn unknown_column_reference_is_rejected() {
        let err = ensure_known_columns(&names(&["a", "b"]), &names(&["c"])).unwrap_err();
        match err {
            TableError::MissingColumn { column, .. } => assert_eq!(column, "c"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
