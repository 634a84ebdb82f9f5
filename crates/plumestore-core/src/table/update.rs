//! Update protocol.
//!
//! An update overlays new values onto stored rows matched by index value.
//! The index itself is never updated (dropping and re-inserting rows is
//! the way to move them), so partition boundaries, row counts, and both
//! metadata documents stay exactly as they are; each affected partition
//! file is rewritten in place under its existing id.

use std::ops::Range;

use arrow::array::UInt32Array;
use arrow::compute;
use arrow::record_batch::RecordBatch;
use snafu::prelude::*;

use crate::frame::{self, Frame};
use crate::metadata::{IndexValue, PartitionStats};
use crate::partition::PartitionId;
use crate::selector::{self, RowSelection};
use crate::table::error::{ArrowSnafu, EmptyDataSnafu, MissingRowsSnafu, ShapeSnafu};
use crate::table::{validate, Table, TableResult};

impl Table {
    /// Overlay `batch` onto the stored rows with the same index values.
    ///
    /// The batch carries the index column plus any subset of the data
    /// columns; every index value must already be stored. Values are cast
    /// to the stored column dtypes, strictly.
    pub fn update(&self, batch: &RecordBatch) -> TableResult<()> {
        // 1) Canonicalize and validate the updated columns and rows.
        let (meta, pindex) = self.load()?;
        let incoming = Frame::normalize(batch, Some(&meta.index_name), true).context(ShapeSnafu)?;
        ensure!(
            incoming.num_rows() > 0,
            EmptyDataSnafu {
                operation: "update"
            }
        );
        validate::ensure_unique_columns(&incoming.column_names())?;
        validate::ensure_known_columns(meta.data_columns(), &incoming.data_column_names())?;
        let incoming_view = incoming.index_view().context(ShapeSnafu)?;
        validate::ensure_index_class(meta.index_dtype, incoming_view.class())?;
        validate::ensure_unique_index(&incoming_view)?;

        // 2) Pair each affected partition with its slice of the updated
        //    rows. The slices tile the update frame in order; a row left
        //    behind by the walk matches no partition's range and fails.
        let values: Vec<IndexValue> = (0..incoming_view.len())
            .map(|i| incoming_view.value(i))
            .collect();
        let touched = selector::prune_partitions(pindex.entries(), &RowSelection::Explicit(values));
        let mut jobs: Vec<(&PartitionStats, Range<usize>)> = Vec::new();
        let mut cursor = 0;
        for entry in &pindex.entries()[touched] {
            let lo = incoming_view.lower_bound(&entry.min);
            let hi = incoming_view.upper_bound(&entry.max);
            if lo > cursor {
                return MissingRowsSnafu {
                    value: incoming_view.value(cursor),
                }
                .fail();
            }
            if lo < hi {
                jobs.push((entry, lo..hi));
                cursor = hi;
            }
        }
        if cursor < incoming_view.len() {
            return MissingRowsSnafu {
                value: incoming_view.value(cursor),
            }
            .fail();
        }

        // 3) Build every overlaid partition in memory first; a row or cast
        //    rejected here leaves the files untouched.
        let mut staged: Vec<(PartitionId, Frame)> = Vec::with_capacity(jobs.len());
        for (entry, rows) in jobs {
            let stored = self.read_partition(&meta, entry.id, None)?;
            let stored_view = stored.index_view().context(ShapeSnafu)?;
            let mut positions = Vec::with_capacity(rows.len());
            for i in rows.clone() {
                let value = incoming_view.value(i);
                let Some(position) = stored_view.position_exact(&value) else {
                    return MissingRowsSnafu { value }.fail();
                };
                positions.push(position);
            }
            let overlaid = overlay_partition(&stored, &incoming, rows, &positions)?;
            debug_assert!(
                bounds_match(&overlaid, entry),
                "update must not move partition boundaries"
            );
            staged.push((entry.id, overlaid));
        }

        // 4) Rewrite the affected files under their existing ids.
        for (id, frame) in &staged {
            self.rewrite_partition(*id, frame, true)?;
        }
        Ok(())
    }
}

/// `stored` with the rows at `positions` overlaid by the update rows in
/// `rows`, column by column. Columns absent from the update pass through.
fn overlay_partition(
    stored: &Frame,
    updates: &Frame,
    rows: Range<usize>,
    positions: &[usize],
) -> TableResult<Frame> {
    let patch_base = stored.num_rows() as u32;
    let mut mapping: Vec<u32> = (0..patch_base).collect();
    for (offset, &position) in positions.iter().enumerate() {
        mapping[position] = patch_base + offset as u32;
    }
    let take_indices = UInt32Array::from(mapping);

    let schema = stored.schema();
    let mut columns = Vec::with_capacity(schema.fields().len());
    columns.push(stored.batch().column(0).clone());
    for (i, field) in schema.fields().iter().enumerate().skip(1) {
        let column = stored.batch().column(i);
        let Some((patch_position, _)) = updates.batch().schema_ref().column_with_name(field.name())
        else {
            columns.push(column.clone());
            continue;
        };
        let patch = updates
            .batch()
            .column(patch_position)
            .slice(rows.start, rows.len());
        let patch = frame::strict_cast(&patch, column.data_type())
            .context(frame::UncastableSnafu {
                column: field.name(),
                from: patch.data_type().clone(),
                to: column.data_type().clone(),
            })
            .context(ShapeSnafu)?;
        let combined = compute::concat(&[column.as_ref(), patch.as_ref()]).context(ArrowSnafu {
            stage: "overlaying updated values",
        })?;
        let overlaid = compute::take(combined.as_ref(), &take_indices, None).context(ArrowSnafu {
            stage: "overlaying updated values",
        })?;
        columns.push(overlaid);
    }
    let batch = RecordBatch::try_new(schema, columns).context(ArrowSnafu {
        stage: "assembling the overlaid partition",
    })?;
    Ok(Frame::from_stored(
        batch,
        stored.index_dtype(),
        stored.has_default_index(),
    ))
}

/// Whether the overlaid partition still spans the recorded row range.
fn bounds_match(frame: &Frame, entry: &PartitionStats) -> bool {
    match frame.bounds() {
        Ok(Some((min, max))) => min == entry.min && max == entry.max,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use crate::metadata::IndexValue;
    use crate::selector::RowSelection;
    use crate::table::{ErrorKind, TableError};

    #[test]
    fn update_overlays_a_column_subset() -> TestResult {
        let (_dir, table) = written_table("subset", 0..100, 10)?;
        let before = table.partition_index()?;

        table.update(&named_batch(&["id", "qty"], &[vec![5, 37, 81], vec![0, 0, 0]]))?;

        let batch = table.select(Some(&RowSelection::explicit([5, 37, 81])), None)?;
        assert_eq!(int_column(&batch, "qty"), vec![0, 0, 0]);
        // Untouched columns and rows keep their values.
        assert_eq!(
            float_column(&batch, "price"),
            vec![0.5, 3.7, 8.1],
        );
        assert_eq!(int_column(&table.read()?, "qty")[6], 12);

        // Same ids, same boundaries, same documents.
        let after = table.partition_index()?;
        assert_eq!(after.ids(), before.ids());
        assert_eq!(after.entries(), before.entries());
        Ok(())
    }

    #[test]
    fn update_rows_must_exist() -> TestResult {
        let (_dir, table) = written_table("missing", 0..10, 5)?;
        let err = table
            .update(&named_batch(&["id", "qty"], &[vec![3, 42], vec![0, 0]]))
            .unwrap_err();
        match err {
            TableError::MissingRows { value, .. } => assert_eq!(value, IndexValue::Int(42)),
            other => panic!("unexpected error: {other:?}"),
        }
        // Validation happens before any rewrite.
        assert_eq!(int_column(&table.read()?, "qty")[3], 6);
        Ok(())
    }

    #[test]
    fn update_columns_must_exist() -> TestResult {
        let (_dir, table) = written_table("cols", 0..10, 5)?;
        let err = table
            .update(&named_batch(&["id", "volume"], &[vec![3], vec![9]]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        Ok(())
    }

    #[test]
    fn update_is_idempotent() -> TestResult {
        let (_dir, table) = written_table("idempotent", 0..50, 10)?;
        let patch = named_batch(&["id", "qty"], &[vec![12, 13], vec![900, 901]]);
        table.update(&patch)?;
        let once = table.read()?;
        table.update(&patch)?;
        assert_eq!(table.read()?, once);
        Ok(())
    }

    #[test]
    fn update_spanning_partitions_rewrites_each_in_place() -> TestResult {
        let (_dir, table) = written_table("spanning", 0..100, 10)?;
        table.update(&named_batch(
            &["id", "qty"],
            &[vec![5, 50, 95], vec![1, 2, 3]],
        ))?;
        let batch = table.select(Some(&RowSelection::explicit([5, 50, 95])), None)?;
        assert_eq!(int_column(&batch, "qty"), vec![1, 2, 3]);
        assert_eq!(table.partition_index()?.len(), 10);
        Ok(())
    }
}
