//! Insert protocol.
//!
//! Inserted rows may land anywhere in the index order. The partitions
//! their values touch are decoded, merged with the new rows, re-sorted,
//! and re-split; the replacement files take ids interpolated into the gap
//! after the replaced run, so everything outside the run keeps its id and
//! its file.

use arrow::record_batch::RecordBatch;
use snafu::prelude::*;

use crate::frame::Frame;
use crate::metadata::IndexValue;
use crate::partition::{self, PartitionId};
use crate::selector::{self, RowSelection};
use crate::table::error::{
    EmptyDataSnafu, PartitionIdsExhaustedSnafu, RowsAlreadyStoredSnafu, ShapeSnafu,
};
use crate::table::{split_frame, validate, Table, TableResult};

impl Table {
    /// Insert `batch` into the stored index order.
    ///
    /// The batch must carry the index column (the insert position is the
    /// value, never an offset) and its index values must not be stored
    /// yet. Appending through `insert` works but pays for a decode of the
    /// tail partition's whole row range; callers extending the table
    /// should prefer [`Table::append`].
    pub fn insert(&self, batch: &RecordBatch) -> TableResult<()> {
        // 1) Canonicalize and validate against the stored schema.
        let (meta, pindex) = self.load()?;
        let incoming = Frame::normalize(batch, Some(&meta.index_name), true).context(ShapeSnafu)?;
        ensure!(
            incoming.num_rows() > 0,
            EmptyDataSnafu {
                operation: "insert"
            }
        );
        validate::ensure_same_column_set(&meta.columns, &incoming.column_names())?;
        let incoming_view = incoming.index_view().context(ShapeSnafu)?;
        validate::ensure_index_class(meta.index_dtype, incoming_view.class())?;
        validate::ensure_unique_index(&incoming_view)?;

        // 2) Locate the run of partitions the values land in. Values that
        //    fall wholly between two partitions merge into the predecessor,
        //    keeping the spilled rows next to their closest neighbours.
        let values: Vec<IndexValue> = (0..incoming_view.len())
            .map(|i| incoming_view.value(i))
            .collect();
        let selection = RowSelection::Explicit(values);
        let entries = pindex.entries();
        let mut replaced = selector::prune_partitions(entries, &selection);
        if replaced.is_empty() && !entries.is_empty() {
            let neighbour = replaced.start.saturating_sub(1).min(entries.len() - 1);
            replaced = neighbour..neighbour + 1;
        }

        // 3) Decode the run, reject values already stored, and merge.
        let stored =
            Frame::concat(&self.read_run(&meta, &entries[replaced.clone()])?).context(ShapeSnafu)?;
        let stored_view = stored.index_view().context(ShapeSnafu)?;
        for i in 0..incoming_view.len() {
            let value = incoming_view.value(i);
            if stored_view.position_exact(&value).is_some() {
                return RowsAlreadyStoredSnafu { value }.fail();
            }
        }
        let presorted = incoming.was_presorted();
        let aligned = incoming
            .align_to_schema(&stored.schema())
            .context(ShapeSnafu)?;
        let merged = Frame::concat(&[stored, aligned])
            .context(ShapeSnafu)?
            .sort_by_index()
            .context(ShapeSnafu)?;

        // 4) Re-split and stage under ids interpolated after the run. The
        //    concat in step 3 fails on a partition-less table, so the run
        //    is non-empty here.
        let slices = split_frame(&merged, meta.rows_per_partition);
        let low = entries[replaced.end - 1].id;
        let high = entries.get(replaced.end).map(|e| e.id);
        let ids = partition::interpolate(low, high, slices.len()).context(
            PartitionIdsExhaustedSnafu {
                requested: slices.len(),
            },
        )?;
        let parts: Vec<(PartitionId, Frame)> = ids.into_iter().zip(slices).collect();
        let stats = self.stage_partitions(&parts, presorted)?;

        // 5) Publish and clean up the superseded run.
        self.commit_replacement(meta, pindex, replaced, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use crate::metadata::IndexValue;
    use crate::table::{ErrorKind, TableError, WriteOptions};

    #[test]
    fn insert_between_partitions_interpolates_an_id() -> TestResult {
        // Index values 0, 10, .., 990 over four partitions.
        let (_dir, table) = empty_table("between")?;
        table.write(
            &int_batch_of(&(0..100).map(|i| i * 10).collect::<Vec<_>>()),
            &WriteOptions::default()
                .with_index("id")
                .with_rows_per_partition(25),
        )?;
        let before = table.partition_index()?.ids();

        // 243..247 fall wholly between the first and second partition.
        table.insert(&int_batch_of(&[243, 245, 247]))?;

        let (meta, index) = table.load()?;
        assert_eq!(meta.num_rows, 103);
        assert!(index.is_contiguous());

        // Only the first partition was replaced; its successors kept their
        // ids, and the replacement id sits between the old neighbours.
        let after = index.ids();
        assert_eq!(after.len(), 4);
        assert_eq!(after[1..], before[1..]);
        assert!(after[0] > before[0] && after[0] < before[1]);

        let rows = index_column(&table.read()?);
        assert!(rows.windows(2).all(|w| w[0] < w[1]));
        assert!(rows.contains(&245));
        Ok(())
    }

    #[test]
    fn insert_inside_a_partition_replaces_it() -> TestResult {
        let (_dir, table) = empty_table("inside")?;
        table.write(
            &int_batch_of(&[0, 2, 4, 6, 8, 10]),
            &WriteOptions::default()
                .with_index("id")
                .with_rows_per_partition(3),
        )?;

        table.insert(&int_batch_of(&[3, 5]))?;
        assert_eq!(index_column(&table.read()?), vec![0, 2, 3, 4, 5, 6, 8, 10]);
        assert!(table.partition_index()?.is_contiguous());
        Ok(())
    }

    #[test]
    fn insert_before_the_first_partition() -> TestResult {
        let (_dir, table) = written_table("head", 10..20, 5)?;
        table.insert(&int_batch(0..3))?;
        assert_eq!(
            index_column(&table.read()?),
            vec![0, 1, 2, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19]
        );
        Ok(())
    }

    #[test]
    fn insert_past_the_tail() -> TestResult {
        let (_dir, table) = written_table("past", 0..10, 5)?;
        table.insert(&int_batch(100..103))?;
        let rows = index_column(&table.read()?);
        assert_eq!(rows.len(), 13);
        assert_eq!(rows[10..], [100, 101, 102]);
        assert!(table.partition_index()?.is_contiguous());
        Ok(())
    }

    #[test]
    fn stored_values_are_rejected() -> TestResult {
        let (_dir, table) = written_table("collision", 0..100, 10)?;
        let err = table.insert(&int_batch_of(&[250, 37])).unwrap_err();
        match err {
            TableError::RowsAlreadyStored { value, .. } => {
                assert_eq!(value, IndexValue::Int(37));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The failed insert left nothing behind.
        assert_eq!(table.num_rows()?, 100);
        assert_eq!(index_column(&table.read()?).len(), 100);
        Ok(())
    }

    #[test]
    fn index_class_must_match() -> TestResult {
        let (_dir, table) = written_table("class", 0..10, 5)?;
        let err = table.insert(&utf8_id_batch(&["x", "y"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        Ok(())
    }
}
