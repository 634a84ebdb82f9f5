//! Full table write.
//!
//! A write materializes a batch as a fresh set of partition files plus the
//! two metadata documents. Partition ids are assigned on the coarse
//! [`INSERTION_BUFFER`](crate::partition::INSERTION_BUFFER) grid so later
//! inserts can interpolate ids between neighbours without renumbering.
//!
//! Overwriting deletes the old table directory before the new files land,
//! so unlike the incremental protocols a crashed overwrite can lose the
//! previous table. Callers who need the old data keep it under a different
//! name until the write returns.

use arrow::record_batch::RecordBatch;
use snafu::prelude::*;

use crate::frame::Frame;
use crate::metadata::{PartitionIndex, TableMeta};
use crate::partition::{self, PartitionId};
use crate::storage;
use crate::table::error::{EmptyDataSnafu, MetadataSnafu, ShapeSnafu, StorageSnafu, TableAlreadyExistsSnafu};
use crate::table::{split_frame, validate, Table, TableResult, WriteOptions};

impl Table {
    /// Write `batch` as the full content of this table.
    ///
    /// The batch is brought into canonical shape first: the index column
    /// named in `options` (or the synthesized default range) is moved
    /// first and unsorted rows are sorted by it. The rows are then cut
    /// into partitions under the row budget and published together with
    /// fresh metadata documents.
    pub fn write(&self, batch: &RecordBatch, options: &WriteOptions) -> TableResult<()> {
        validate::ensure_partition_sizing(options)?;

        let frame = Frame::normalize(batch, options.index.as_deref(), options.warn_unsorted)
            .context(ShapeSnafu)?;
        ensure!(frame.num_rows() > 0, EmptyDataSnafu { operation: "write" });

        let columns = frame.column_names();
        validate::ensure_unique_columns(&columns)?;
        validate::ensure_no_reserved_columns(&columns)?;
        let view = frame.index_view().context(ShapeSnafu)?;
        validate::ensure_unique_index(&view)?;

        if self.exists() {
            ensure!(
                options.overwrite,
                TableAlreadyExistsSnafu { table: &self.name }
            );
            storage::remove_dir_all(&self.root).context(StorageSnafu)?;
        }

        let rows_per_partition = options.rows_per_partition.unwrap_or_else(|| {
            partition::rows_per_partition(
                frame.num_rows() as u64,
                frame.estimated_byte_size(),
                options.partition_byte_size,
            )
        });

        let parts: Vec<(PartitionId, Frame)> = split_frame(&frame, rows_per_partition)
            .into_iter()
            .enumerate()
            .map(|(n, slice)| (PartitionId::from_ordinal(n as u64), slice))
            .collect();
        let stats = self.stage_partitions(&parts, frame.was_presorted())?;

        let meta = TableMeta {
            num_rows: frame.num_rows() as u64,
            num_columns: frame.num_columns() as u64,
            num_partitions: stats.len() as u64,
            rows_per_partition,
            partition_byte_size: options.partition_byte_size,
            index_name: frame.index_name().to_string(),
            index_column_position: 0,
            index_dtype: frame.index_dtype(),
            has_default_index: frame.has_default_index(),
            columns,
        };
        let store = self.metadata_store();
        store.init().context(MetadataSnafu)?;
        store
            .write_partition_index(&PartitionIndex::new(stats))
            .context(MetadataSnafu)?;
        store.write_table_meta(&meta).context(MetadataSnafu)
    }
}
