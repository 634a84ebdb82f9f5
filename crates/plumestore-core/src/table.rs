//! Partitioned table storage.
//!
//! A table is a directory of immutable Arrow IPC partition files plus two
//! JSON metadata documents (table scope and partition scope). Rows are kept
//! sorted by one index column and split across partitions whose id order
//! matches the index order, so concatenating partitions in id order always
//! reproduces the sorted table.
//!
//! Mutation protocols share one discipline: validate in memory first, write
//! new partition files, publish the partition document and then the table
//! document, and delete superseded files last. Readers resolve partitions
//! solely through the metadata, so a file orphaned by an interrupted
//! mutation is invisible; the next full write clears it out. Rewrites that
//! keep row ranges intact (updates, column edits) replace each partition
//! file atomically under its existing id instead.

use std::ops::Range;
use std::path::{Path, PathBuf};

use log::warn;
use snafu::prelude::*;

use crate::frame::{self, Frame};
use crate::layout;
use crate::metadata::{
    IndexDtype, MetadataStore, PartitionIndex, PartitionStats, TableMeta,
};
use crate::partition::{self, PartitionId};
use crate::storage;

pub mod error;

mod append;
mod astype;
mod columns;
mod drop;
mod insert;
mod read;
mod update;
mod validate;
mod write;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::{ErrorKind, TableError, TableResult};

use error::{EmptyDataSnafu, MetadataSnafu, ShapeSnafu, StorageSnafu, TableNotFoundSnafu};

/// Tuning knobs for a full table write.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Column to index by; `None` synthesizes the default range index.
    pub index: Option<String>,
    /// Target partition size in bytes the row budget is derived from.
    pub partition_byte_size: u64,
    /// Explicit row budget per partition, overriding the byte-size
    /// derivation.
    pub rows_per_partition: Option<u64>,
    /// Replace an existing table instead of failing.
    pub overwrite: bool,
    /// Log a warning when unsorted input forces an implicit sort.
    pub warn_unsorted: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            index: None,
            partition_byte_size: layout::DEFAULT_PARTITION_BYTE_SIZE,
            rows_per_partition: None,
            overwrite: false,
            warn_unsorted: true,
        }
    }
}

impl WriteOptions {
    /// Index the table by `column` instead of the default range.
    pub fn with_index(mut self, column: impl Into<String>) -> Self {
        self.index = Some(column.into());
        self
    }

    /// Derive the row budget from `bytes` per partition.
    pub fn with_partition_byte_size(mut self, bytes: u64) -> Self {
        self.partition_byte_size = bytes;
        self
    }

    /// Fix the row budget per partition directly.
    pub fn with_rows_per_partition(mut self, rows: u64) -> Self {
        self.rows_per_partition = Some(rows);
        self
    }

    /// Replace an existing table instead of failing.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Control the warning for implicit sorting of unsorted input.
    pub fn with_warn_unsorted(mut self, warn: bool) -> Self {
        self.warn_unsorted = warn;
        self
    }
}

/// Handle to one table in a store.
///
/// Handles are cheap and stateless: every operation loads what it needs
/// from the metadata documents, so a handle never goes stale when another
/// handle (or process) mutates the table between calls.
#[derive(Debug, Clone)]
pub struct Table {
    root: PathBuf,
    name: String,
}

impl Table {
    /// Handle for the table rooted at `root`. Does not touch the
    /// filesystem; a full write creates the table on disk.
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }

    /// The table's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The table's directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Whether the table exists on disk.
    pub fn exists(&self) -> bool {
        self.metadata_store().exists()
    }

    /// The table-scope metadata document.
    pub fn meta(&self) -> TableResult<TableMeta> {
        self.require_exists()?;
        self.metadata_store().read_table_meta().context(MetadataSnafu)
    }

    /// The partition-scope metadata document.
    pub fn partition_index(&self) -> TableResult<PartitionIndex> {
        self.require_exists()?;
        self.metadata_store()
            .read_partition_index()
            .context(MetadataSnafu)
    }

    /// All column names in stored order, index first.
    pub fn columns(&self) -> TableResult<Vec<String>> {
        Ok(self.meta()?.columns)
    }

    /// Total number of stored rows.
    pub fn num_rows(&self) -> TableResult<u64> {
        Ok(self.meta()?.num_rows)
    }

    /// Name of the index column.
    pub fn index_name(&self) -> TableResult<String> {
        Ok(self.meta()?.index_name)
    }

    /// Comparison class of the index column.
    pub fn index_dtype(&self) -> TableResult<IndexDtype> {
        Ok(self.meta()?.index_dtype)
    }

    pub(crate) fn metadata_store(&self) -> MetadataStore {
        MetadataStore::new(&self.root)
    }

    pub(crate) fn require_exists(&self) -> TableResult<()> {
        ensure!(self.exists(), TableNotFoundSnafu { table: &self.name });
        Ok(())
    }

    /// Load both metadata documents.
    pub(crate) fn load(&self) -> TableResult<(TableMeta, PartitionIndex)> {
        self.require_exists()?;
        let store = self.metadata_store();
        let meta = store.read_table_meta().context(MetadataSnafu)?;
        let index = store.read_partition_index().context(MetadataSnafu)?;
        Ok((meta, index))
    }

    /// Decode one partition file, optionally projecting columns.
    ///
    /// The file is memory-mapped only for the duration of the decode, so no
    /// mapping outlives the call to pin the file against later deletion.
    pub(crate) fn read_partition(
        &self,
        meta: &TableMeta,
        id: PartitionId,
        projection: Option<Vec<usize>>,
    ) -> TableResult<Frame> {
        let path = layout::partition_file_path(&self.root, id);
        let map = storage::mmap_readonly(&path).context(StorageSnafu)?;
        let batch = frame::decode_partition(&map, projection).context(ShapeSnafu)?;
        Ok(Frame::from_stored(
            batch,
            meta.index_dtype,
            meta.has_default_index,
        ))
    }

    /// Decode a run of partitions in full.
    pub(crate) fn read_run(
        &self,
        meta: &TableMeta,
        entries: &[PartitionStats],
    ) -> TableResult<Vec<Frame>> {
        entries
            .iter()
            .map(|e| self.read_partition(meta, e.id, None))
            .collect()
    }

    /// Encode and atomically write one partition file per `(id, slice)`
    /// pair, returning the statistics entries for the new files.
    pub(crate) fn stage_partitions(
        &self,
        parts: &[(PartitionId, Frame)],
        presorted: bool,
    ) -> TableResult<Vec<PartitionStats>> {
        let mut stats = Vec::with_capacity(parts.len());
        for (id, slice) in parts {
            let Some((min, max)) = slice.bounds().context(ShapeSnafu)? else {
                return EmptyDataSnafu {
                    operation: "partition staging",
                }
                .fail();
            };
            let bytes = frame::encode_partition(slice.batch(), presorted).context(ShapeSnafu)?;
            storage::write_atomic(&layout::partition_file_path(&self.root, *id), &bytes)
                .context(StorageSnafu)?;
            stats.push(PartitionStats {
                id: *id,
                min,
                max,
                num_rows: slice.num_rows() as u64,
            });
        }
        Ok(stats)
    }

    /// Atomically replace one partition file under its existing id.
    pub(crate) fn rewrite_partition(
        &self,
        id: PartitionId,
        frame: &Frame,
        presorted: bool,
    ) -> TableResult<()> {
        let bytes = frame::encode_partition(frame.batch(), presorted).context(ShapeSnafu)?;
        storage::write_atomic(&layout::partition_file_path(&self.root, id), &bytes)
            .context(StorageSnafu)
    }

    /// Publish a mutation that replaced the partitions in `replaced` with
    /// `replacement`: splice the partition document, refresh the row and
    /// partition counts, write both documents, then delete the superseded
    /// files.
    ///
    /// Replacement ids are always fresh, so the new files exist before the
    /// documents flip and the old files only disappear afterwards. An
    /// interruption leaves orphans, never holes.
    pub(crate) fn commit_replacement(
        &self,
        mut meta: TableMeta,
        mut index: PartitionIndex,
        replaced: Range<usize>,
        replacement: Vec<PartitionStats>,
    ) -> TableResult<()> {
        let superseded: Vec<PartitionId> = index.entries()[replaced.clone()]
            .iter()
            .map(|e| e.id)
            .collect();
        index.splice(replaced, replacement);
        debug_assert!(index.is_contiguous(), "partition boundaries must stay ordered");
        meta.num_rows = index.total_rows();
        meta.num_partitions = index.len() as u64;
        let store = self.metadata_store();
        store.write_partition_index(&index).context(MetadataSnafu)?;
        store.write_table_meta(&meta).context(MetadataSnafu)?;
        for id in superseded {
            let path = layout::partition_file_path(&self.root, id);
            match storage::remove_file(&path) {
                Ok(()) => {}
                // A file an earlier interrupted cleanup already removed.
                Err(storage::StorageError::NotFound { .. }) => {
                    warn!("superseded partition file {} was already gone", path.display());
                }
                Err(source) => return Err(TableError::Storage { source }),
            }
        }
        Ok(())
    }
}

/// Slice `frame` into partition-sized pieces under the row budget.
pub(crate) fn split_frame(frame: &Frame, rows_per_partition: u64) -> Vec<Frame> {
    partition::split_ranges(frame.num_rows(), rows_per_partition as usize)
        .into_iter()
        .map(|range| frame.slice_rows(range))
        .collect()
}
