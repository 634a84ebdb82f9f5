//! Column edit protocols: rename, reorder, add.
//!
//! All three rewrite partition files in place under their existing ids, so
//! the partition document never changes; only the table document is
//! republished with the edited column list. Renames are applied
//! simultaneously, which keeps swaps legal as long as the final name list
//! is collision free.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use snafu::prelude::*;

use crate::frame::Frame;
use crate::layout::DEFAULT_INDEX_NAME;
use crate::partition::PartitionId;
use crate::table::error::{
    ArrowSnafu, DuplicateColumnsSnafu, IndexValuesMismatchSnafu, MetadataSnafu, MissingColumnSnafu,
    ShapeSnafu,
};
use crate::table::{validate, Table, TableResult};

impl Table {
    /// Rename columns, `(old, new)` per entry. The index column may be
    /// renamed like any other.
    pub fn rename_cols(&self, renames: &[(String, String)]) -> TableResult<()> {
        // 1) Validate the simultaneous rename against the stored names.
        let (mut meta, pindex) = self.load()?;
        if renames.is_empty() {
            return Ok(());
        }
        let olds: Vec<String> = renames.iter().map(|(old, _)| old.clone()).collect();
        let news: Vec<String> = renames.iter().map(|(_, new)| new.clone()).collect();
        validate::ensure_unique_columns(&olds)?;
        validate::ensure_known_columns(&meta.columns, &olds)?;
        validate::ensure_no_reserved_columns(&news)?;
        let mapping: HashMap<&str, &str> = renames
            .iter()
            .map(|(old, new)| (old.as_str(), new.as_str()))
            .collect();
        let renamed: Vec<String> = meta
            .columns
            .iter()
            .map(|name| match mapping.get(name.as_str()) {
                Some(new) => (*new).to_string(),
                None => name.clone(),
            })
            .collect();
        validate::ensure_unique_columns(&renamed)?;

        // 2) Rewrite every partition file with the renamed schema.
        for entry in pindex.entries() {
            let stored = self.read_partition(&meta, entry.id, None)?;
            let fields: Vec<_> = stored
                .schema()
                .fields()
                .iter()
                .map(|field| match mapping.get(field.name().as_str()) {
                    Some(new) => field.as_ref().clone().with_name(*new),
                    None => field.as_ref().clone(),
                })
                .collect();
            let batch = RecordBatch::try_new(
                Arc::new(Schema::new(fields)),
                stored.batch().columns().to_vec(),
            )
            .context(ArrowSnafu {
                stage: "renaming partition columns",
            })?;
            let frame = Frame::from_stored(batch, meta.index_dtype, meta.has_default_index);
            self.rewrite_partition(entry.id, &frame, true)?;
        }

        // 3) Publish the renamed table document.
        if let Some(new) = mapping.get(meta.index_name.as_str()) {
            meta.index_name = (*new).to_string();
            meta.has_default_index = meta.index_name == DEFAULT_INDEX_NAME;
        }
        meta.columns = renamed;
        self.metadata_store()
            .write_table_meta(&meta)
            .context(MetadataSnafu)
    }

    /// Reorder the data columns into `order`. The list must name every
    /// stored data column exactly once; the index always stays first.
    pub fn reorder_cols(&self, order: &[String]) -> TableResult<()> {
        // 1) The new order must be a permutation of the stored data
        //    columns.
        let (mut meta, pindex) = self.load()?;
        validate::ensure_unique_columns(order)?;
        validate::ensure_same_column_set(meta.data_columns(), order)?;
        let mut positions = Vec::with_capacity(meta.columns.len());
        positions.push(0);
        for name in order {
            let position = meta
                .position_of(name)
                .context(MissingColumnSnafu { column: name })?;
            positions.push(position);
        }

        // 2) Rewrite every partition file in the new column order.
        for entry in pindex.entries() {
            let stored = self.read_partition(&meta, entry.id, None)?;
            let batch = stored.batch().project(&positions).context(ArrowSnafu {
                stage: "reordering partition columns",
            })?;
            let frame = Frame::from_stored(batch, meta.index_dtype, meta.has_default_index);
            self.rewrite_partition(entry.id, &frame, true)?;
        }

        // 3) Publish the reordered table document.
        let mut columns = Vec::with_capacity(order.len() + 1);
        columns.push(meta.index_name.clone());
        columns.extend(order.iter().cloned());
        meta.columns = columns;
        self.metadata_store()
            .write_table_meta(&meta)
            .context(MetadataSnafu)
    }

    /// Add the data columns of `batch` to the table.
    ///
    /// The batch must carry the index column with exactly the stored index
    /// values, so every new value lands on a definite row. `position` is
    /// where the new columns go within the data columns, clamped to the
    /// end; `None` appends them.
    pub fn add_cols(&self, batch: &RecordBatch, position: Option<usize>) -> TableResult<()> {
        // 1) Canonicalize and validate the addition against the stored
        //    schema and index.
        let (mut meta, pindex) = self.load()?;
        let incoming =
            Frame::normalize(batch, Some(&meta.index_name), true).context(ShapeSnafu)?;
        let added = incoming.data_column_names();
        if added.is_empty() {
            return Ok(());
        }
        validate::ensure_unique_columns(&incoming.column_names())?;
        validate::ensure_no_reserved_columns(&added)?;
        for name in &added {
            ensure!(
                !meta.columns.contains(name),
                DuplicateColumnsSnafu { column: name }
            );
        }
        validate::ensure_index_class(meta.index_dtype, incoming.index_dtype())?;
        let incoming_view = incoming.index_view().context(ShapeSnafu)?;
        validate::ensure_unique_index(&incoming_view)?;
        ensure!(
            incoming.num_rows() as u64 == meta.num_rows,
            IndexValuesMismatchSnafu
        );

        // 2) Walk the partitions once to check the index alignment and
        //    assemble the spliced batches; nothing is rewritten until every
        //    partition has passed.
        let data_count = meta.data_columns().len();
        let insert_at = 1 + position.unwrap_or(data_count).min(data_count);
        let mut offset = 0usize;
        let mut spliced: Vec<(PartitionId, Frame)> = Vec::with_capacity(pindex.len());
        for entry in pindex.entries() {
            let stored = self.read_partition(&meta, entry.id, None)?;
            let rows = stored.num_rows();
            let slice = incoming.slice_rows(offset..offset + rows);
            offset += rows;
            let stored_view = stored.index_view().context(ShapeSnafu)?;
            let slice_view = slice.index_view().context(ShapeSnafu)?;
            ensure!(
                stored_view.array().to_data() == slice_view.array().to_data(),
                IndexValuesMismatchSnafu
            );

            let mut fields: Vec<_> = stored.schema().fields().iter().cloned().collect();
            let mut columns = stored.batch().columns().to_vec();
            let slice_schema = slice.schema();
            let new_fields = slice_schema.fields().iter().skip(1).cloned();
            let new_columns = slice.batch().columns().iter().skip(1).cloned();
            fields.splice(insert_at..insert_at, new_fields);
            columns.splice(insert_at..insert_at, new_columns);
            let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).context(
                ArrowSnafu {
                    stage: "splicing new columns",
                },
            )?;
            let frame = Frame::from_stored(batch, meta.index_dtype, meta.has_default_index);
            spliced.push((entry.id, frame));
        }

        // 3) Rewrite the partition files, then publish the widened table
        //    document.
        for (id, frame) in &spliced {
            self.rewrite_partition(*id, frame, true)?;
        }
        meta.columns.splice(insert_at..insert_at, added);
        meta.num_columns = meta.columns.len() as u64;
        self.metadata_store()
            .write_table_meta(&meta)
            .context(MetadataSnafu)
    }
}
