//! Column recast protocol.
//!
//! Data column recasts rewrite every partition file in place and leave
//! both metadata documents alone. Recasting the index can change the
//! comparison order (integers compare numerically, strings compare
//! lexicographically), so the protocol re-checks the sort invariant under
//! the new class and falls back to a whole-table re-sort and re-split
//! when the stored layout no longer satisfies it.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::compute::kernels::aggregate;
use arrow::datatypes::{DataType, Schema};
use snafu::prelude::*;

use crate::frame::{self, Frame, IndexView};
use crate::metadata::{IndexDtype, IndexValue, PartitionIndex, PartitionStats};
use crate::partition::{self, PartitionId};
use crate::table::error::{MetadataSnafu, ShapeSnafu};
use crate::table::{split_frame, validate, Table, TableResult};

impl Table {
    /// Cast the named columns to new dtypes across the whole table.
    ///
    /// Values are cast strictly; an overflowing or unparseable value
    /// fails the protocol before any file is rewritten. The index may be
    /// recast as long as the new dtype still classifies as an integer,
    /// string, or datetime index.
    pub fn astype(&self, targets: &[(String, DataType)]) -> TableResult<()> {
        // 1) Validate the targets against the stored schema.
        let (mut meta, pindex) = self.load()?;
        let names: Vec<String> = targets.iter().map(|(name, _)| name.clone()).collect();
        validate::ensure_unique_columns(&names)?;
        validate::ensure_known_columns(&meta.columns, &names)?;
        if targets.is_empty() {
            return Ok(());
        }
        let mut index_class = None;
        for (name, dtype) in targets {
            if *name == meta.index_name {
                let class = IndexDtype::classify(dtype)
                    .context(frame::UnsupportedIndexDtypeSnafu {
                        column: name,
                        datatype: dtype.clone(),
                    })
                    .context(ShapeSnafu)?;
                index_class = Some(class);
            }
        }
        let changes: HashMap<&str, &DataType> = targets
            .iter()
            .map(|(name, dtype)| (name.as_str(), dtype))
            .collect();

        // 2) Cast every partition in memory; nothing on disk moves until
        //    all values have survived the strict cast.
        let mut cast_frames = Vec::with_capacity(pindex.len());
        for entry in pindex.entries() {
            let stored = self.read_partition(&meta, entry.id, None)?;
            let schema = stored.schema();
            let fields: Vec<_> = schema
                .fields()
                .iter()
                .map(|field| match changes.get(field.name().as_str()) {
                    Some(dtype) => field.as_ref().clone().with_data_type((*dtype).clone()),
                    None => field.as_ref().clone(),
                })
                .collect();
            let target = Arc::new(Schema::new(fields));
            let cast = stored.align_to_schema(&target).context(ShapeSnafu)?;
            cast_frames.push(cast);
        }

        // 3) A recast that leaves the index alone preserves the layout:
        //    rewrite the files in place and keep both documents.
        let Some(new_class) = index_class else {
            for (entry, cast) in pindex.entries().iter().zip(&cast_frames) {
                self.rewrite_partition(entry.id, cast, true)?;
            }
            return Ok(());
        };

        // 4) Re-derive each partition's sort state and bounds under the
        //    new comparison class.
        let mut still_sorted = true;
        let mut candidate = Vec::with_capacity(cast_frames.len());
        for (entry, cast) in pindex.entries().iter().zip(&cast_frames) {
            let view = cast.index_view().context(ShapeSnafu)?;
            still_sorted &= view.is_sorted();
            let Some((min, max)) = scanned_bounds(&view) else {
                still_sorted = false;
                continue;
            };
            candidate.push(PartitionStats {
                id: entry.id,
                min,
                max,
                num_rows: entry.num_rows,
            });
        }
        meta.index_dtype = new_class;
        meta.has_default_index = meta.has_default_index && new_class == IndexDtype::Integer;

        if still_sorted {
            let candidate = PartitionIndex::new(candidate);
            if candidate.is_contiguous() {
                // 5a) Layout intact: rewrite in place and refresh the
                //     documents with the re-derived bounds.
                for (entry, cast) in pindex.entries().iter().zip(&cast_frames) {
                    self.rewrite_partition(entry.id, cast, true)?;
                }
                let store = self.metadata_store();
                store.write_partition_index(&candidate).context(MetadataSnafu)?;
                return store.write_table_meta(&meta).context(MetadataSnafu);
            }
        }

        // 5b) The new comparison order broke the layout: re-sort the whole
        //     table, re-split, and stage under ids continuing the
        //     sequence past every id being replaced.
        let frames: Vec<Frame> = cast_frames
            .into_iter()
            .map(|cast| {
                Frame::from_stored(cast.into_batch(), new_class, meta.has_default_index)
            })
            .collect();
        let merged = Frame::concat(&frames)
            .context(ShapeSnafu)?
            .sort_by_index()
            .context(ShapeSnafu)?;
        let slices = split_frame(&merged, meta.rows_per_partition);
        let replaced = 0..pindex.len();
        let anchor = pindex.entries()[replaced.end - 1].id;
        let ids = partition::continue_sequence(anchor, slices.len());
        let parts: Vec<(PartitionId, Frame)> = ids.into_iter().zip(slices).collect();
        let stats = self.stage_partitions(&parts, true)?;
        self.commit_replacement(meta, pindex, replaced, stats)
    }
}

/// Bounds of a possibly unsorted index view, by full scan.
fn scanned_bounds(view: &IndexView) -> Option<(IndexValue, IndexValue)> {
    if let Some(ints) = view.as_int() {
        let min = aggregate::min(ints)?;
        let max = aggregate::max(ints)?;
        return Some(match view.class() {
            IndexDtype::Datetime => (IndexValue::Timestamp(min), IndexValue::Timestamp(max)),
            _ => (IndexValue::Int(min), IndexValue::Int(max)),
        });
    }
    let strings = view.as_str()?;
    let min = aggregate::min_string(strings)?;
    let max = aggregate::max_string(strings)?;
    Some((
        IndexValue::Str(min.to_string()),
        IndexValue::Str(max.to_string()),
    ))
}
