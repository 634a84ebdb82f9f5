//! Drop protocols for rows and columns.
//!
//! Row drops decode the affected run plus one adjacent partition, filter
//! the dropped rows out, and re-split the remainder; the neighbour absorbs
//! an undersized remainder instead of leaving a sliver partition behind.
//! Column drops narrow every partition file in place and then publish the
//! narrowed schema.

use arrow::compute;
use arrow::compute::kernels::boolean;
use snafu::prelude::*;

use crate::frame::Frame;
use crate::partition::{self, PartitionId};
use crate::selector::{self, ColSelection, RowSelection};
use crate::table::error::{
    ArrowSnafu, DropAllColumnsSnafu, DropAllRowsSnafu, DropIndexColumnSnafu, MetadataSnafu,
    MissingRowsSnafu, PartitionIdsExhaustedSnafu, SelectionSnafu, ShapeSnafu,
};
use crate::table::{split_frame, validate, Table, TableResult};

impl Table {
    /// Drop the rows matched by `rows`.
    ///
    /// Explicit values must all be stored; range selections simply drop
    /// whatever they match, which may be nothing. Dropping every row is
    /// rejected, a table always holds at least one.
    pub fn drop_rows(&self, rows: &RowSelection) -> TableResult<()> {
        // 1) Coerce and locate the affected run.
        let (meta, pindex) = self.load()?;
        let selection = rows.coerce_to(meta.index_dtype).context(SelectionSnafu)?;
        let entries = pindex.entries();
        let pruned = selector::prune_partitions(entries, &selection);
        if pruned.is_empty() {
            if let RowSelection::Explicit(values) = &selection {
                if let Some(value) = values.iter().min() {
                    return MissingRowsSnafu {
                        value: value.clone(),
                    }
                    .fail();
                }
            }
            return Ok(());
        }

        // 2) Extend the run with one neighbour, preferring the
        //    predecessor, so an undersized remainder merges into it.
        let mut replaced = pruned;
        if replaced.start > 0 {
            replaced.start -= 1;
        } else if replaced.end < entries.len() {
            replaced.end += 1;
        }

        // 3) Decode the run, verify explicit values, and filter them out.
        let stored = Frame::concat(&self.read_run(&meta, &entries[replaced.clone()])?)
            .context(ShapeSnafu)?;
        let view = stored.index_view().context(ShapeSnafu)?;
        if let RowSelection::Explicit(values) = &selection {
            for value in values {
                if view.position_exact(value).is_none() {
                    return MissingRowsSnafu {
                        value: value.clone(),
                    }
                    .fail();
                }
            }
        }
        let mask = selector::build_mask(&view, &selection).context(SelectionSnafu)?;
        let keep = boolean::not(&mask).context(ArrowSnafu {
            stage: "inverting the drop mask",
        })?;
        let kept_batch = compute::filter_record_batch(stored.batch(), &keep).context(ArrowSnafu {
            stage: "dropping rows",
        })?;
        let kept = Frame::from_stored(kept_batch, meta.index_dtype, meta.has_default_index);

        // 4) An emptied run with nothing outside it would empty the table.
        if kept.num_rows() == 0 {
            ensure!(replaced != (0..entries.len()), DropAllRowsSnafu);
            return self.commit_replacement(meta, pindex, replaced, Vec::new());
        }

        // 5) Re-split and stage under ids interpolated after the run; the
        //    run is non-empty, or pruning would have come back empty.
        let slices = split_frame(&kept, meta.rows_per_partition);
        let low = entries[replaced.end - 1].id;
        let high = entries.get(replaced.end).map(|e| e.id);
        let ids = partition::interpolate(low, high, slices.len()).context(
            PartitionIdsExhaustedSnafu {
                requested: slices.len(),
            },
        )?;
        let parts: Vec<(PartitionId, Frame)> = ids.into_iter().zip(slices).collect();
        let stats = self.stage_partitions(&parts, true)?;
        self.commit_replacement(meta, pindex, replaced, stats)
    }

    /// Drop the data columns matched by `cols`.
    ///
    /// The index cannot be dropped, and at least one data column must
    /// remain. A `like` pattern matching nothing drops nothing.
    pub fn drop_cols(&self, cols: &ColSelection) -> TableResult<()> {
        // 1) Resolve against the stored data columns and validate.
        let (mut meta, pindex) = self.load()?;
        let resolved = cols.resolve(meta.data_columns()).context(SelectionSnafu)?;
        validate::ensure_unique_columns(&resolved)?;
        ensure!(
            !resolved.iter().any(|name| *name == meta.index_name),
            DropIndexColumnSnafu {
                column: &meta.index_name,
            }
        );
        validate::ensure_known_columns(meta.data_columns(), &resolved)?;
        if resolved.is_empty() {
            return Ok(());
        }
        ensure!(
            resolved.len() < meta.data_columns().len(),
            DropAllColumnsSnafu
        );

        // 2) Rewrite every partition file without the dropped columns,
        //    projecting them away at decode time.
        let keep: Vec<usize> = meta
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| !resolved.contains(name))
            .map(|(i, _)| i)
            .collect();
        for entry in pindex.entries() {
            let narrowed = self.read_partition(&meta, entry.id, Some(keep.clone()))?;
            self.rewrite_partition(entry.id, &narrowed, true)?;
        }

        // 3) Publish the narrowed schema; row ranges are untouched, so the
        //    partition document stays.
        meta.columns.retain(|name| !resolved.contains(name));
        meta.num_columns = meta.columns.len() as u64;
        self.metadata_store()
            .write_table_meta(&meta)
            .context(MetadataSnafu)
    }
}
