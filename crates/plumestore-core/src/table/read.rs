//! Read path.
//!
//! Reads resolve partitions solely through the metadata documents, decode
//! the pruned run with a column projection, and finish with an exact mask
//! over the concatenated rows. Partition pruning makes the candidate set
//! small; the mask makes the result precise.

use std::collections::HashSet;

use arrow::compute;
use arrow::record_batch::RecordBatch;
use snafu::prelude::*;

use crate::frame::Frame;
use crate::metadata::PartitionStats;
use crate::selector::{self, ColSelection, RowSelection};
use crate::table::error::{ArrowSnafu, SelectionSnafu, ShapeSnafu};
use crate::table::{validate, Table, TableResult};

impl Table {
    /// Read the whole table in stored order.
    ///
    /// A table indexed by the synthesized default range comes back without
    /// the index column; an explicit index is always part of the result.
    pub fn read(&self) -> TableResult<RecordBatch> {
        self.select(None, None)
    }

    /// Read the rows and columns matched by the given selections.
    ///
    /// Row selections are inclusive on both ends and clamp to the stored
    /// range, so a bound past either end selects nothing extra and an
    /// explicit value that is not stored is simply absent from the result.
    /// The index column is always materialized, column selection or not,
    /// because the rows only carry their identity through it; requested
    /// data columns follow it in request order.
    pub fn select(
        &self,
        rows: Option<&RowSelection>,
        cols: Option<&ColSelection>,
    ) -> TableResult<RecordBatch> {
        let (meta, index) = self.load()?;
        let rows = rows
            .map(|r| r.coerce_to(meta.index_dtype))
            .transpose()
            .context(SelectionSnafu)?;

        // Resolve the data columns to return, keeping request order. The
        // index is handled separately and never counts as a data column.
        let requested: Option<Vec<String>> = match cols {
            None => None,
            Some(selection) => {
                let mut resolved = selection.resolve(&meta.columns).context(SelectionSnafu)?;
                validate::ensure_known_columns(&meta.columns, &resolved)?;
                let mut seen = HashSet::with_capacity(resolved.len());
                resolved.retain(|name| *name != meta.index_name && seen.insert(name.clone()));
                Some(resolved)
            }
        };
        // The file decoder wants ascending positions; request order is
        // restored by the final projection.
        let decode_positions: Option<Vec<usize>> = requested.as_ref().map(|names| {
            let mut positions: Vec<usize> = vec![0];
            positions.extend(names.iter().filter_map(|name| meta.position_of(name)));
            positions.sort_unstable();
            positions
        });

        let entries = index.entries();
        let pruned = match rows.as_ref() {
            Some(selection) => selector::prune_partitions(entries, selection),
            None => 0..entries.len(),
        };

        // When no partition intersects, one partition is still decoded and
        // sliced empty so the result keeps the stored dtypes.
        let nothing_matches = rows.is_some() && pruned.is_empty();
        let run: &[PartitionStats] = if nothing_matches {
            &entries[..entries.len().min(1)]
        } else {
            &entries[pruned]
        };
        let mut frames = Vec::with_capacity(run.len());
        for entry in run {
            frames.push(self.read_partition(&meta, entry.id, decode_positions.clone())?);
        }
        if nothing_matches {
            frames = frames.iter().map(|f| f.slice_rows(0..0)).collect();
        }
        let combined = Frame::concat(&frames).context(ShapeSnafu)?;

        let filtered = match rows.as_ref() {
            Some(selection) if combined.num_rows() > 0 => {
                let view = combined.index_view().context(ShapeSnafu)?;
                let mask = selector::build_mask(&view, selection).context(SelectionSnafu)?;
                compute::filter_record_batch(combined.batch(), &mask).context(ArrowSnafu {
                    stage: "filtering rows",
                })?
            }
            _ => combined.into_batch(),
        };

        // Final shape: index first (unless the synthesized default index is
        // squeezed out of a full-range read), then data columns in request
        // order.
        let names = match requested {
            Some(names) => names,
            None => meta.data_columns().to_vec(),
        };
        let squeeze_index = meta.has_default_index && rows.is_none();
        let schema = filtered.schema();
        let mut output = Vec::with_capacity(names.len() + 1);
        if !squeeze_index {
            output.push(0);
        }
        for name in &names {
            if let Some((position, _)) = schema.column_with_name(name) {
                output.push(position);
            }
        }
        filtered.project(&output).context(ArrowSnafu {
            stage: "projecting columns",
        })
    }
}
