//! Append protocol.
//!
//! Appended rows must sort strictly after everything stored, so only the
//! tail of the table is touched: the last partition is decoded, merged
//! with the new rows, re-split under the stored row budget, and staged
//! under ids continuing the sequence. The old tail file is deleted only
//! after the documents flip, keeping an interrupted append invisible.

use arrow::record_batch::RecordBatch;
use snafu::prelude::*;

use crate::frame::{self, Frame, FrameError};
use crate::layout::DEFAULT_INDEX_NAME;
use crate::metadata::IndexValue;
use crate::partition::{self, PartitionId};
use crate::table::error::{EmptyDataSnafu, OutOfOrderAppendSnafu, ShapeSnafu};
use crate::table::{split_frame, validate, Table, TableResult};

impl Table {
    /// Append `batch` after the stored rows.
    ///
    /// A table on the synthesized default index continues the range from
    /// its stored maximum; any positional counter the caller carried along
    /// is replaced. A table on an explicit index requires the batch to
    /// carry that column, with every value past the stored maximum.
    pub fn append(&self, batch: &RecordBatch) -> TableResult<()> {
        // 1) Decode the tail partition; it is both the merge target and
        //    the casting target for the incoming columns.
        let (meta, pindex) = self.load()?;
        let entries = pindex.entries();
        let replaced = entries.len().saturating_sub(1)..entries.len();
        let tail_run = &entries[replaced.clone()];
        let tail = Frame::concat(&self.read_run(&meta, tail_run)?).context(ShapeSnafu)?;
        // The concat above fails on a table with no partitions, so the run
        // holds exactly one entry from here on.
        let anchor = tail_run[tail_run.len() - 1].id;
        let tail_view = tail.index_view().context(ShapeSnafu)?;

        // 2) Canonicalize and validate the incoming rows before anything
        //    on disk moves.
        let incoming = if meta.has_default_index {
            let start = match tail_view.max() {
                Some(IndexValue::Int(max)) => max + 1,
                _ => 0,
            };
            continued_default_index(batch, start).context(ShapeSnafu)?
        } else {
            Frame::normalize(batch, Some(&meta.index_name), true).context(ShapeSnafu)?
        };
        ensure!(
            incoming.num_rows() > 0,
            EmptyDataSnafu {
                operation: "append"
            }
        );
        validate::ensure_same_column_set(&meta.columns, &incoming.column_names())?;
        let incoming_view = incoming.index_view().context(ShapeSnafu)?;
        validate::ensure_index_class(meta.index_dtype, incoming_view.class())?;
        validate::ensure_unique_index(&incoming_view)?;
        if let (Some(stored), Some(incoming_min)) = (tail_view.max(), incoming_view.min()) {
            ensure!(
                incoming_min > stored,
                OutOfOrderAppendSnafu {
                    incoming: incoming_min,
                    stored,
                }
            );
        }

        // 3) Merge, re-split, and stage the new tail under fresh ids
        //    continuing the sequence.
        let presorted = incoming.was_presorted();
        let aligned = incoming.align_to_schema(&tail.schema()).context(ShapeSnafu)?;
        let merged = Frame::concat(&[tail, aligned]).context(ShapeSnafu)?;
        let slices = split_frame(&merged, meta.rows_per_partition);
        let ids = partition::continue_sequence(anchor, slices.len());
        let parts: Vec<(PartitionId, Frame)> = ids.into_iter().zip(slices).collect();
        let stats = self.stage_partitions(&parts, presorted)?;

        // 4) Publish and clean up the superseded tail file.
        self.commit_replacement(meta, pindex, replaced, stats)
    }
}

/// Canonical frame for rows appended to a default-index table.
///
/// The default index is positional, so a stale `__index__` column in the
/// batch carries no identity; it is dropped and the continuation range is
/// synthesized in its place.
fn continued_default_index(batch: &RecordBatch, start: i64) -> Result<Frame, FrameError> {
    let schema = batch.schema();
    let keep: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, field)| field.name() != DEFAULT_INDEX_NAME)
        .map(|(i, _)| i)
        .collect();
    if keep.len() == batch.num_columns() {
        return Frame::with_range_index(batch, start);
    }
    let trimmed = batch.project(&keep).context(frame::ArrowSnafu {
        stage: "dropping a stale default index",
    })?;
    Frame::with_range_index(&trimmed, start)
}
