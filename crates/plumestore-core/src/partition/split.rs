//! Row-count partition sizing.
//!
//! Partitions are cut by row count. The row budget is derived once per
//! table from the target byte size and the estimated per-row byte size of
//! the data being written, then stored in table metadata so later mutations
//! re-split at the same granularity.

use std::ops::Range;

/// Number of rows per partition for a table of `total_rows` rows occupying
/// an estimated `estimated_bytes`, aiming at `target_bytes` per partition.
///
/// Degenerate inputs (no rows, or no measurable bytes) collapse to a single
/// partition. The result is always at least 1.
pub fn rows_per_partition(total_rows: u64, estimated_bytes: u64, target_bytes: u64) -> u64 {
    if total_rows == 0 || estimated_bytes == 0 {
        return total_rows.max(1);
    }
    let rows = (total_rows as f64) * (target_bytes as f64) / (estimated_bytes as f64);
    (rows.round() as u64).max(1)
}

/// Cut `num_rows` rows into contiguous ranges of `rows_per_partition` rows.
///
/// A trailing range shorter than half the budget is folded into its
/// predecessor, so the final partition holds between 50% and 150% of the
/// budget. An empty input still yields one empty range: every table owns at
/// least one partition file.
pub fn split_ranges(num_rows: usize, rows_per_partition: usize) -> Vec<Range<usize>> {
    let budget = rows_per_partition.max(1);
    if num_rows == 0 {
        return vec![0..0];
    }

    let mut ranges: Vec<Range<usize>> = Vec::with_capacity(num_rows / budget + 1);
    let mut start = 0;
    while start < num_rows {
        let end = (start + budget).min(num_rows);
        ranges.push(start..end);
        start = end;
    }

    if ranges.len() > 1 {
        let last_len = ranges[ranges.len() - 1].len();
        if 2 * last_len < budget {
            let last = ranges.pop().unwrap_or(0..0);
            if let Some(prev) = ranges.last_mut() {
                prev.end = last.end;
            }
        }
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split_produces_equal_ranges() {
        let ranges = split_ranges(1_000, 100);
        assert_eq!(ranges.len(), 10);
        for (i, range) in ranges.iter().enumerate() {
            assert_eq!(*range, i * 100..(i + 1) * 100);
        }
    }

    #[test]
    fn large_tail_stays_its_own_partition() {
        // Tail of 50 rows is exactly half the budget: kept.
        let ranges = split_ranges(250, 100);
        assert_eq!(ranges, vec![0..100, 100..200, 200..250]);
    }

    #[test]
    fn small_tail_merges_into_predecessor() {
        // Tail of 49 rows is under half the budget: folded back.
        let ranges = split_ranges(249, 100);
        assert_eq!(ranges, vec![0..100, 100..249]);
    }

    #[test]
    fn single_range_is_never_merged() {
        let ranges = split_ranges(30, 100);
        assert_eq!(ranges, vec![0..30]);
    }

    #[test]
    fn zero_rows_yield_one_empty_range() {
        let ranges = split_ranges(0, 100);
        assert_eq!(ranges, vec![0..0]);
    }

    #[test]
    fn odd_budget_uses_strict_half_threshold() {
        // Budget 5: tail of 2 merges (2*2 < 5), tail of 3 stays (2*3 >= 5).
        assert_eq!(split_ranges(12, 5), vec![0..5, 5..12]);
        assert_eq!(split_ranges(13, 5), vec![0..5, 5..10, 10..13]);
    }

    #[test]
    fn rows_per_partition_scales_with_byte_ratio() {
        // 1_000 rows over 10_000 bytes, aiming at 1_000 bytes per partition:
        // 100 rows each.
        assert_eq!(rows_per_partition(1_000, 10_000, 1_000), 100);
    }

    #[test]
    fn rows_per_partition_rounds_to_nearest() {
        // 1_000 * 1_500 / 10_000 = 150.0; 1_000 * 1_505 / 10_000 = 150.5 -> 151.
        assert_eq!(rows_per_partition(1_000, 10_000, 1_500), 150);
        assert_eq!(rows_per_partition(1_000, 10_000, 1_505), 151);
    }

    #[test]
    fn rows_per_partition_never_returns_zero() {
        assert_eq!(rows_per_partition(10, 1_000_000, 1), 1);
        assert_eq!(rows_per_partition(0, 0, 1_000), 1);
        assert_eq!(rows_per_partition(5, 0, 1_000), 5);
    }
}
