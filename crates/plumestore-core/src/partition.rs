//! Partition identity and sizing.
//!
//! A table is stored as an ordered run of immutable partition files. Each
//! file is named by a fixed-width decimal identifier whose lexicographic
//! order equals its numeric order, so a plain directory listing already
//! yields partitions in table order:
//!
//! ```text
//! 00000000000000.feather      # ordinal 0, raw value 0
//! 00000001000000.feather      # ordinal 1, raw value 1_000_000
//! 00000001500000.feather      # inserted between ordinals 1 and 2
//! 00000002000000.feather      # ordinal 2
//! ```
//!
//! Full-table writes space consecutive ids [`naming::INSERTION_BUFFER`]
//! apart. The reserved numeric room lets the insert protocol interpolate new
//! ids between existing neighbours without renaming any untouched file.
//!
//! [`split`] holds the row-count arithmetic that decides how many rows go
//! into each partition and when a trailing remnant is folded into its
//! predecessor.

pub mod naming;
pub mod split;

pub use naming::{
    continue_sequence, interpolate, PartitionId, PartitionIdError, INSERTION_BUFFER,
    PARTITION_ID_DIGITS,
};
pub use split::{rows_per_partition, split_ranges};
