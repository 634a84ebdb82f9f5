//! Partition identifiers.
//!
//! An identifier wraps a raw `u64` position and renders as a fixed-width,
//! zero-padded decimal string. Ids created by full-table writes and appends
//! sit on multiples of [`INSERTION_BUFFER`]; ids created by inserts land on
//! interpolated positions in between.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::{Backtrace, prelude::*};
use std::fmt;

/// Number of decimal digits in a rendered partition id.
pub const PARTITION_ID_DIGITS: usize = 14;

/// Numeric spacing between consecutive full-write partition ids.
///
/// The gap reserves id space so inserts can place new partitions between
/// existing ones without renumbering anything.
pub const INSERTION_BUFFER: u64 = 1_000_000;

/// Error raised when parsing a partition id from its string form.
#[derive(Debug, Snafu)]
pub enum PartitionIdError {
    /// The text is not a plain decimal string.
    #[snafu(display("Partition id is not a decimal string: {text:?}"))]
    NonNumeric {
        /// The text that failed to parse.
        text: String,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },
}

/// Identifier of a single partition file.
///
/// Ordering on the wrapped raw value matches lexicographic ordering of the
/// rendered string because the width is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionId(u64);

impl PartitionId {
    /// Id of the `n`-th full-write partition: `n * INSERTION_BUFFER`.
    pub fn from_ordinal(n: u64) -> Self {
        Self(n * INSERTION_BUFFER)
    }

    /// Id at an exact raw position (used for interpolated inserts).
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric position of this id.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// The full-write sequence number this id belongs to.
    pub fn ordinal(self) -> u64 {
        self.0 / INSERTION_BUFFER
    }

    /// Parse an id from its zero-padded decimal form.
    pub fn parse(text: &str) -> Result<Self, PartitionIdError> {
        let raw = text.parse::<u64>().ok().context(NonNumericSnafu { text })?;
        Ok(Self(raw))
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = PARTITION_ID_DIGITS)
    }
}

impl Serialize for PartitionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PartitionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        PartitionId::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Ids for `count` partitions appended after `last`, continuing the
/// full-write sequence: `(ordinal(last) + 1) * B`, `(ordinal(last) + 2) * B`, ...
///
/// The next ordinal boundary is strictly greater than any interpolated id
/// below it, so continuation never collides with inserted partitions.
pub fn continue_sequence(last: PartitionId, count: usize) -> Vec<PartitionId> {
    let base = last.ordinal();
    (1..=count as u64)
        .map(|i| PartitionId::from_ordinal(base + i))
        .collect()
}

/// Ids for `count` partitions placed between the untouched neighbours `low`
/// and `high`.
///
/// With an upper neighbour the ids sit at even raw steps of
/// `(high - low) / (count + 1)`; without one they continue at unit raw steps
/// above `low`. Returns `None` when the gap cannot fit `count` distinct ids.
pub fn interpolate(
    low: PartitionId,
    high: Option<PartitionId>,
    count: usize,
) -> Option<Vec<PartitionId>> {
    let step = match high {
        Some(high) => (high.raw() - low.raw()) / (count as u64 + 1),
        None => 1,
    };
    if step == 0 {
        return None;
    }
    Some(
        (1..=count as u64)
            .map(|i| PartitionId::from_raw(low.raw() + step * i))
            .collect(),
    )
}
