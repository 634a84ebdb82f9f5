//! Pure metadata model types. No IO here; persistence lives in
//! [`crate::metadata::store`].

use arrow::datatypes::DataType;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;

use crate::partition::PartitionId;

/// The comparison class of a table index.
///
/// The index column keeps its exact Arrow type inside partition files; this
/// class only decides how values are compared, pruned, and coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexDtype {
    /// Any Arrow integer type.
    Integer,
    /// Utf8 or LargeUtf8.
    String,
    /// Timestamps and dates, compared by their underlying epoch value.
    Datetime,
}

impl IndexDtype {
    /// Classify an Arrow type as an index class, or `None` when the type
    /// cannot serve as a table index.
    pub fn classify(datatype: &DataType) -> Option<IndexDtype> {
        match datatype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => Some(IndexDtype::Integer),
            DataType::Utf8 | DataType::LargeUtf8 => Some(IndexDtype::String),
            DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
                Some(IndexDtype::Datetime)
            }
            _ => None,
        }
    }
}

impl fmt::Display for IndexDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexDtype::Integer => "integer",
            IndexDtype::String => "string",
            IndexDtype::Datetime => "datetime",
        };
        f.write_str(name)
    }
}

/// A single index value as stored in partition statistics and carried by
/// row selectors.
///
/// Integer and datetime indexes both canonicalize to `i64`; the variant
/// records which class the value belongs to. Values of different classes
/// never meet within one table, so the cross-class ordering below exists
/// only to keep [`Ord`] total.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexValue {
    /// A value of an integer index.
    Int(i64),
    /// A value of a datetime index, as raw epoch units of the stored type.
    Timestamp(i64),
    /// A value of a string index.
    Str(String),
}

impl IndexValue {
    /// The index class this value belongs to.
    pub fn class(&self) -> IndexDtype {
        match self {
            IndexValue::Int(_) => IndexDtype::Integer,
            IndexValue::Timestamp(_) => IndexDtype::Datetime,
            IndexValue::Str(_) => IndexDtype::String,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            IndexValue::Int(_) => 0,
            IndexValue::Timestamp(_) => 1,
            IndexValue::Str(_) => 2,
        }
    }
}

impl Ord for IndexValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (IndexValue::Int(a), IndexValue::Int(b)) => a.cmp(b),
            (IndexValue::Timestamp(a), IndexValue::Timestamp(b)) => a.cmp(b),
            (IndexValue::Str(a), IndexValue::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for IndexValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Int(v) => write!(f, "{v}"),
            IndexValue::Timestamp(v) => write!(f, "{v}"),
            IndexValue::Str(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for IndexValue {
    fn from(v: i64) -> Self {
        IndexValue::Int(v)
    }
}

impl From<&str> for IndexValue {
    fn from(v: &str) -> Self {
        IndexValue::Str(v.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(v: String) -> Self {
        IndexValue::Str(v)
    }
}

/// The table-scope metadata document.
///
/// `columns` lists every column in stored order with the index first, and
/// `num_columns` counts them all, index included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Total number of rows across all partitions.
    pub num_rows: u64,
    /// Total number of columns, including the index.
    pub num_columns: u64,
    /// Number of partitions currently referenced.
    pub num_partitions: u64,
    /// Row budget per partition, fixed at write time.
    pub rows_per_partition: u64,
    /// Target partition size in bytes the row budget was derived from.
    pub partition_byte_size: u64,
    /// Name of the index column.
    pub index_name: String,
    /// Position of the index column; always 0 once a batch is normalized,
    /// kept explicit for readers of the raw document.
    pub index_column_position: u64,
    /// Comparison class of the index.
    pub index_dtype: IndexDtype,
    /// Whether the index was synthesized as a default 0..n range.
    pub has_default_index: bool,
    /// All column names in stored order, index first.
    pub columns: Vec<String>,
}

impl TableMeta {
    /// Column names excluding the index.
    pub fn data_columns(&self) -> &[String] {
        self.columns.get(1..).unwrap_or(&[])
    }

    /// Position of `name` in the stored column order.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Statistics of one partition: its id, index range, and row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionStats {
    /// Identifier of the partition file.
    pub id: PartitionId,
    /// Smallest index value in the partition.
    pub min: IndexValue,
    /// Largest index value in the partition.
    pub max: IndexValue,
    /// Number of rows in the partition.
    pub num_rows: u64,
}

/// The partition-scope metadata document: per-partition statistics ordered
/// by partition id.
///
/// Serialized as parallel arrays (see the module docs for the wire form);
/// deserialization rejects documents whose arrays disagree in length or
/// whose ids are not strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionIndex {
    entries: Vec<PartitionStats>,
}

#[derive(Serialize, Deserialize)]
struct PartitionDoc {
    name: Vec<PartitionId>,
    min: Vec<IndexValue>,
    max: Vec<IndexValue>,
    num_rows: Vec<u64>,
}

impl PartitionIndex {
    /// Build an index from entries already ordered by id.
    pub fn new(entries: Vec<PartitionStats>) -> Self {
        debug_assert!(
            entries.windows(2).all(|w| w[0].id < w[1].id),
            "partition entries must be ordered by id"
        );
        Self { entries }
    }

    /// The entries in id order.
    pub fn entries(&self) -> &[PartitionStats] {
        &self.entries
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index references no partitions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry at position `i`.
    pub fn get(&self, i: usize) -> Option<&PartitionStats> {
        self.entries.get(i)
    }

    /// The first entry in id order.
    pub fn first(&self) -> Option<&PartitionStats> {
        self.entries.first()
    }

    /// The last entry in id order.
    pub fn last(&self) -> Option<&PartitionStats> {
        self.entries.last()
    }

    /// All partition ids in order.
    pub fn ids(&self) -> Vec<PartitionId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    /// Position of the entry with the given id.
    pub fn position_of(&self, id: PartitionId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// Total row count across all partitions.
    pub fn total_rows(&self) -> u64 {
        self.entries.iter().map(|e| e.num_rows).sum()
    }

    /// Replace the entries at `range` with `replacement`, keeping the rest.
    pub fn splice(&mut self, range: Range<usize>, replacement: Vec<PartitionStats>) {
        self.entries.splice(range, replacement);
        debug_assert!(
            self.entries.windows(2).all(|w| w[0].id < w[1].id),
            "partition entries must stay ordered by id after a splice"
        );
    }

    /// Whether per-partition ranges are well-formed and pairwise disjoint in
    /// id order: `min <= max` within each entry and `max_i < min_(i+1)`.
    pub fn is_contiguous(&self) -> bool {
        self.entries.iter().all(|e| e.min <= e.max)
            && self.entries.windows(2).all(|w| w[0].max < w[1].min)
    }
}

impl Serialize for PartitionIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let doc = PartitionDoc {
            name: self.entries.iter().map(|e| e.id).collect(),
            min: self.entries.iter().map(|e| e.min.clone()).collect(),
            max: self.entries.iter().map(|e| e.max.clone()).collect(),
            num_rows: self.entries.iter().map(|e| e.num_rows).collect(),
        };
        doc.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PartitionIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let doc = PartitionDoc::deserialize(deserializer)?;
        let n = doc.name.len();
        if doc.min.len() != n || doc.max.len() != n || doc.num_rows.len() != n {
            return Err(serde::de::Error::custom(
                "partition document arrays have unequal lengths",
            ));
        }

        let mut entries = Vec::with_capacity(n);
        for (((id, min), max), num_rows) in doc
            .name
            .into_iter()
            .zip(doc.min)
            .zip(doc.max)
            .zip(doc.num_rows)
        {
            entries.push(PartitionStats {
                id,
                min,
                max,
                num_rows,
            });
        }

        if !entries.windows(2).all(|w| w[0].id < w[1].id) {
            return Err(serde::de::Error::custom(
                "partition ids are not strictly increasing",
            ));
        }

        Ok(PartitionIndex { entries })
    }
}
