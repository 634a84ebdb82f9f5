//! Canonical batch shaping.
//!
//! Every protocol operates on a [`Frame`]: a record batch whose first column
//! is the index, whose rows ascend by that index, and whose schema carries no
//! ad-hoc metadata. Normalization moves (or synthesizes) the index column,
//! sorts unsorted input, and records whether the caller's data arrived
//! pre-sorted so the provenance can be stamped into partition files.
//!
//! The module is also the partition codec: partitions are Arrow IPC files
//! encoded from a frame slice and decoded (optionally column-projected) from
//! the raw bytes of a memory-mapped file.

use std::collections::HashMap;
use std::io::Cursor;
use std::ops::Range;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array, RecordBatch, StringArray};
use arrow::compute::{self, CastOptions};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::util::display::FormatOptions;
use log::warn;
use snafu::{Backtrace, prelude::*};

use crate::layout::DEFAULT_INDEX_NAME;
use crate::metadata::{IndexDtype, IndexValue};

/// Schema metadata key under which partition files record whether the data
/// they were written from arrived pre-sorted.
pub const SORTED_META_KEY: &str = "plumestore.sorted";

/// Errors raised while shaping or encoding canonical batches.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FrameError {
    /// An Arrow kernel or codec call failed.
    #[snafu(display("Arrow failure while {stage}: {source}"))]
    Arrow {
        /// What the frame layer was doing when the kernel failed.
        stage: &'static str,
        /// Underlying Arrow error.
        source: ArrowError,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// The named index column is not present in the batch.
    #[snafu(display("Index column {column:?} not found in the data"))]
    MissingIndexColumn {
        /// The requested index column name.
        column: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A column required by the stored schema is missing from the batch.
    #[snafu(display("Column {column:?} not found in the data"))]
    MissingColumn {
        /// The missing column name.
        column: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// The index column's type has no comparison class.
    #[snafu(display("Column {column:?} of type {datatype} cannot be used as an index"))]
    UnsupportedIndexDtype {
        /// The offending column name.
        column: String,
        /// The unsupported Arrow type.
        datatype: DataType,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// The index column contains nulls.
    #[snafu(display("Index column {column:?} contains null values"))]
    NullIndexValue {
        /// The offending column name.
        column: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A column could not be coerced to the stored dtype.
    #[snafu(display("Column {column:?} cannot be cast from {from} to {to}: {source}"))]
    Uncastable {
        /// The offending column name.
        column: String,
        /// The dtype the values arrived with.
        from: DataType,
        /// The stored dtype they must convert to.
        to: DataType,
        /// Underlying Arrow cast error.
        source: ArrowError,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },
}

/// Cast that errors on lossy values instead of silently producing nulls.
pub(crate) fn strict_cast(array: &ArrayRef, to: &DataType) -> Result<ArrayRef, ArrowError> {
    let options = CastOptions {
        safe: false,
        format_options: FormatOptions::new(),
    };
    compute::cast_with_options(array, to, &options)
}

/// Typed view of an index column, widened to one of two canonical shapes.
///
/// Integer and datetime indexes become `Int64` (datetimes keep their raw
/// epoch units), string indexes become `Utf8`. Comparisons, scalar kernels
/// and binary searches only ever deal with these two array types.
#[derive(Debug, Clone)]
pub struct IndexView {
    class: IndexDtype,
    repr: ViewRepr,
}

#[derive(Debug, Clone)]
enum ViewRepr {
    Int(Int64Array),
    Str(StringArray),
}

impl IndexView {
    /// Build a canonical view over `column`, named `name` in diagnostics.
    pub fn from_array(column: &ArrayRef, name: &str) -> Result<Self, FrameError> {
        let class = IndexDtype::classify(column.data_type()).context(UnsupportedIndexDtypeSnafu {
            column: name,
            datatype: column.data_type().clone(),
        })?;
        ensure!(
            column.null_count() == 0,
            NullIndexValueSnafu { column: name }
        );
        let repr = match class {
            IndexDtype::String => {
                let cast = strict_cast(column, &DataType::Utf8).context(ArrowSnafu {
                    stage: "widening the index column",
                })?;
                let strings = cast
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .cloned()
                    .ok_or_else(|| ArrowError::CastError("expected StringArray".to_string()))
                    .context(ArrowSnafu {
                        stage: "widening the index column",
                    })?;
                ViewRepr::Str(strings)
            }
            IndexDtype::Integer | IndexDtype::Datetime => {
                let cast = strict_cast(column, &DataType::Int64).context(ArrowSnafu {
                    stage: "widening the index column",
                })?;
                let ints = cast
                    .as_any()
                    .downcast_ref::<Int64Array>()
                    .cloned()
                    .ok_or_else(|| ArrowError::CastError("expected Int64Array".to_string()))
                    .context(ArrowSnafu {
                        stage: "widening the index column",
                    })?;
                ViewRepr::Int(ints)
            }
        };
        Ok(Self { class, repr })
    }

    /// Comparison class of the underlying index.
    pub fn class(&self) -> IndexDtype {
        self.class
    }

    /// Number of index values.
    pub fn len(&self) -> usize {
        match &self.repr {
            ViewRepr::Int(a) => a.len(),
            ViewRepr::Str(a) => a.len(),
        }
    }

    /// Whether the view holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value at `row`. Panics when `row` is out of bounds.
    pub fn value(&self, row: usize) -> IndexValue {
        match (&self.repr, self.class) {
            (ViewRepr::Int(a), IndexDtype::Datetime) => IndexValue::Timestamp(a.value(row)),
            (ViewRepr::Int(a), _) => IndexValue::Int(a.value(row)),
            (ViewRepr::Str(a), _) => IndexValue::Str(a.value(row).to_string()),
        }
    }

    /// The canonical array, for handing to Arrow kernels.
    pub fn array(&self) -> ArrayRef {
        match &self.repr {
            ViewRepr::Int(a) => Arc::new(a.clone()),
            ViewRepr::Str(a) => Arc::new(a.clone()),
        }
    }

    /// The widened integer array, when the index is numeric.
    pub(crate) fn as_int(&self) -> Option<&Int64Array> {
        match &self.repr {
            ViewRepr::Int(a) => Some(a),
            ViewRepr::Str(_) => None,
        }
    }

    /// The widened string array, when the index is textual.
    pub(crate) fn as_str(&self) -> Option<&StringArray> {
        match &self.repr {
            ViewRepr::Int(_) => None,
            ViewRepr::Str(a) => Some(a),
        }
    }

    /// Whether the values ascend (non-strictly).
    pub fn is_sorted(&self) -> bool {
        match &self.repr {
            ViewRepr::Int(a) => a.values().windows(2).all(|w| w[0] <= w[1]),
            ViewRepr::Str(a) => (1..a.len()).all(|i| a.value(i - 1) <= a.value(i)),
        }
    }

    /// First value that occurs twice, assuming ascending order.
    pub fn first_duplicate(&self) -> Option<IndexValue> {
        match &self.repr {
            ViewRepr::Int(a) => a
                .values()
                .windows(2)
                .position(|w| w[0] == w[1])
                .map(|i| self.value(i)),
            ViewRepr::Str(a) => (1..a.len())
                .find(|&i| a.value(i - 1) == a.value(i))
                .map(|i| self.value(i)),
        }
    }

    /// Smallest value, assuming ascending order.
    pub fn min(&self) -> Option<IndexValue> {
        (!self.is_empty()).then(|| self.value(0))
    }

    /// Largest value, assuming ascending order.
    pub fn max(&self) -> Option<IndexValue> {
        (!self.is_empty()).then(|| self.value(self.len() - 1))
    }

    /// First position whose value is `>= value`; `len` when all are smaller.
    ///
    /// This is the boundary probe behind row slicing: an exact hit lands on
    /// the match, a miss lands on the closest larger value, and a value past
    /// either end falls back to the start or end of the index.
    pub fn lower_bound(&self, value: &IndexValue) -> usize {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.value(mid) < *value {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// First position whose value is `> value`; `len` when none is larger.
    pub fn upper_bound(&self, value: &IndexValue) -> usize {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.value(mid) <= *value {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Position of `value`, when present. Assumes ascending order.
    pub fn position_exact(&self, value: &IndexValue) -> Option<usize> {
        let pos = self.lower_bound(value);
        (pos < self.len() && self.value(pos) == *value).then_some(pos)
    }
}

/// A record batch in canonical shape: index first, rows ascending by it.
#[derive(Debug, Clone)]
pub struct Frame {
    batch: RecordBatch,
    index_dtype: IndexDtype,
    has_default_index: bool,
    presorted: bool,
}

impl Frame {
    /// Shape `batch` into canonical form.
    ///
    /// The index column is resolved in order: the explicit `index` name, a
    /// column already named after the default index, or a synthesized
    /// `0..num_rows` range. Unsorted input is sorted by the index; when
    /// `warn_unsorted` is set the implicit sort is logged.
    pub fn normalize(
        batch: &RecordBatch,
        index: Option<&str>,
        warn_unsorted: bool,
    ) -> Result<Self, FrameError> {
        let batch = strip_schema_metadata(batch.clone())?;
        let name = match index {
            Some(name) => name.to_string(),
            None if batch.schema_ref().column_with_name(DEFAULT_INDEX_NAME).is_some() => {
                DEFAULT_INDEX_NAME.to_string()
            }
            None => return Self::with_range_index(&batch, 0),
        };
        let shaped = move_index_first(&batch, &name)?;
        let view = IndexView::from_array(shaped.column(0), &name)?;
        let presorted = view.is_sorted();
        let shaped = if presorted {
            shaped
        } else {
            if warn_unsorted {
                warn!("index column {name:?} is unsorted; sorting rows before storing");
            }
            sort_batch_by(&shaped, &view)?
        };
        Ok(Self {
            batch: shaped,
            index_dtype: view.class(),
            has_default_index: name == DEFAULT_INDEX_NAME,
            presorted,
        })
    }

    /// Frame over `batch` with a synthesized default index starting at
    /// `start`. The batch must not already contain the default index column.
    pub(crate) fn with_range_index(batch: &RecordBatch, start: i64) -> Result<Self, FrameError> {
        let batch = strip_schema_metadata(batch.clone())?;
        let rows = batch.num_rows() as i64;
        let index: ArrayRef = Arc::new(Int64Array::from_iter_values(start..start + rows));
        let mut fields = vec![Arc::new(Field::new(
            DEFAULT_INDEX_NAME,
            DataType::Int64,
            false,
        ))];
        fields.extend(batch.schema_ref().fields().iter().cloned());
        let mut columns = vec![index];
        columns.extend(batch.columns().iter().cloned());
        let shaped = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).context(
            ArrowSnafu {
                stage: "attaching the default index",
            },
        )?;
        Ok(Self {
            batch: shaped,
            index_dtype: IndexDtype::Integer,
            has_default_index: true,
            presorted: true,
        })
    }

    /// Frame over a batch decoded from storage, which is canonical by
    /// construction.
    pub(crate) fn from_stored(
        batch: RecordBatch,
        index_dtype: IndexDtype,
        has_default_index: bool,
    ) -> Self {
        Self {
            batch,
            index_dtype,
            has_default_index,
            presorted: true,
        }
    }

    /// The underlying batch.
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Consume the frame, returning the batch.
    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Number of columns, index included.
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// The batch schema.
    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Name of the index column.
    pub fn index_name(&self) -> &str {
        self.batch.schema_ref().field(0).name()
    }

    /// Comparison class of the index.
    pub fn index_dtype(&self) -> IndexDtype {
        self.index_dtype
    }

    /// Whether the index is the synthesized default range.
    pub fn has_default_index(&self) -> bool {
        self.has_default_index
    }

    /// Whether the caller's data was already sorted when it arrived.
    pub fn was_presorted(&self) -> bool {
        self.presorted
    }

    /// All column names in frame order, index first.
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Column names excluding the index.
    pub fn data_column_names(&self) -> Vec<String> {
        self.column_names().split_off(1)
    }

    /// Canonical view of the index column.
    pub fn index_view(&self) -> Result<IndexView, FrameError> {
        IndexView::from_array(self.batch.column(0), self.index_name())
    }

    /// Smallest and largest index value, or `None` for an empty frame.
    pub fn bounds(&self) -> Result<Option<(IndexValue, IndexValue)>, FrameError> {
        let view = self.index_view()?;
        Ok(view.min().zip(view.max()))
    }

    /// In-memory footprint of the frame's buffers, used to derive the row
    /// budget from a target partition byte size.
    pub fn estimated_byte_size(&self) -> u64 {
        self.batch.get_array_memory_size() as u64
    }

    /// Zero-copy slice of the rows in `range`.
    pub fn slice_rows(&self, range: Range<usize>) -> Frame {
        Self {
            batch: self.batch.slice(range.start, range.end - range.start),
            index_dtype: self.index_dtype,
            has_default_index: self.has_default_index,
            presorted: self.presorted,
        }
    }

    /// Concatenate frames that share one schema. Flags carry over from the
    /// first frame; the result is not re-sorted.
    pub(crate) fn concat(frames: &[Frame]) -> Result<Frame, FrameError> {
        let first = frames
            .first()
            .ok_or_else(|| ArrowError::InvalidArgumentError("no frames to concatenate".to_string()))
            .context(ArrowSnafu {
                stage: "concatenating partition batches",
            })?;
        let batch = compute::concat_batches(&first.schema(), frames.iter().map(|f| &f.batch))
            .context(ArrowSnafu {
                stage: "concatenating partition batches",
            })?;
        Ok(Frame {
            batch,
            index_dtype: first.index_dtype,
            has_default_index: first.has_default_index,
            presorted: first.presorted,
        })
    }

    /// Re-sort the frame by its index when the rows no longer ascend.
    pub(crate) fn sort_by_index(self) -> Result<Frame, FrameError> {
        let view = self.index_view()?;
        if view.is_sorted() {
            return Ok(self);
        }
        let batch = sort_batch_by(&self.batch, &view)?;
        Ok(Frame { batch, ..self })
    }

    /// Reshape the frame's columns to `target`: same names, possibly
    /// different order and dtypes. Values are strictly cast; a lossy value
    /// fails rather than degrading to null.
    pub(crate) fn align_to_schema(&self, target: &SchemaRef) -> Result<Frame, FrameError> {
        let mut columns = Vec::with_capacity(target.fields().len());
        for field in target.fields() {
            let (position, _) = self
                .batch
                .schema_ref()
                .column_with_name(field.name())
                .context(MissingColumnSnafu {
                    column: field.name(),
                })?;
            let column = self.batch.column(position);
            if column.data_type() == field.data_type() {
                columns.push(column.clone());
            } else {
                let cast = strict_cast(column, field.data_type()).context(UncastableSnafu {
                    column: field.name(),
                    from: column.data_type().clone(),
                    to: field.data_type().clone(),
                })?;
                columns.push(cast);
            }
        }
        let batch = RecordBatch::try_new(target.clone(), columns).context(ArrowSnafu {
            stage: "assembling the aligned batch",
        })?;
        Ok(Frame { batch, ..self.clone() })
    }
}

/// Move the column named `name` to position 0, keeping the rest in order.
fn move_index_first(batch: &RecordBatch, name: &str) -> Result<RecordBatch, FrameError> {
    let (position, _) = batch
        .schema_ref()
        .column_with_name(name)
        .context(MissingIndexColumnSnafu { column: name })?;
    if position == 0 {
        return Ok(batch.clone());
    }
    let mut order = vec![position];
    order.extend((0..batch.num_columns()).filter(|&i| i != position));
    batch.project(&order).context(ArrowSnafu {
        stage: "moving the index column first",
    })
}

/// Stable reorder of `batch` rows into the ascending order of `view`.
fn sort_batch_by(batch: &RecordBatch, view: &IndexView) -> Result<RecordBatch, FrameError> {
    let array = view.array();
    let indices = compute::sort_to_indices(array.as_ref(), None, None).context(ArrowSnafu {
        stage: "sorting rows by the index",
    })?;
    compute::take_record_batch(batch, &indices).context(ArrowSnafu {
        stage: "sorting rows by the index",
    })
}

/// Rebuild `batch` without schema-level metadata so in-memory schemas
/// compare equal regardless of where the batch came from.
fn strip_schema_metadata(batch: RecordBatch) -> Result<RecordBatch, FrameError> {
    if batch.schema_ref().metadata().is_empty() {
        return Ok(batch);
    }
    let schema = Arc::new(Schema::new(batch.schema_ref().fields().clone()));
    RecordBatch::try_new(schema, batch.columns().to_vec()).context(ArrowSnafu {
        stage: "clearing schema metadata",
    })
}

/// Encode one partition's rows as an Arrow IPC file, stamping whether the
/// originating write received pre-sorted data.
pub fn encode_partition(batch: &RecordBatch, presorted: bool) -> Result<Vec<u8>, FrameError> {
    let metadata = HashMap::from([(SORTED_META_KEY.to_string(), presorted.to_string())]);
    let schema = Arc::new(Schema::new_with_metadata(
        batch.schema_ref().fields().clone(),
        metadata,
    ));
    let stamped =
        RecordBatch::try_new(schema.clone(), batch.columns().to_vec()).context(ArrowSnafu {
            stage: "stamping the partition schema",
        })?;
    let mut buffer = Vec::new();
    {
        let mut writer = FileWriter::try_new(&mut buffer, schema.as_ref()).context(ArrowSnafu {
            stage: "opening the partition encoder",
        })?;
        writer.write(&stamped).context(ArrowSnafu {
            stage: "encoding partition rows",
        })?;
        writer.finish().context(ArrowSnafu {
            stage: "finishing the partition file",
        })?;
    }
    Ok(buffer)
}

/// Decode a partition file, optionally projecting columns by position.
///
/// The provenance stamp is stripped from the returned batch so decoded
/// schemas compare equal to freshly normalized ones.
pub fn decode_partition(
    bytes: &[u8],
    projection: Option<Vec<usize>>,
) -> Result<RecordBatch, FrameError> {
    let reader = FileReader::try_new(Cursor::new(bytes), projection).context(ArrowSnafu {
        stage: "opening a partition file",
    })?;
    let schema = reader.schema();
    let mut batches = Vec::new();
    for item in reader {
        let batch = item.context(ArrowSnafu {
            stage: "decoding partition rows",
        })?;
        batches.push(batch);
    }
    let combined = match batches.len() {
        0 => RecordBatch::new_empty(schema),
        1 => batches.swap_remove(0),
        _ => compute::concat_batches(&schema, batches.iter()).context(ArrowSnafu {
            stage: "concatenating partition chunks",
        })?,
    };
    strip_schema_metadata(combined)
}

/// Read the provenance stamp from a partition file's schema metadata.
/// Absent or unparsable stamps count as pre-sorted.
pub fn partition_was_presorted(bytes: &[u8]) -> Result<bool, FrameError> {
    let reader = FileReader::try_new(Cursor::new(bytes), Some(vec![])).context(ArrowSnafu {
        stage: "opening a partition file",
    })?;
    let sorted = reader
        .schema()
        .metadata()
        .get(SORTED_META_KEY)
        .map(|v| v != "false")
        .unwrap_or(true);
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Float64Array;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn batch_with(names: &[&str], columns: Vec<ArrayRef>) -> Result<RecordBatch, ArrowError> {
        let fields: Vec<Field> = names
            .iter()
            .zip(&columns)
            .map(|(n, c)| Field::new(*n, c.data_type().clone(), false))
            .collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
    }

    fn sample() -> Result<RecordBatch, ArrowError> {
        batch_with(
            &["value", "id"],
            vec![
                Arc::new(Float64Array::from(vec![1.5, 2.5, 3.5])),
                Arc::new(Int64Array::from(vec![10, 20, 30])),
            ],
        )
    }

    #[test]
    fn normalize_moves_explicit_index_first() -> TestResult {
        let frame = Frame::normalize(&sample()?, Some("id"), false)?;
        assert_eq!(frame.index_name(), "id");
        assert_eq!(frame.column_names(), vec!["id", "value"]);
        assert_eq!(frame.index_dtype(), IndexDtype::Integer);
        assert!(!frame.has_default_index());
        assert!(frame.was_presorted());
        Ok(())
    }

    #[test]
    fn normalize_synthesizes_default_range() -> TestResult {
        let frame = Frame::normalize(&sample()?, None, false)?;
        assert_eq!(frame.index_name(), DEFAULT_INDEX_NAME);
        assert!(frame.has_default_index());
        let view = frame.index_view()?;
        assert_eq!(view.value(0), IndexValue::Int(0));
        assert_eq!(view.value(2), IndexValue::Int(2));
        Ok(())
    }

    #[test]
    fn normalize_adopts_existing_default_index_column() -> TestResult {
        let batch = batch_with(
            &["value", DEFAULT_INDEX_NAME],
            vec![
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
                Arc::new(Int64Array::from(vec![5, 9])),
            ],
        )?;
        let frame = Frame::normalize(&batch, None, false)?;
        assert!(frame.has_default_index());
        assert_eq!(frame.index_view()?.value(0), IndexValue::Int(5));
        Ok(())
    }

    #[test]
    fn normalize_sorts_unsorted_rows_and_records_provenance() -> TestResult {
        let batch = batch_with(
            &["id", "value"],
            vec![
                Arc::new(Int64Array::from(vec![30, 10, 20])),
                Arc::new(Float64Array::from(vec![3.5, 1.5, 2.5])),
            ],
        )?;
        let frame = Frame::normalize(&batch, Some("id"), false)?;
        assert!(!frame.was_presorted());
        let view = frame.index_view()?;
        assert_eq!(view.value(0), IndexValue::Int(10));
        assert_eq!(view.value(2), IndexValue::Int(30));
        let values = frame
            .batch()
            .column(1)
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or("expected Float64Array")?
            .values()
            .to_vec();
        assert_eq!(values, vec![1.5, 2.5, 3.5]);
        Ok(())
    }

    #[test]
    fn normalize_rejects_missing_index() -> TestResult {
        let err = Frame::normalize(&sample()?, Some("nope"), false).unwrap_err();
        assert!(matches!(err, FrameError::MissingIndexColumn { .. }));
        Ok(())
    }

    #[test]
    fn normalize_rejects_unsupported_index_dtype() -> TestResult {
        let err = Frame::normalize(&sample()?, Some("value"), false).unwrap_err();
        assert!(matches!(err, FrameError::UnsupportedIndexDtype { .. }));
        Ok(())
    }

    #[test]
    fn view_rejects_null_index_values() -> TestResult {
        let column: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None, Some(3)]));
        let err = IndexView::from_array(&column, "id").unwrap_err();
        assert!(matches!(err, FrameError::NullIndexValue { .. }));
        Ok(())
    }

    #[test]
    fn view_bounds_and_search() -> TestResult {
        let column: ArrayRef = Arc::new(Int64Array::from(vec![10, 20, 30, 40]));
        let view = IndexView::from_array(&column, "id")?;
        assert_eq!(view.min(), Some(IndexValue::Int(10)));
        assert_eq!(view.max(), Some(IndexValue::Int(40)));
        assert_eq!(view.lower_bound(&IndexValue::Int(20)), 1);
        assert_eq!(view.lower_bound(&IndexValue::Int(25)), 2);
        assert_eq!(view.lower_bound(&IndexValue::Int(5)), 0);
        assert_eq!(view.lower_bound(&IndexValue::Int(99)), 4);
        assert_eq!(view.upper_bound(&IndexValue::Int(20)), 2);
        assert_eq!(view.position_exact(&IndexValue::Int(30)), Some(2));
        assert_eq!(view.position_exact(&IndexValue::Int(31)), None);
        Ok(())
    }

    #[test]
    fn view_detects_duplicates() -> TestResult {
        let column: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 2, 3]));
        let view = IndexView::from_array(&column, "id")?;
        assert_eq!(view.first_duplicate(), Some(IndexValue::Int(2)));
        Ok(())
    }

    #[test]
    fn encode_decode_round_trip_strips_provenance() -> TestResult {
        let frame = Frame::normalize(&sample()?, Some("id"), false)?;
        let bytes = encode_partition(frame.batch(), false)?;
        assert!(!partition_was_presorted(&bytes)?);
        let decoded = decode_partition(&bytes, None)?;
        assert!(decoded.schema_ref().metadata().is_empty());
        assert_eq!(&decoded, frame.batch());
        Ok(())
    }

    #[test]
    fn decode_projects_columns_by_position() -> TestResult {
        let frame = Frame::normalize(&sample()?, Some("id"), true)?;
        let bytes = encode_partition(frame.batch(), true)?;
        let decoded = decode_partition(&bytes, Some(vec![0]))?;
        assert_eq!(decoded.num_columns(), 1);
        assert_eq!(decoded.schema_ref().field(0).name(), "id");
        assert_eq!(decoded.num_rows(), 3);
        Ok(())
    }

    #[test]
    fn align_casts_and_reorders_columns() -> TestResult {
        let stored = Frame::normalize(&sample()?, Some("id"), false)?;
        let incoming = batch_with(
            &["value", "id"],
            vec![
                Arc::new(Float64Array::from(vec![9.0])),
                Arc::new(Int64Array::from(vec![40])),
            ],
        )?;
        let frame = Frame::normalize(&incoming, Some("id"), false)?;
        let aligned = frame.align_to_schema(&stored.schema())?;
        assert_eq!(aligned.schema(), stored.schema());
        Ok(())
    }

    #[test]
    fn slice_rows_keeps_flags() -> TestResult {
        let frame = Frame::normalize(&sample()?, Some("id"), false)?;
        let slice = frame.slice_rows(1..3);
        assert_eq!(slice.num_rows(), 2);
        assert_eq!(slice.index_view()?.value(0), IndexValue::Int(20));
        assert_eq!(slice.index_dtype(), IndexDtype::Integer);
        Ok(())
    }
}
