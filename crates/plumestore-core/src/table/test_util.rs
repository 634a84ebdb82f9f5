//! Shared fixtures for the protocol tests: tables under a temp directory
//! and small batches with predictable column values.

use std::ops::Range;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, Float64Array, Int32Array, Int64Array, RecordBatch, StringArray,
};
use arrow::datatypes::{Field, Schema};
use tempfile::TempDir;

use crate::frame::IndexView;
use crate::table::{Table, WriteOptions};

pub(crate) type TestResult = Result<(), Box<dyn std::error::Error>>;

/// A handle under a fresh temp directory; nothing exists on disk yet.
pub(crate) fn empty_table(name: &str) -> Result<(TempDir, Table), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let table = Table::new(dir.path().join(name), name);
    Ok((dir, table))
}

/// A table holding `int_batch(ids)` indexed by `id` under the given row
/// budget.
pub(crate) fn written_table(
    name: &str,
    ids: Range<i64>,
    rows_per_partition: u64,
) -> Result<(TempDir, Table), Box<dyn std::error::Error>> {
    let (dir, table) = empty_table(name)?;
    table.write(
        &int_batch(ids),
        &WriteOptions::default()
            .with_index("id")
            .with_rows_per_partition(rows_per_partition),
    )?;
    Ok((dir, table))
}

fn batch_of(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), false))
        .collect();
    let arrays = columns.into_iter().map(|(_, array)| array).collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).expect("test batch")
}

/// Columns `id`, `price` (id / 10) and `qty` (id * 2) over a range of ids.
pub(crate) fn int_batch(ids: Range<i64>) -> RecordBatch {
    int_batch_of(&ids.collect::<Vec<_>>())
}

/// Same shape as [`int_batch`], from explicit id values.
pub(crate) fn int_batch_of(ids: &[i64]) -> RecordBatch {
    let price: Vec<f64> = ids.iter().map(|v| *v as f64 / 10.0).collect();
    let qty: Vec<i64> = ids.iter().map(|v| v * 2).collect();
    batch_of(vec![
        ("id", Arc::new(Int64Array::from(ids.to_vec())) as ArrayRef),
        ("price", Arc::new(Float64Array::from(price)) as ArrayRef),
        ("qty", Arc::new(Int64Array::from(qty)) as ArrayRef),
    ])
}

/// Int64 columns with the given names and values.
pub(crate) fn named_batch(names: &[&str], columns: &[Vec<i64>]) -> RecordBatch {
    let columns = names
        .iter()
        .zip(columns)
        .map(|(name, values)| {
            (
                *name,
                Arc::new(Int64Array::from(values.clone())) as ArrayRef,
            )
        })
        .collect();
    batch_of(columns)
}

/// A string-indexed batch: `key` plus the length of each key.
pub(crate) fn str_batch(keys: &[&str]) -> RecordBatch {
    let lens: Vec<i64> = keys.iter().map(|k| k.len() as i64).collect();
    batch_of(vec![
        ("key", Arc::new(StringArray::from(keys.to_vec())) as ArrayRef),
        ("len", Arc::new(Int64Array::from(lens)) as ArrayRef),
    ])
}

/// The [`int_batch`] shape with a string-typed `id` column.
pub(crate) fn utf8_id_batch(ids: &[&str]) -> RecordBatch {
    let price: Vec<f64> = ids.iter().map(|v| v.len() as f64).collect();
    let qty: Vec<i64> = ids.iter().map(|v| v.len() as i64).collect();
    batch_of(vec![
        ("id", Arc::new(StringArray::from(ids.to_vec())) as ArrayRef),
        ("price", Arc::new(Float64Array::from(price)) as ArrayRef),
        ("qty", Arc::new(Int64Array::from(qty)) as ArrayRef),
    ])
}

/// The [`int_batch`] columns in a different order, with a 32-bit `id`.
pub(crate) fn shuffled_int32_batch(ids: Range<i64>) -> RecordBatch {
    let ids: Vec<i64> = ids.collect();
    let price: Vec<f64> = ids.iter().map(|v| *v as f64 / 10.0).collect();
    let qty: Vec<i64> = ids.iter().map(|v| v * 2).collect();
    let narrow: Vec<i32> = ids.iter().map(|v| *v as i32).collect();
    batch_of(vec![
        ("price", Arc::new(Float64Array::from(price)) as ArrayRef),
        ("qty", Arc::new(Int64Array::from(qty)) as ArrayRef),
        ("id", Arc::new(Int32Array::from(narrow)) as ArrayRef),
    ])
}

/// The first column's values, widened to `i64`.
pub(crate) fn index_column(batch: &RecordBatch) -> Vec<i64> {
    let view = IndexView::from_array(batch.column(0), "index").expect("index view");
    view.as_int().expect("integer index").values().to_vec()
}

/// The first column's values as strings.
pub(crate) fn str_index_column(batch: &RecordBatch) -> Vec<String> {
    let view = IndexView::from_array(batch.column(0), "index").expect("index view");
    view.as_str()
        .expect("string index")
        .iter()
        .flatten()
        .map(str::to_string)
        .collect()
}

/// The named Int64 column's values.
pub(crate) fn int_column(batch: &RecordBatch, name: &str) -> Vec<i64> {
    batch
        .column_by_name(name)
        .unwrap_or_else(|| panic!("column {name:?}"))
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap_or_else(|| panic!("column {name:?} is not Int64"))
        .values()
        .to_vec()
}

/// The named Float64 column's values.
pub(crate) fn float_column(batch: &RecordBatch, name: &str) -> Vec<f64> {
    batch
        .column_by_name(name)
        .unwrap_or_else(|| panic!("column {name:?}"))
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap_or_else(|| panic!("column {name:?} is not Float64"))
        .values()
        .to_vec()
}

/// All column names in batch order.
pub(crate) fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema_ref()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect()
}
