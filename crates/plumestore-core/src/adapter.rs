//! Boundary between external tabular types and canonical batches.
//!
//! The engine itself only ever sees [`RecordBatch`]es. Callers that hold
//! some other tabular representation implement [`FrameAdapter`] once and
//! convert at the edge: `to_canonical` on the way in, `from_canonical` on
//! the way out, plus two introspection hooks the write path uses to pick an
//! index column and report column order.

use arrow::array::RecordBatch;
use std::convert::Infallible;

/// Converts an external tabular type to and from canonical record batches.
pub trait FrameAdapter {
    /// The external representation this adapter handles.
    type External;
    /// Conversion failure reported by the adapter.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Convert external data into a canonical batch.
    fn to_canonical(&self, data: &Self::External) -> Result<RecordBatch, Self::Error>;

    /// Convert a canonical batch back into the external representation.
    fn from_canonical(&self, batch: RecordBatch) -> Result<Self::External, Self::Error>;

    /// The index column the external data designates, if any. Returning
    /// `None` lets the engine synthesize its default range index.
    fn index_name(&self, data: &Self::External) -> Option<String>;

    /// The external data's column names in order.
    fn columns(&self, data: &Self::External) -> Vec<String>;
}

/// Identity adapter for callers that already hold record batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordBatchAdapter;

impl FrameAdapter for RecordBatchAdapter {
    type External = RecordBatch;
    type Error = Infallible;

    fn to_canonical(&self, data: &RecordBatch) -> Result<RecordBatch, Infallible> {
        Ok(data.clone())
    }

    fn from_canonical(&self, batch: RecordBatch) -> Result<RecordBatch, Infallible> {
        Ok(batch)
    }

    fn index_name(&self, _data: &RecordBatch) -> Option<String> {
        None
    }

    fn columns(&self, data: &RecordBatch) -> Vec<String> {
        data.schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn identity_adapter_round_trips_batches() -> TestResult {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let column: ArrayRef = Arc::new(Int64Array::from(vec![1, 2]));
        let batch = RecordBatch::try_new(schema, vec![column])?;

        let adapter = RecordBatchAdapter;
        assert_eq!(adapter.index_name(&batch), None);
        assert_eq!(adapter.columns(&batch), vec!["id"]);
        let canonical = adapter.to_canonical(&batch)?;
        let back = adapter.from_canonical(canonical)?;
        assert_eq!(back, batch);
        Ok(())
    }
}
