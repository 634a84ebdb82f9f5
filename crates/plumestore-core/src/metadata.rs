//! Durable table metadata.
//!
//! Every table owns two JSON documents under `<table>/.metadata/`:
//!
//! ```text
//! daily/
//!   00000000000000.feather
//!   00000001000000.feather
//!   .metadata/
//!     table.json               # table-scope document (TableMeta)
//!     partition.json           # partition-scope document (PartitionIndex)
//! ```
//!
//! The partition document stores parallel arrays ordered by partition id:
//!
//! ```json
//! {
//!   "name": ["00000000000000", "00000001000000"],
//!   "min": [{"int": 0}, {"int": 100}],
//!   "max": [{"int": 99}, {"int": 199}],
//!   "num_rows": [100, 100]
//! }
//! ```
//!
//! Updates are copy-on-write: a mutation serializes the whole replacement
//! document and publishes it with an atomic rename, so a reader observes
//! either the previous or the next committed state of a document, never a
//! torn one. Partition files that a new document no longer references become
//! invisible the moment the document lands; their bytes are deleted
//! afterwards.

pub mod model;
pub mod store;

pub use model::{IndexDtype, IndexValue, PartitionIndex, PartitionStats, TableMeta};
pub use store::{MetadataStore, Scope};

use snafu::{Backtrace, prelude::*};

use crate::storage::StorageError;

/// Errors that can occur while reading or writing table metadata.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MetadataError {
    /// Underlying storage error while accessing a metadata document.
    ///
    /// Backtraces are delegated to the inner StorageError.
    #[snafu(display("Storage error while accessing table metadata: {source}"))]
    Storage {
        /// Underlying storage error returned by the storage backend.
        #[snafu(backtrace)]
        source: StorageError,
    },

    /// A metadata document exists but does not decode as expected.
    #[snafu(display("Malformed metadata document at {path}: {source}"))]
    Decode {
        /// Path of the document that failed to decode.
        path: String,
        /// Underlying JSON decoding error.
        source: serde_json::Error,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// A metadata document could not be encoded for writing.
    #[snafu(display("Could not encode metadata document: {source}"))]
    Encode {
        /// Underlying JSON encoding error.
        source: serde_json::Error,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },
}
