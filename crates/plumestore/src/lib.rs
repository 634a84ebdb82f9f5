//! # plumestore
//!
//! Embedded partitioned table store: immutable Arrow IPC partition files
//! under a sorted index, with JSON metadata documents resolving which files
//! belong to a table at any moment.
//!
//! This crate is the supported public entry point and provides a small,
//! stable surface over `plumestore-core`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use plumestore::prelude::*;
//!
//! let db = Database::create("./quotes.db", CreateMode::New)?;
//! let store = db.create_store("nyse")?;
//! let table = store.table("trades")?;
//! table.write(&batch, &WriteOptions::default().with_index("ts"))?;
//! let recent = table.select(Some(&RowSelection::after(1_700_000_000i64)), None)?;
//! ```

/// Convenience prelude with the stable, supported surface.
pub mod prelude;

/// Metadata document model (namespace re-export).
pub mod metadata {
    pub use plumestore_core::metadata::{
        IndexDtype, IndexValue, PartitionIndex, PartitionStats, TableMeta,
    };
}

pub use plumestore_core::adapter::{FrameAdapter, RecordBatchAdapter};
pub use plumestore_core::database::{CreateMode, Database, DatabaseError, Store};
pub use plumestore_core::selector::{ColSelection, RowSelection};
pub use plumestore_core::table::{ErrorKind, Table, TableError, TableResult, WriteOptions};

/// The Arrow version the store is built against, for downstream alignment.
pub use arrow;
