//! Wrapper prelude.
//!
//! The `plumestore` crate is the supported public entry point. Downstream
//! code should prefer importing from this prelude instead of depending on
//! internal core module paths.

pub use crate::metadata;
pub use crate::{
    ColSelection, CreateMode, Database, DatabaseError, ErrorKind, RowSelection, Store, Table,
    TableError, TableResult, WriteOptions,
};
