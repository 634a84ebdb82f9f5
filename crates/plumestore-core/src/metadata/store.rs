//! Copy-on-write metadata persistence.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use snafu::prelude::*;
use std::path::{Path, PathBuf};

use crate::layout;
use crate::metadata::{
    DecodeSnafu, EncodeSnafu, MetadataError, PartitionIndex, StorageSnafu, TableMeta,
};
use crate::storage;

/// The two metadata namespaces of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The table-scope document (`table.json`).
    Table,
    /// The partition-scope document (`partition.json`).
    Partition,
}

impl Scope {
    fn doc_name(self) -> &'static str {
        match self {
            Scope::Table => layout::TABLE_DOC_NAME,
            Scope::Partition => layout::PARTITION_DOC_NAME,
        }
    }
}

/// Handle on the metadata directory of one table.
///
/// Each write serializes a full replacement document and publishes it with
/// an atomic rename; there is no in-place mutation of metadata on disk.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    /// Handle for the table rooted at `table_root`. Does not touch the
    /// filesystem.
    pub fn new(table_root: &Path) -> Self {
        Self {
            dir: layout::metadata_dir(table_root),
        }
    }

    /// Create the metadata directory. Idempotent.
    pub fn init(&self) -> Result<(), MetadataError> {
        storage::create_dir_all(&self.dir).context(StorageSnafu)
    }

    /// Whether the metadata directory exists. Presence of this directory is
    /// what makes a directory a table.
    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    /// Path of the document backing `scope`.
    pub fn doc_path(&self, scope: Scope) -> PathBuf {
        self.dir.join(scope.doc_name())
    }

    fn read_doc<T: DeserializeOwned>(&self, scope: Scope) -> Result<T, MetadataError> {
        let path = self.doc_path(scope);
        let bytes = storage::read_all_bytes(&path).context(StorageSnafu)?;
        serde_json::from_slice(&bytes).context(DecodeSnafu {
            path: path.display().to_string(),
        })
    }

    fn write_doc<T: Serialize>(&self, scope: Scope, value: &T) -> Result<(), MetadataError> {
        let bytes = serde_json::to_vec_pretty(value).context(EncodeSnafu)?;
        storage::write_atomic(&self.doc_path(scope), &bytes).context(StorageSnafu)
    }

    /// Read the table-scope document.
    pub fn read_table_meta(&self) -> Result<TableMeta, MetadataError> {
        self.read_doc(Scope::Table)
    }

    /// Publish a replacement table-scope document.
    pub fn write_table_meta(&self, meta: &TableMeta) -> Result<(), MetadataError> {
        self.write_doc(Scope::Table, meta)
    }

    /// Read the partition-scope document.
    pub fn read_partition_index(&self) -> Result<PartitionIndex, MetadataError> {
        self.read_doc(Scope::Partition)
    }

    /// Publish a replacement partition-scope document.
    pub fn write_partition_index(&self, index: &PartitionIndex) -> Result<(), MetadataError> {
        self.write_doc(Scope::Partition, index)
    }

    /// Fetch one top-level key from a scope document, if present.
    pub fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>, MetadataError> {
        let doc: Map<String, Value> = self.read_doc(scope)?;
        Ok(doc.get(key).cloned())
    }

    /// Set one top-level key in a scope document and republish it.
    pub fn set(&self, scope: Scope, key: &str, value: Value) -> Result<(), MetadataError> {
        let mut doc: Map<String, Value> = self.read_doc(scope)?;
        doc.insert(key.to_string(), value);
        self.write_doc(scope, &doc)
    }

    /// Remove one top-level key from a scope document. Returns whether the
    /// key was present.
    pub fn delete(&self, scope: Scope, key: &str) -> Result<bool, MetadataError> {
        let mut doc: Map<String, Value> = self.read_doc(scope)?;
        let removed = doc.remove(key).is_some();
        if removed {
            self.write_doc(scope, &doc)?;
        }
        Ok(removed)
    }
}
