//! On-disk layout helpers.
//!
//! This module centralizes every path convention of a plumestore database:
//! - the database sentinel file (`.plumestore`)
//! - store and table directories (`<db>/<store>/<table>/`)
//! - partition file naming (`<table>/<partition id>.feather`)
//! - the per-table metadata directory (`<table>/.metadata/`)
//!
//! Functions here only build [`std::path::PathBuf`] values; they never touch
//! the filesystem.

use std::path::{Path, PathBuf};

use crate::partition::PartitionId;

// ====================
// Database layout
// ====================

/// Sentinel file marking a directory as a plumestore database root.
pub const DB_MARKER_NAME: &str = ".plumestore";

/// Path of the database sentinel: `<db>/.plumestore`
pub fn db_marker_path(db_root: &Path) -> PathBuf {
    db_root.join(DB_MARKER_NAME)
}

/// Path of a store directory: `<db>/<store>/`
pub fn store_path(db_root: &Path, store: &str) -> PathBuf {
    db_root.join(store)
}

/// Path of a table directory: `<db>/<store>/<table>/`
pub fn table_path(db_root: &Path, store: &str, table: &str) -> PathBuf {
    store_path(db_root, store).join(table)
}

// ====================
// Table layout
// ====================

/// Name of the per-table metadata directory.
pub const METADATA_DIR_NAME: &str = ".metadata";

/// File name of the table-scope metadata document.
pub const TABLE_DOC_NAME: &str = "table.json";

/// File name of the partition-scope metadata document.
pub const PARTITION_DOC_NAME: &str = "partition.json";

/// Extension of partition files (Arrow IPC file format).
pub const PARTITION_FILE_EXT: &str = "feather";

/// Path of the metadata directory: `<table>/.metadata/`
pub fn metadata_dir(table_root: &Path) -> PathBuf {
    table_root.join(METADATA_DIR_NAME)
}

/// Path of the table metadata document: `<table>/.metadata/table.json`
pub fn table_doc_path(table_root: &Path) -> PathBuf {
    metadata_dir(table_root).join(TABLE_DOC_NAME)
}

/// Path of the partition metadata document: `<table>/.metadata/partition.json`
pub fn partition_doc_path(table_root: &Path) -> PathBuf {
    metadata_dir(table_root).join(PARTITION_DOC_NAME)
}

/// File name of a partition: `<zero-padded id>.feather`
pub fn partition_file_name(id: PartitionId) -> String {
    format!("{id}.{PARTITION_FILE_EXT}")
}

/// Path of a partition file: `<table>/<zero-padded id>.feather`
pub fn partition_file_path(table_root: &Path, id: PartitionId) -> PathBuf {
    table_root.join(partition_file_name(id))
}

// ====================
// Defaults
// ====================

/// Default target partition size in bytes (128 MiB).
pub const DEFAULT_PARTITION_BYTE_SIZE: u64 = 128 * 1024 * 1024;

/// Column name used for a synthesized default index.
pub const DEFAULT_INDEX_NAME: &str = "__index__";

/// Reserved filter keyword; no column may carry this name (case-insensitive).
pub const RESERVED_COLUMN_NAME: &str = "like";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_sits_at_database_root() {
        let path = db_marker_path(Path::new("/data/db"));
        assert_eq!(path, PathBuf::from("/data/db/.plumestore"));
    }

    #[test]
    fn table_path_nests_store_and_table() {
        let path = table_path(Path::new("/data/db"), "prices", "daily");
        assert_eq!(path, PathBuf::from("/data/db/prices/daily"));
    }

    #[test]
    fn partition_file_name_is_zero_padded() {
        let id = PartitionId::from_ordinal(3);
        assert_eq!(partition_file_name(id), "00000003000000.feather");
    }

    #[test]
    fn metadata_documents_live_under_hidden_dir() {
        let root = Path::new("/data/db/prices/daily");
        assert_eq!(
            table_doc_path(root),
            PathBuf::from("/data/db/prices/daily/.metadata/table.json")
        );
        assert_eq!(
            partition_doc_path(root),
            PathBuf::from("/data/db/prices/daily/.metadata/partition.json")
        );
    }
}
