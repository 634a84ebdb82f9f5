//! Database and store handles.
//!
//! A database is a directory carrying a hidden marker file; stores are
//! directories inside it marked by their own metadata folder; tables are
//! directories inside a store. Everything here is directory-level
//! bookkeeping: creating, connecting, listing (optionally filtered by a
//! `like` pattern), renaming, and dropping. Table content is the
//! [`crate::table`] module's business.

use std::path::{Path, PathBuf};

use snafu::{Backtrace, prelude::*};

use crate::layout::{self, DB_MARKER_NAME, METADATA_DIR_NAME};
use crate::selector::{self, SelectorError};
use crate::storage::{self, StorageError};
use crate::table::Table;

/// Errors raised by database and store bookkeeping.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DatabaseError {
    /// A filesystem operation failed.
    #[snafu(display("Storage failure: {source}"))]
    Storage {
        /// Underlying storage error.
        #[snafu(backtrace)]
        source: StorageError,
    },

    /// The path is not a database directory.
    #[snafu(display("No database found at {path}"))]
    NotADatabase {
        /// The path that was probed.
        path: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// Refusing to create a database in a directory that already has
    /// unrelated content.
    #[snafu(display("Can not create a database in the populated directory {path}"))]
    PopulatedDirectory {
        /// The offending directory.
        path: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A database already exists at the path.
    #[snafu(display("A database already exists at {path}"))]
    DatabaseExists {
        /// The offending directory.
        path: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// The named store does not exist.
    #[snafu(display("Store {store:?} not found"))]
    StoreNotFound {
        /// The requested store name.
        store: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A store with the name already exists.
    #[snafu(display("Store {store:?} already exists"))]
    StoreAlreadyExists {
        /// The conflicting store name.
        store: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// Refusing to drop a store that still contains tables.
    #[snafu(display("Store {store:?} still contains tables"))]
    StoreNotEmpty {
        /// The populated store name.
        store: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// The named table does not exist in the store.
    #[snafu(display("Table {table:?} not found"))]
    TableNotFound {
        /// The requested table name.
        table: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A table with the name already exists in the store.
    #[snafu(display("Table {table:?} already exists"))]
    TableAlreadyExists {
        /// The conflicting table name.
        table: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A store or table name the layout cannot represent.
    #[snafu(display("Invalid name {name:?}: {reason}"))]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why the name is rejected.
        reason: &'static str,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A `like` pattern that does not compile.
    #[snafu(display("Invalid listing pattern: {source}"))]
    Pattern {
        /// Underlying selector error.
        #[snafu(backtrace)]
        source: SelectorError,
    },
}

/// How [`Database::create`] treats an existing database at the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Fail when the path already holds a database.
    New,
    /// Connect to an existing database instead of failing.
    Reuse,
}

/// Handle to a database directory.
#[derive(Debug, Clone)]
pub struct Database {
    root: PathBuf,
}

impl Database {
    /// Create a database at `path`.
    ///
    /// The directory is created when missing. A populated directory that is
    /// not already a database is always refused; an existing database is
    /// refused under [`CreateMode::New`] and reconnected under
    /// [`CreateMode::Reuse`].
    pub fn create(path: impl AsRef<Path>, mode: CreateMode) -> Result<Self, DatabaseError> {
        let root = path.as_ref().to_path_buf();
        if Self::exists(&root) {
            return match mode {
                CreateMode::New => DatabaseExistsSnafu {
                    path: root.display().to_string(),
                }
                .fail(),
                CreateMode::Reuse => Self::connect(root),
            };
        }
        if root.is_dir() {
            let entries = storage::list_dir(&root).context(StorageSnafu)?;
            ensure!(
                entries.is_empty(),
                PopulatedDirectorySnafu {
                    path: root.display().to_string(),
                }
            );
        } else {
            storage::create_dir_all(&root).context(StorageSnafu)?;
        }
        storage::write_new(&layout::db_marker_path(&root), b"").context(StorageSnafu)?;
        Ok(Self { root })
    }

    /// Connect to the database at `path`, failing when none is there.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let root = path.as_ref().to_path_buf();
        ensure!(
            Self::exists(&root),
            NotADatabaseSnafu {
                path: root.display().to_string(),
            }
        );
        Ok(Self { root })
    }

    /// Whether `path` holds a database marker.
    pub fn exists(path: impl AsRef<Path>) -> bool {
        layout::db_marker_path(path.as_ref()).is_file()
    }

    /// The database's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a store named `name`.
    pub fn create_store(&self, name: &str) -> Result<Store, DatabaseError> {
        ensure_valid_name(name)?;
        let root = layout::store_path(&self.root, name);
        match storage::create_dir(&root) {
            Ok(()) => {}
            Err(StorageError::AlreadyExists { .. }) => {
                return StoreAlreadyExistsSnafu { store: name }.fail();
            }
            Err(source) => return Err(DatabaseError::Storage { source }),
        }
        storage::create_dir(&root.join(METADATA_DIR_NAME)).context(StorageSnafu)?;
        Ok(Store {
            root,
            name: name.to_string(),
        })
    }

    /// Handle to the existing store named `name`.
    pub fn store(&self, name: &str) -> Result<Store, DatabaseError> {
        ensure_valid_name(name)?;
        let root = layout::store_path(&self.root, name);
        ensure!(is_store(&root), StoreNotFoundSnafu { store: name });
        Ok(Store {
            root,
            name: name.to_string(),
        })
    }

    /// Names of all stores, sorted, optionally filtered by a `like` pattern.
    pub fn list_stores(&self, like: Option<&str>) -> Result<Vec<String>, DatabaseError> {
        let mut names: Vec<String> = storage::list_dir(&self.root)
            .context(StorageSnafu)?
            .into_iter()
            .filter(|name| is_store(&layout::store_path(&self.root, name)))
            .collect();
        names.sort();
        match like {
            Some(pattern) => selector::filter_like(&names, pattern).context(PatternSnafu),
            None => Ok(names),
        }
    }

    /// Rename the store `from` to `to`. The target name must be free.
    pub fn rename_store(&self, from: &str, to: &str) -> Result<(), DatabaseError> {
        ensure_valid_name(to)?;
        let source = layout::store_path(&self.root, from);
        ensure!(is_store(&source), StoreNotFoundSnafu { store: from });
        let target = layout::store_path(&self.root, to);
        ensure!(!target.exists(), StoreAlreadyExistsSnafu { store: to });
        storage::rename(&source, &target).context(StorageSnafu)
    }

    /// Drop the store `name`. Refuses while the store still holds tables.
    pub fn drop_store(&self, name: &str) -> Result<(), DatabaseError> {
        let store = self.store(name)?;
        ensure!(
            store.list_tables(None)?.is_empty(),
            StoreNotEmptySnafu { store: name }
        );
        storage::remove_dir_all(store.path()).context(StorageSnafu)
    }
}

/// Handle to a store directory inside a database.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    name: String,
}

impl Store {
    /// The store's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The store's directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Handle to the table named `name`. The table need not exist yet; a
    /// full write creates it.
    pub fn table(&self, name: &str) -> Result<Table, DatabaseError> {
        ensure_valid_name(name)?;
        Ok(Table::new(self.root.join(name), name))
    }

    /// Names of all tables, sorted, optionally filtered by a `like` pattern.
    pub fn list_tables(&self, like: Option<&str>) -> Result<Vec<String>, DatabaseError> {
        let mut names: Vec<String> = storage::list_dir(&self.root)
            .context(StorageSnafu)?
            .into_iter()
            .filter(|name| name != METADATA_DIR_NAME && self.root.join(name).is_dir())
            .collect();
        names.sort();
        match like {
            Some(pattern) => selector::filter_like(&names, pattern).context(PatternSnafu),
            None => Ok(names),
        }
    }

    /// Rename the table `from` to `to`. The target name must be free.
    pub fn rename_table(&self, from: &str, to: &str) -> Result<(), DatabaseError> {
        ensure_valid_name(to)?;
        let source = self.root.join(from);
        ensure!(source.is_dir(), TableNotFoundSnafu { table: from });
        let target = self.root.join(to);
        ensure!(!target.exists(), TableAlreadyExistsSnafu { table: to });
        storage::rename(&source, &target).context(StorageSnafu)
    }

    /// Drop the table `name`, deleting its directory recursively.
    ///
    /// On platforms where deletion of a memory-mapped partition file is
    /// denied, the underlying permission error is surfaced and the drop can
    /// be retried once readers release their maps.
    pub fn drop_table(&self, name: &str) -> Result<(), DatabaseError> {
        let target = self.root.join(name);
        ensure!(target.is_dir(), TableNotFoundSnafu { table: name });
        storage::remove_dir_all(&target).context(StorageSnafu)
    }
}

/// Whether `path` looks like a store: a directory with a metadata folder.
fn is_store(path: &Path) -> bool {
    path.join(METADATA_DIR_NAME).is_dir()
}

/// Reject names the directory layout cannot represent.
fn ensure_valid_name(name: &str) -> Result<(), DatabaseError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name == DB_MARKER_NAME || name == METADATA_DIR_NAME {
        Some("name is reserved")
    } else if name == "." || name == ".." {
        Some("name is a relative path component")
    } else if name.contains('/') || name.contains('\\') {
        Some("name contains a path separator")
    } else {
        None
    };
    match reason {
        Some(reason) => InvalidNameSnafu { name, reason }.fail(),
        None => Ok(()),
    }
}
