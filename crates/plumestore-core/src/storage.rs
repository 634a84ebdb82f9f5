//! Local filesystem primitives.
//!
//! This module centralizes every raw filesystem touch the engine makes:
//!
//! - Atomic document replacement (write-to-temp-then-rename) used when
//!   publishing metadata and partition files.
//! - Create-new writes for paths that must not already exist.
//! - Whole-file and memory-mapped reads of immutable partition files.
//! - Directory bookkeeping (create/list/remove/rename).
//!
//! Raw `io::Error`s are classified into a small [`StorageError`] taxonomy so
//! higher layers can react to missing paths, existing paths, and denied
//! access without inspecting platform error codes. Everything here is
//! synchronous and blocking; the engine runs single-threaded by design.

use memmap2::Mmap;
use snafu::{Backtrace, prelude::*};
use std::{
    error::Error,
    fmt, fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors produced by the storage backend implementation.
///
/// Currently only the local filesystem is supported; backend-specific I/O
/// errors are wrapped in this enum so higher layers can map them into
/// [`StorageError`] variants with additional context.
#[derive(Debug)]
pub enum BackendError {
    /// A local filesystem I/O error.
    Local(io::Error),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Local(e) => write!(f, "local I/O error: {e}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BackendError::Local(e) => Some(e),
        }
    }
}

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
pub enum StorageError {
    /// The specified path was not found.
    #[snafu(display("Path not found: {path}"))]
    NotFound {
        /// The path that was not found.
        path: String,
        /// Underlying backend error that caused the failure.
        source: BackendError,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// The specified path already exists when creation was requested with
    /// create-new semantics.
    #[snafu(display("Path already exists: {path}"))]
    AlreadyExists {
        /// The path that was found to already exist.
        path: String,
        /// Underlying backend error that indicates the existing resource.
        source: BackendError,
        /// The backtrace captured when the error occurred.
        backtrace: Backtrace,
    },

    /// The operating system denied access to the path. On some platforms
    /// this is how deleting or replacing a file that is still memory-mapped
    /// (or open elsewhere) surfaces; the operation is safe to retry once the
    /// mapping is released.
    #[snafu(display("Access denied at {path}: {source}"))]
    Permission {
        /// The path where access was denied.
        path: String,
        /// Underlying backend error with platform-specific details.
        source: BackendError,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// An I/O error occurred on the local filesystem.
    #[snafu(display("Local I/O error at {path}: {source}"))]
    OtherIo {
        /// The path where the I/O error occurred.
        path: String,
        /// Underlying backend I/O error with platform-specific details.
        source: BackendError,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },
}

/// Map a raw `io::Error` at `path` to the matching [`StorageError`] variant.
fn classify(path: &Path, err: io::Error) -> StorageError {
    let path = path.display().to_string();
    let kind = err.kind();
    let source = BackendError::Local(err);
    let backtrace = Backtrace::capture();
    match kind {
        io::ErrorKind::NotFound => StorageError::NotFound {
            path,
            source,
            backtrace,
        },
        io::ErrorKind::AlreadyExists => StorageError::AlreadyExists {
            path,
            source,
            backtrace,
        },
        io::ErrorKind::PermissionDenied => StorageError::Permission {
            path,
            source,
            backtrace,
        },
        _ => StorageError::OtherIo {
            path,
            source,
            backtrace,
        },
    }
}

fn create_parent_dir(abs: &Path) -> StorageResult<()> {
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent).map_err(|e| classify(parent, e))?;
    }
    Ok(())
}

/// Guard that removes a temporary file on drop unless disarmed.
/// Used to ensure cleanup on error paths during atomic writes.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Disarm the guard so the file is NOT removed on drop.
    /// Call this after a successful rename.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best-effort cleanup; we are most likely already on an error path.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Write `contents` to `path` using an atomic replacement.
///
/// This performs a write-then-rename sequence: it writes the payload to a
/// temporary file next to the target path, syncs the file, and then renames
/// it into place. A reader that opens `path` concurrently observes either
/// the previous contents or the new contents, never a partial write.
///
/// # Errors
///
/// Returns a classified [`StorageError`] when filesystem I/O fails; on
/// failure the temporary file is removed and the target is left untouched.
pub fn write_atomic(path: &Path, contents: &[u8]) -> StorageResult<()> {
    create_parent_dir(path)?;

    let tmp_path = path.with_extension("tmp");
    let mut guard = TempFileGuard::new(tmp_path.clone());

    {
        let mut file = fs::File::create(&tmp_path).map_err(|e| classify(&tmp_path, e))?;
        file.write_all(contents)
            .map_err(|e| classify(&tmp_path, e))?;
        file.sync_all().map_err(|e| classify(&tmp_path, e))?;
    }

    fs::rename(&tmp_path, path).map_err(|e| classify(path, e))?;

    // Success: the temp file has been renamed away, nothing to clean up.
    guard.disarm();

    Ok(())
}

/// Create a *new* file at `path` and write `contents`, failing with
/// [`StorageError::AlreadyExists`] if the file is already present.
///
/// Used for sentinel files where first-creation must be detected.
pub fn write_new(path: &Path, contents: &[u8]) -> StorageResult<()> {
    create_parent_dir(path)?;

    // Atomic "create only if not exists" on the target path.
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| classify(path, e))?;

    file.write_all(contents).map_err(|e| classify(path, e))?;
    file.sync_all().map_err(|e| classify(path, e))?;

    Ok(())
}

/// Read the full contents of the file at `path`.
///
/// # Errors
///
/// Returns [`StorageError::NotFound`] if the file does not exist and a
/// classified [`StorageError`] for any other I/O failure.
pub fn read_all_bytes(path: &Path) -> StorageResult<Vec<u8>> {
    fs::read(path).map_err(|e| classify(path, e))
}

/// Memory-map the file at `path` read-only.
///
/// The returned mapping borrows nothing and stays valid until dropped. The
/// mapping must be released before the backing file can be deleted on
/// platforms that lock mapped files; such deletions surface as
/// [`StorageError::Permission`].
pub fn mmap_readonly(path: &Path) -> StorageResult<Mmap> {
    let file = fs::File::open(path).map_err(|e| classify(path, e))?;
    // SAFETY: partition files are immutable once published. Mutations write
    // a new file and retire the old one, so a live mapping never observes
    // concurrent modification of its backing file.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| classify(path, e))?;
    Ok(mmap)
}

/// Rename `from` to `to`.
pub fn rename(from: &Path, to: &Path) -> StorageResult<()> {
    fs::rename(from, to).map_err(|e| classify(from, e))
}

/// Remove the file at `path`.
pub fn remove_file(path: &Path) -> StorageResult<()> {
    fs::remove_file(path).map_err(|e| classify(path, e))
}

/// Remove the directory at `path` and everything below it.
pub fn remove_dir_all(path: &Path) -> StorageResult<()> {
    fs::remove_dir_all(path).map_err(|e| classify(path, e))
}

/// Create the directory at `path`; the parent must already exist.
pub fn create_dir(path: &Path) -> StorageResult<()> {
    fs::create_dir(path).map_err(|e| classify(path, e))
}

/// Create the directory at `path` together with any missing parents.
pub fn create_dir_all(path: &Path) -> StorageResult<()> {
    fs::create_dir_all(path).map_err(|e| classify(path, e))
}

/// List the entry names (files and directories) directly under `path`.
///
/// Order is unspecified; callers sort when they need determinism.
pub fn list_dir(path: &Path) -> StorageResult<Vec<String>> {
    let entries = fs::read_dir(path).map_err(|e| classify(path, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| classify(path, e))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}
