//! Table protocol errors.
//!
//! Every table operation returns [`TableError`]. The variants are granular
//! so messages can carry the offending value or column, and each maps onto
//! a coarse [`ErrorKind`] so callers can dispatch without matching the full
//! enum. Wrapper variants carry failures from the layers below: storage,
//! metadata codec, batch shaping, and selection.

use arrow::error::ArrowError;
use snafu::{Backtrace, prelude::*};

use crate::frame::FrameError;
use crate::metadata::{IndexDtype, IndexValue, MetadataError};
use crate::selector::SelectorError;
use crate::storage::StorageError;

/// Errors raised by table protocols.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TableError {
    /// A filesystem operation failed.
    #[snafu(display("Storage failure: {source}"))]
    Storage {
        /// Underlying storage error.
        #[snafu(backtrace)]
        source: StorageError,
    },

    /// A metadata document could not be read or written.
    #[snafu(display("Metadata failure: {source}"))]
    Metadata {
        /// Underlying metadata error.
        #[snafu(backtrace)]
        source: MetadataError,
    },

    /// Batch shaping or partition encoding failed.
    #[snafu(display("{source}"))]
    Shape {
        /// Underlying frame error.
        #[snafu(backtrace)]
        source: FrameError,
    },

    /// A row or column selection was invalid for this table.
    #[snafu(display("{source}"))]
    Selection {
        /// Underlying selector error.
        #[snafu(backtrace)]
        source: SelectorError,
    },

    /// An Arrow kernel failed inside a protocol.
    #[snafu(display("Arrow failure while {stage}: {source}"))]
    Arrow {
        /// What the protocol was doing when the kernel failed.
        stage: &'static str,
        /// Underlying Arrow error.
        source: ArrowError,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// The table does not exist.
    #[snafu(display("Table {table:?} not found"))]
    TableNotFound {
        /// The requested table name.
        table: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// The table already exists and overwriting was not requested.
    #[snafu(display("Table {table:?} already exists"))]
    TableAlreadyExists {
        /// The conflicting table name.
        table: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// An operation received a batch with no rows.
    #[snafu(display("{operation} received no rows"))]
    EmptyData {
        /// The operation that rejected the batch.
        operation: &'static str,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A partition size or row budget of zero.
    #[snafu(display("Partition size must be positive"))]
    InvalidPartitionSize {
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A column name that is already taken or listed twice.
    #[snafu(display("Duplicate column name {column:?}"))]
    DuplicateColumns {
        /// The repeated column name.
        column: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A column name the engine reserves for its keyword arguments.
    #[snafu(display("Column name {column:?} is reserved"))]
    ReservedColumnName {
        /// The offending column name.
        column: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// The index contains (or would contain) the same value twice.
    #[snafu(display("Duplicate index value {value}"))]
    DuplicateIndexValues {
        /// The first value that repeats.
        value: IndexValue,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// The batch's column set does not match the stored schema.
    #[snafu(display("Columns do not match the stored table: expected {expected:?}, got {found:?}"))]
    ColumnsMismatch {
        /// The stored column names.
        expected: Vec<String>,
        /// The names the batch arrived with.
        found: Vec<String>,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// The batch's index class does not match the stored index.
    #[snafu(display("Index class mismatch: stored {expected}, got {found}"))]
    IndexDtypeMismatch {
        /// The stored index class.
        expected: IndexDtype,
        /// The class the batch arrived with.
        found: IndexDtype,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// New columns whose index does not reproduce the stored index.
    #[snafu(display("New columns must share the stored index exactly"))]
    IndexValuesMismatch {
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A referenced column is not in the table.
    #[snafu(display("Column {column:?} not found in the table"))]
    MissingColumn {
        /// The missing column name.
        column: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A referenced row is not in the table.
    #[snafu(display("Row {value} not found in the table"))]
    MissingRows {
        /// The first index value that could not be found.
        value: IndexValue,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// Inserted rows whose index values are already stored.
    #[snafu(display("Row {value} is already in the table"))]
    RowsAlreadyStored {
        /// The first index value that collides.
        value: IndexValue,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// Appended rows that do not extend the stored index.
    #[snafu(display(
        "Appended rows must follow the stored index: incoming minimum {incoming} \
         is not past the stored maximum {stored}"
    ))]
    OutOfOrderAppend {
        /// The smallest incoming index value.
        incoming: IndexValue,
        /// The largest stored index value.
        stored: IndexValue,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A row drop that would empty the table.
    #[snafu(display("Dropping every row is not supported; drop the table instead"))]
    DropAllRows {
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A column drop that would leave only the index.
    #[snafu(display("Dropping every column is not supported; drop the table instead"))]
    DropAllColumns {
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// An attempt to drop the index column.
    #[snafu(display("The index column {column:?} cannot be dropped"))]
    DropIndexColumn {
        /// The index column name.
        column: String,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// No room left for new partition ids between existing neighbours.
    #[snafu(display(
        "No room for {requested} new partition ids between the neighbouring \
         partitions; rewrite the table to renumber"
    ))]
    PartitionIdsExhausted {
        /// How many ids the operation needed.
        requested: usize,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },
}

/// Coarse classification of a [`TableError`].
///
/// The first seven kinds mirror the request-level failure taxonomy;
/// [`ErrorKind::Io`] collects faults below it, such as storage and codec
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A table, store, column, row, or metadata document is missing.
    NotFound,
    /// The target already exists.
    AlreadyExists,
    /// An argument has the wrong shape, type, or value.
    InvalidArgument,
    /// Column names or dtypes disagree with the stored schema.
    SchemaMismatch,
    /// The operation would violate a structural invariant.
    ConstraintViolation,
    /// Appended data does not extend the stored index.
    OutOfOrder,
    /// The operating system denied access, typically a file still mapped.
    Permission,
    /// A storage, codec, or kernel fault below the request level.
    Io,
}

impl TableError {
    /// The coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage { source } => storage_kind(source),
            Self::Metadata { source } => match source {
                MetadataError::Storage { source } => storage_kind(source),
                MetadataError::Decode { .. } | MetadataError::Encode { .. } => ErrorKind::Io,
            },
            Self::Shape { source } => match source {
                FrameError::MissingIndexColumn { .. } => ErrorKind::InvalidArgument,
                FrameError::MissingColumn { .. } | FrameError::Uncastable { .. } => {
                    ErrorKind::SchemaMismatch
                }
                FrameError::UnsupportedIndexDtype { .. } | FrameError::NullIndexValue { .. } => {
                    ErrorKind::ConstraintViolation
                }
                FrameError::Arrow { .. } => ErrorKind::Io,
            },
            Self::Selection { source } => match source {
                SelectorError::Mask { .. } => ErrorKind::Io,
                _ => ErrorKind::InvalidArgument,
            },
            Self::Arrow { .. } => ErrorKind::Io,
            Self::TableNotFound { .. } | Self::MissingColumn { .. } | Self::MissingRows { .. } => {
                ErrorKind::NotFound
            }
            Self::TableAlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::EmptyData { .. } | Self::InvalidPartitionSize { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::ColumnsMismatch { .. }
            | Self::IndexDtypeMismatch { .. }
            | Self::IndexValuesMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::DuplicateColumns { .. }
            | Self::ReservedColumnName { .. }
            | Self::DuplicateIndexValues { .. }
            | Self::RowsAlreadyStored { .. }
            | Self::DropAllRows { .. }
            | Self::DropAllColumns { .. }
            | Self::DropIndexColumn { .. }
            | Self::PartitionIdsExhausted { .. } => ErrorKind::ConstraintViolation,
            Self::OutOfOrderAppend { .. } => ErrorKind::OutOfOrder,
        }
    }
}

fn storage_kind(source: &StorageError) -> ErrorKind {
    match source {
        StorageError::NotFound { .. } => ErrorKind::NotFound,
        StorageError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
        StorageError::Permission { .. } => ErrorKind::Permission,
        StorageError::OtherIo { .. } => ErrorKind::Io,
    }
}

/// Convenience alias for results returned by table protocols.
#[allow(clippy::result_large_err)]
pub type TableResult<T> = Result<T, TableError>;
