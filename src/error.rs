//! Error types for the record store and transaction engine.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while loading, mutating or persisting the workbook.
///
/// Every variant is recoverable from the caller's point of view except
/// `Format`: a missing file means "initialize empty", `Permission` means the
/// workbook is open elsewhere and the user must close it and resubmit,
/// `Validation` and `Conflict` are rejected before any persist.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The workbook file does not exist
    #[error("workbook not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The workbook is open or locked by another process
    #[error("workbook is open in another program, close it and retry: {}", .0.display())]
    Permission(PathBuf),

    /// Unreadable or corrupt workbook content
    #[error("unreadable workbook content in table '{table}': {message}")]
    Format { table: String, message: String },

    /// A mutation was rejected before persisting
    #[error("validation failed: {0}")]
    Validation(String),

    /// The workbook changed on disk since it was last seen
    #[error("workbook was modified externally since last load; reload or override")]
    Conflict,

    /// Underlying I/O failure not covered by a domain variant
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failure while writing a table
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Missing command-line argument
    #[error("usage: order-ledger <init|report> <workbook>")]
    MissingArgument,
}

impl StoreError {
    /// Maps raw I/O errors to the domain taxonomy at the file boundary.
    pub(crate) fn from_io(err: std::io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => StoreError::Permission(path.to_path_buf()),
            _ => StoreError::Io(err),
        }
    }
}
