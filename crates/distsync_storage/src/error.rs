//! Error types for store operations.

use crate::row::StorageId;
use distsync_codec::CodecError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store file could not be decoded.
    #[error("store file corrupted: {0}")]
    Codec(#[from] CodecError),

    /// The store file does not exist.
    #[error("store not found at {}", path.display())]
    NotFound {
        /// The path that was expected to hold a store.
        path: PathBuf,
    },

    /// Attempted to create a store where one already exists.
    #[error("store already exists at {}", path.display())]
    AlreadyExists {
        /// The existing path.
        path: PathBuf,
    },

    /// No row with this identifier exists in the table.
    #[error("no row {id} in table {table}")]
    RowNotFound {
        /// Table name.
        table: String,
        /// The missing identifier.
        id: StorageId,
    },

    /// A write would duplicate a unique column combination.
    #[error("unique constraint violated on {table}({}): {value}", fields.join(", "))]
    UniqueViolation {
        /// Table name.
        table: String,
        /// Columns of the violated constraint.
        fields: Vec<String>,
        /// The duplicated value, rendered for display.
        value: String,
    },

    /// `begin_transaction` was called while a transaction is open.
    #[error("a transaction is already active")]
    TransactionActive,

    /// `commit` or `rollback` was called without an open transaction.
    #[error("no active transaction")]
    NoTransaction,

    /// The backend could not serve the request (lost connection, injected fault, ...).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
