//! Error types for distsync core.

use crate::record::NaturalKey;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in a reconciliation run.
///
/// Per-record foreign-key failures are *not* errors; they are collected as
/// [`crate::ResolutionFailure`]s in the plan and reported as skipped.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Store error outside of the apply step (reading, opening).
    #[error("storage error: {0}")]
    Storage(#[from] distsync_storage::StorageError),

    /// The run options are invalid; nothing was read or written.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// The schema itself is inconsistent.
    #[error("invalid schema: {message}")]
    Schema {
        /// Description of the problem.
        message: String,
    },

    /// An entity type name is not part of the schema.
    #[error("unknown entity type: {name}")]
    UnknownEntity {
        /// The unknown name.
        name: String,
    },

    /// A store returned two rows with the same natural key.
    #[error("duplicate natural key {key} in {side} store for {entity}")]
    DuplicateKey {
        /// Entity type name.
        entity: String,
        /// Which store ("source" or "destination").
        side: &'static str,
        /// The duplicated key.
        key: NaturalKey,
    },

    /// A row could not be turned into a record.
    #[error("malformed {entity} row {row}: {message}")]
    MalformedRow {
        /// Entity type name.
        entity: String,
        /// Store-local row identifier.
        row: distsync_storage::StorageId,
        /// Description of the problem.
        message: String,
    },

    /// An operation failed while applying a plan; the transaction was rolled back.
    #[error("apply failed on {entity} {operation} {key}: {source}")]
    Apply {
        /// Entity type of the failing operation.
        entity: String,
        /// Operation kind ("clear", "insert", "update", "delete", "commit").
        operation: &'static str,
        /// Natural key of the affected record (empty for clear / commit).
        key: String,
        /// Underlying store error.
        #[source]
        source: distsync_storage::StorageError,
    },

    /// Rolling back after a failed apply also failed.
    #[error("rollback failed after {original}: {rollback}")]
    RollbackFailed {
        /// The error that triggered the rollback.
        original: Box<CoreError>,
        /// The rollback error.
        rollback: distsync_storage::StorageError,
    },
}

impl CoreError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Returns true if the error was detected before any store was touched.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CoreError::Config { .. } | CoreError::Schema { .. } | CoreError::UnknownEntity { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distsync_storage::StorageError;

    #[test]
    fn apply_error_names_entity_operation_and_key() {
        let err = CoreError::Apply {
            entity: "backends".into(),
            operation: "insert",
            key: "(wikidata)".into(),
            source: StorageError::Unavailable("connection reset".into()),
        };
        let text = err.to_string();
        assert!(text.contains("backends"));
        assert!(text.contains("insert"));
        assert!(text.contains("(wikidata)"));
        assert!(text.contains("connection reset"));
    }

    #[test]
    fn configuration_errors() {
        assert!(CoreError::config("no entity types").is_configuration());
        assert!(CoreError::UnknownEntity { name: "x".into() }.is_configuration());
        assert!(!CoreError::Storage(StorageError::NoTransaction).is_configuration());
    }
}
