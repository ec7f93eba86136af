//! Error types for Strata core.

use thiserror::Error;
use uuid::Uuid;

/// Result type for core operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in Strata core operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] strata_storage::StorageError),

    /// Encoding or field decoding error.
    #[error("codec error: {0}")]
    Codec(#[from] strata_codec::CodecError),

    /// No entity at the given id or uuid.
    #[error("{entity_type} not found: {key}")]
    NotFound {
        /// Entity type that was searched.
        entity_type: String,
        /// The id or uuid that was looked up.
        key: String,
    },

    /// Version or state mismatch against an expected value.
    #[error("conflict on {entity_type}: {message}")]
    Conflict {
        /// Entity type the conflict occurred on.
        entity_type: String,
        /// Description of the mismatch.
        message: String,
    },

    /// A capability is absent on the entity type or backend.
    #[error("unsupported operation: {message}")]
    UnsupportedOperation {
        /// What was attempted and why it is unavailable.
        message: String,
    },

    /// A fail-fast hook vetoed the operation; nothing was written.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for abort.
        reason: String,
    },

    /// Best-effort hooks failed after the primary write committed.
    #[error("{entity_type} {uuid} was written but {} hook(s) failed: {}", .failures.len(), .failures.join("; "))]
    PartialFailure {
        /// Entity type of the committed write.
        entity_type: String,
        /// Universal identifier of the committed entity.
        uuid: Uuid,
        /// One line per failed hook.
        failures: Vec<String>,
    },

    /// A transaction was requested from inside an active transaction body.
    #[error("nested transaction requested inside an active transaction")]
    NestedTransaction,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// The commit journal is corrupted.
    #[error("journal corruption: {message}")]
    JournalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected in a journal frame.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },
}

impl StoreError {
    /// Creates a not found error.
    pub fn not_found(entity_type: impl Into<String>, key: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            key: key.to_string(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(entity_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            entity_type: entity_type.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            message: message.into(),
        }
    }

    /// Creates a transaction aborted error.
    ///
    /// Handlers return this to veto a save or delete.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a journal corruption error.
    pub fn journal_corruption(message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            message: message.into(),
        }
    }

    /// Returns true for [`StoreError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for [`StoreError::Conflict`].
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true for [`StoreError::UnsupportedOperation`].
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedOperation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_message_lists_hooks() {
        let err = StoreError::PartialFailure {
            entity_type: "task".into(),
            uuid: Uuid::nil(),
            failures: vec!["cache: down".into(), "outbox: full".into()],
        };
        let text = err.to_string();
        assert!(text.contains("2 hook(s) failed"));
        assert!(text.contains("cache: down; outbox: full"));
    }

    #[test]
    fn classification_helpers() {
        assert!(StoreError::not_found("task", 7).is_not_found());
        assert!(StoreError::conflict("task", "stale").is_conflict());
        assert!(StoreError::unsupported("search").is_unsupported());
        assert!(!StoreError::NestedTransaction.is_not_found());
    }
}
