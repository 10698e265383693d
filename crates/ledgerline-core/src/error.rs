//! Error types for ledgerline

use thiserror::Error;

/// Result type alias for ledgerline operations.
pub type Result<T, E = AuditError> = std::result::Result<T, E>;

/// Errors surfaced by the audit pipeline and query services.
#[derive(Debug, Error)]
pub enum AuditError {
    /// One or more caller-supplied parameters were rejected.
    ///
    /// Carries the full message list so a caller can surface every
    /// violation at once instead of one per round trip.
    #[error("validation failed: {}", messages.join("; "))]
    Validation {
        /// Human-readable description of each violation.
        messages: Vec<String>,
    },

    /// A column value could not be serialized into the audit record.
    ///
    /// Fatal to the audit write: committing with a partial diff would
    /// corrupt the trail.
    #[error("failed to serialize column '{column}': {source}")]
    Serialization {
        /// The column whose value failed to encode.
        column: String,
        /// The underlying encoder error.
        source: serde_json::Error,
    },

    /// An entry was finalized while store-generated columns were still pending.
    #[error("unresolved store-generated columns on '{entity}': {columns:?}")]
    Unresolved {
        /// Entity whose entry is incomplete.
        entity: String,
        /// Columns still awaiting their post-commit value.
        columns: Vec<String>,
    },

    /// The durable log store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Export artifact assembly failed after validation.
    #[error("export failed: {0}")]
    Export(String),
}

impl AuditError {
    /// Create a validation error with a single message.
    pub fn validation(message: impl Into<String>) -> Self {
        AuditError::Validation {
            messages: vec![message.into()],
        }
    }

    /// Create a validation error from a list of messages.
    pub fn validation_all(messages: Vec<String>) -> Self {
        AuditError::Validation { messages }
    }
}

/// Errors that can occur in a log store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to append log records.
    #[error("failed to write log records: {0}")]
    Write(String),

    /// Failed to read log records.
    #[error("failed to read log records: {0}")]
    Read(String),

    /// The store refused the append because it is at capacity.
    #[error("log storage is full")]
    StorageFull,

    /// Record encoding/decoding failed inside the store.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
