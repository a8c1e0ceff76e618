//! Error types for record and document-store operations.
//!
//! Validation errors (configuration, construction, identity, parent, state)
//! are raised before any store call. Store failures are passed through
//! unchanged.

use thiserror::Error;

/// Errors that can occur while resolving addresses or persisting records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Configuration is missing or incomplete at the time of use.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A record was constructed without a viable addressing strategy.
    #[error("invalid construction: {0}")]
    InvalidConstruction(String),

    /// Collection name or unique id is empty or malformed.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// A nested collection was requested from a record whose own address
    /// cannot be resolved.
    #[error("unresolved parent: {0}")]
    UnresolvedParent(String),

    /// A store mutation was requested before the first successful save.
    #[error("record not persisted: {0}")]
    NotPersisted(String),

    /// The document-store client failed or could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The addressed document does not exist.
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// Malformed document or collection path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Database error from SQLx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type alias for record operations.
pub type Result<T> = std::result::Result<T, RecordError>;

impl RecordError {
    /// Returns true if retrying the same call may succeed.
    ///
    /// This layer never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RecordError::StoreUnavailable(_) | RecordError::Database(_)
        )
    }

    /// Returns true for errors raised before any store call was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RecordError::Configuration(_)
                | RecordError::InvalidConstruction(_)
                | RecordError::InvalidIdentity(_)
                | RecordError::UnresolvedParent(_)
                | RecordError::NotPersisted(_)
                | RecordError::InvalidPath(_)
        )
    }
}

impl From<serde_json::Error> for RecordError {
    fn from(err: serde_json::Error) -> Self {
        RecordError::Serialization(err.to_string())
    }
}
