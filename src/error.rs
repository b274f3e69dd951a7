//! Error types for depot.

use thiserror::Error;

/// Common error type for depot operations.
#[derive(Error, Debug)]
pub enum DepotError {
    /// Validation error for caller-supplied input (missing or empty field).
    #[error("validation error: {0}")]
    Validation(String),

    /// A logical name is already taken by another artifact.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The owner's plan tier does not allow another artifact.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The artifact exceeds the plan tier's size ceiling.
    #[error("size exceeded: {0}")]
    SizeExceeded(String),

    /// A chunk required for assembly was never received.
    #[error("missing chunk at index {0}")]
    MissingChunk(u32),

    /// Resource not found (unknown session, artifact, or account).
    #[error("{0} not found")]
    NotFound(String),

    /// Database error.
    ///
    /// Generic wrapper for errors from the metadata store; sqlx errors are
    /// converted automatically.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

// Conversion from sqlx errors
impl From<sqlx::Error> for DepotError {
    fn from(e: sqlx::Error) -> Self {
        DepotError::Database(e.to_string())
    }
}

/// Result type alias for depot operations.
pub type Result<T> = std::result::Result<T, DepotError>;
