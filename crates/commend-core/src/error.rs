//! Error types for the commend platform core.

use thiserror::Error;

/// Result type alias using commend's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for commend operations.
///
/// Every domain failure is an expected, typed outcome recovered at the
/// operation boundary. Only store-level faults (`Database`) represent an
/// unexpected infrastructure error.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No caller identity was supplied
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Identity present but lacks rights (ownership/role/status mismatch)
    #[error("Not permitted")]
    Forbidden,

    /// Field-level constraint violation (length, range, required)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Duplicate review/edge/vote or slug collision
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing entity/review/edge
    #[error("Not found: {0}")]
    NotFound(String),

    /// Entity not found
    #[error("Entity not found: {0}")]
    EntityNotFound(uuid::Uuid),

    /// Review not found
    #[error("Review not found: {0}")]
    ReviewNotFound(uuid::Uuid),

    /// Rejected by the external rate-limit collaborator
    #[error("Rate limited, retry in {retry_after_secs}s")]
    RateLimited {
        /// Seconds the caller should wait before retrying.
        retry_after_secs: u64,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
