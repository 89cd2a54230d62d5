use thiserror::Error;

/// Signal source query errors
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Signal source unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),
}

/// Resource control plane errors
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Revision not found: {0}")]
    RevisionNotFound(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Control plane unavailable: {0}")]
    Unavailable(String),
}

/// Database operation errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}
