use thiserror::Error;

/// Errors from repository operations (used by the store traits in magnet-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("blob storage error: {0}")]
    Blob(String),
}
