//! Error types for RecoFine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vectorization error: {0}")]
    Vectorize(String),

    #[error("Matrix error: {0}")]
    Matrix(String),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a later invocation may succeed without any change to data or
    /// configuration (connection loss, lock contention).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
