//! Error types for tallysync-core

use thiserror::Error;

/// Main error type for tallysync-core
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type with CoreError
pub type CoreResult<T> = Result<T, CoreError>;
