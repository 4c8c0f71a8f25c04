//! Error types for skysync-core

use thiserror::Error;

/// Result type alias using skysync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by configuration, storage and store-backed operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote object storage error
    #[error("Storage error: {0}")]
    Storage(String),
}
