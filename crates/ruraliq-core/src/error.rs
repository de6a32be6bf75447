//! Error types for ruraliq-core

use thiserror::Error;

use crate::sync::TransportError;

/// Result type alias using ruraliq-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ruraliq-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local persistence failed (write rejected, disk full, corrupt file)
    #[error("Storage error: {0}")]
    Storage(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Report not found
    #[error("Report not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote ingestion endpoint failure that was not absorbed by the caller
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    /// Whether this error came from the local persistence layer.
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::LibSql(_) | Self::Io(_))
    }
}
