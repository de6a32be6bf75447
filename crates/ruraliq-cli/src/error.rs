use std::io;

use ruraliq_core::config::ConfigError;
use ruraliq_core::sync::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] ruraliq_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No report description provided")]
    EmptyDescription,
    #[error("Image not found: {0}")]
    ImageNotFound(String),
    #[error("Sync failed: {0}")]
    SyncFailed(String),
}
