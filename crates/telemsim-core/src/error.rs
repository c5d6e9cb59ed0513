//! Error types for the simulation engine

use thiserror::Error;

/// Convenience alias for results using [`SimError`]
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that can occur while running the simulator
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
