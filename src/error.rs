//! Error Module
//!
//! Defines error types and result types used throughout the Felix file server.

use thiserror::Error;

/// Main error type for Felix
#[derive(Error, Debug, Clone)]
pub enum FelixError {
    #[error("IO error: {0}")]
    IoError(String),

    /// Opening or reading a file for retrieval failed. Nothing was cached.
    #[error("Disk read failure: {0}")]
    DiskReadFailure(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("System error: {0}")]
    SystemError(String),
}

impl From<std::io::Error> for FelixError {
    fn from(err: std::io::Error) -> Self {
        FelixError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for FelixError {
    fn from(err: serde_json::Error) -> Self {
        FelixError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for FelixError {
    fn from(err: serde_yaml::Error) -> Self {
        FelixError::SerializationError(err.to_string())
    }
}

/// Result type alias for Felix
pub type Result<T> = std::result::Result<T, FelixError>;
