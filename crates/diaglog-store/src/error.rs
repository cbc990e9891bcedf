//! Error types for the log store.

use thiserror::Error;

/// Errors surfaced by the store's fallible operations.
///
/// Logging itself never fails; these come from export, filters and sinks.
#[derive(Debug, Error)]
pub enum LogError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred while writing an artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The filter pattern could not be compiled.
    #[error("invalid filter: {0}")]
    InvalidFilter(#[from] regex::Error),

    /// The remote sink could not deliver an entry.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for LogError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Errors from installing process-wide diagnostic capture.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// Capture hooks were already installed in this process.
    #[error("diagnostic capture already installed")]
    AlreadyInstalled,
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, LogError>;
