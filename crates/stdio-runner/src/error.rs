//! Error types for stdio-runner

use thiserror::Error;

/// Result type alias for supervisor operations
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Errors that can occur while starting or driving the child process
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Failed to spawn the child process
    #[error("Failed to spawn child process: {message}")]
    SpawnFailed {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Create a SpawnFailed error
    pub fn spawn_failed(message: impl Into<String>) -> Self {
        Self::SpawnFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a SpawnFailed error with source
    pub fn spawn_failed_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::SpawnFailed {
            message: message.into(),
            source: Some(source),
        }
    }
}
