//! Error types for the supervisor

use std::io;
use thiserror::Error;

/// Errors returned by supervisor operations
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Caller-supplied id is already registered (or reserved by an in-flight start)
    #[error("Process id '{id}' already exists")]
    DuplicateId { id: String },

    /// The OS refused to create the process
    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    /// No process is registered under this id
    #[error("Process '{id}' not found")]
    NotFound { id: String },

    /// The output filter is not a valid regular expression
    #[error("Invalid filter pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Configuration could not be read or written
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SupervisorError {
    pub(crate) fn not_found(id: &str) -> Self {
        Self::NotFound { id: id.to_string() }
    }
}

/// Result type for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;
