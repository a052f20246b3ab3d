//! Error types for backing-store operations
//!
//! Covers connecting to a store, running statistics commands against it,
//! and reading the configured store list.

use thiserror::Error;

/// Result type alias for backing-store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error raised by a backing store or store catalog
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection to the store could not be established
    #[error("Connection to {store} ({endpoint}) failed{}", source_suffix(.source))]
    ConnectionFailed {
        store: String,
        /// Redacted connection string
        endpoint: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A command sent to the store returned an error
    #[error("Command '{command}' failed on {store}: {message}")]
    Command {
        store: String,
        command: String,
        message: String,
    },

    /// Operation timed out
    #[error("Operation '{operation}' on {store} timed out after {duration_secs} seconds")]
    Timeout {
        store: String,
        operation: String,
        duration_secs: u64,
    },

    /// Statistics reply was missing a field or held a non-numeric value
    #[error("Statistics from {store} have no usable '{field}' field")]
    InvalidStats { store: String, field: String },

    /// Store entry is unusable
    #[error("Invalid configuration for {store}: {message}")]
    InvalidConfig { store: String, message: String },

    /// Connection was closed by a reload or shutdown
    #[error("Connection to {store} is closed")]
    Closed { store: String },

    /// The store list could not be read
    #[error("Failed to read store catalog: {0}")]
    Catalog(String),
}

fn source_suffix(source: &Option<Box<dyn std::error::Error + Send + Sync>>) -> String {
    match source {
        Some(src) => format!(": {}", src),
        None => String::new(),
    }
}

impl StoreError {
    /// Check if this error is transient (worth retrying later)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailed { .. }
                | StoreError::Timeout { .. }
                | StoreError::Closed { .. }
        )
    }

    /// Get the store name associated with this error, if any
    pub fn store_name(&self) -> Option<&str> {
        match self {
            StoreError::ConnectionFailed { store, .. }
            | StoreError::Command { store, .. }
            | StoreError::Timeout { store, .. }
            | StoreError::InvalidStats { store, .. }
            | StoreError::InvalidConfig { store, .. }
            | StoreError::Closed { store } => Some(store),
            StoreError::Catalog(_) => None,
        }
    }
}
