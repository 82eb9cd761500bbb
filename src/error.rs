//! Error types for the state store.

use thiserror::Error;

/// Main error type for store operations.
///
/// Most store operations are infallible by construction: path reads yield
/// `None`, unknown actions are broadcast, and out-of-range history
/// navigation reports `false`. The variants here cover the remaining cases.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Handler already registered for action: {0}")]
    HandlerExists(String),

    #[error("Handler for {action} failed: {reason}")]
    Handler { action: String, reason: String },

    #[error("Store already registered: {0}")]
    StoreExists(String),

    #[error("Store not found: {0}")]
    StoreNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    /// Build a handler failure for the named action.
    pub fn handler(action: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::Handler {
            action: action.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            StoreError::Deserialization(e.to_string())
        } else {
            StoreError::Serialization(e.to_string())
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
