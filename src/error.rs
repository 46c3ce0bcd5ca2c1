//! Crate-wide error types.

use thiserror::Error;

/// Failures raised by the durable draft store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open draft store: {0}")]
    Open(String),

    #[error("draft store query failed: {0}")]
    Query(String),

    #[error("failed to (de)serialize draft state: {0}")]
    Serialization(String),
}

#[cfg(feature = "libsql")]
impl From<libsql::Error> for StoreError {
    fn from(err: libsql::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Configuration validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// The driven session's task has exited; its handle can no longer be used.
#[derive(Debug, Error)]
#[error("draft session is closed")]
pub struct SessionClosed;
