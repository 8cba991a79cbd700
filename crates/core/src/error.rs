//! Core error types for chain access and domain parsing.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.

use thiserror::Error;

/// The standard Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for avs-sync operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    // Chain errors
    #[error("chain read failed: {reason}")]
    ReadFailed { reason: String },

    #[error("chain write failed: {reason}")]
    WriteFailed { reason: String },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    // Parsing errors
    #[error("invalid address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("invalid quorum '{input}': {reason}")]
    InvalidQuorum { input: String, reason: String },

    // Metrics backend errors
    #[error("metrics error: {reason}")]
    Metrics { reason: String },
}

impl Error {
    /// Create a chain read error.
    pub fn read_failed(reason: impl Into<String>) -> Self {
        Self::ReadFailed {
            reason: reason.into(),
        }
    }

    /// Create a chain write error.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }

    /// Create a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create an invalid address error.
    pub fn invalid_address(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid quorum error.
    pub fn invalid_quorum(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQuorum {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a metrics error.
    pub fn metrics(reason: impl Into<String>) -> Self {
        Self::Metrics {
            reason: reason.into(),
        }
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Self::metrics(err.to_string())
    }
}
