//! Error types for the registry gateway client.

use thiserror::Error;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors talking to the registry gateway.
#[derive(Error, Debug)]
pub enum Error {
    /// The gateway answered with a non-success status.
    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not what the endpoint promises.
    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// Configuration error.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// HTTP error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Create a status error.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Create a config error.
    pub fn config_error(reason: impl Into<String>) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }

    /// Convert into the error a chain read reports.
    #[must_use]
    pub fn into_read_error(self) -> avs_sync_core::Error {
        avs_sync_core::Error::read_failed(self.to_string())
    }

    /// Convert into the error a chain write reports.
    #[must_use]
    pub fn into_write_error(self) -> avs_sync_core::Error {
        avs_sync_core::Error::write_failed(self.to_string())
    }
}
