//! Error types for OTA client operations

use thiserror::Error;

/// Result type alias for OTA client operations
pub type Result<T> = std::result::Result<T, OtaClientError>;

/// Errors that can occur during OTA client operations
#[derive(Error, Debug)]
pub enum OtaClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Server returned an error response
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Device or its firmware not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Timeout
    #[error("Request timed out")]
    Timeout,
}

impl OtaClientError {
    /// Create a server error from status code and message
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            message: message.into(),
        }
    }

    /// HTTP status reported by the server, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServerError { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            _ => None,
        }
    }
}
