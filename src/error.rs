//! Error types for the contact-messenger library.
//!
//! This module provides custom error types using `thiserror`. The variants mirror the
//! failure classes the client distinguishes: transport failures, server rejections,
//! malformed timestamps, and input rejected before any request is made.

use thiserror::Error;

/// Errors that can occur in the contact-messenger client.
#[derive(Error, Debug)]
pub enum MessengerError {
    /// Server unreachable, connection reset, or request timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response carrying a human-readable message
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Message from the response payload
        message: String,
    },

    /// Timestamp that does not parse to a valid point in time
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Malformed user input, rejected before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// No auth token in durable storage
    #[error("Not authenticated: log in first")]
    NotAuthenticated,

    /// Operation needs an open conversation
    #[error("No conversation is open")]
    NoOpenConversation,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV writer errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Convenience type alias for Result with `MessengerError`
pub type Result<T> = std::result::Result<T, MessengerError>;

impl MessengerError {
    /// Build a validation error from any displayable message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether a foreground action should show this error to the user.
    ///
    /// Timestamp errors are rendered as a placeholder instead.
    #[must_use]
    pub const fn is_user_visible(&self) -> bool {
        !matches!(self, Self::InvalidTimestamp(_))
    }

    /// Transport-level failures, as opposed to rejections by the server
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for MessengerError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Server {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("An error occurred").to_string(),
            };
        }
        if err.is_decode() {
            return Self::Server {
                status: 200,
                message: "Invalid response from server".to_string(),
            };
        }
        if err.is_connect() {
            return Self::Network("Cannot connect to server. Please check your internet connection.".to_string());
        }
        Self::Network(err.to_string())
    }
}

impl From<config::ConfigError> for MessengerError {
    fn from(err: config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_errors_are_not_user_visible() {
        assert!(!MessengerError::InvalidTimestamp("bogus".into()).is_user_visible());
        assert!(MessengerError::Network("down".into()).is_user_visible());
        assert!(MessengerError::validation("empty").is_user_visible());
    }

    #[test]
    fn test_server_error_display() {
        let err = MessengerError::Server {
            status: 404,
            message: "Recipient not found".into(),
        };
        assert_eq!(err.to_string(), "Server error (404): Recipient not found");
    }
}
