//! Error types for the webhook provider
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for webhook provider operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the webhook provider
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Domain filter construction errors (e.g. a regex that does not compile)
    #[error("Domain filter error: {0}")]
    Filter(String),

    /// Undecodable provider responses
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport failures talking to the provider API
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a domain filter error
    pub fn filter(msg: impl Into<String>) -> Self {
        Self::Filter(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_names_the_provider() {
        let err = Error::provider("dreamhost", "no_such_record");
        assert_eq!(err.to_string(), "Provider error (dreamhost): no_such_record");
    }

    #[test]
    fn json_errors_convert() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().starts_with("JSON error"));
    }
}
