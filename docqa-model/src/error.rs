//! Error types for the `docqa-model` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to a chat-completion provider.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// The provider rejected the request because of rate limiting.
    #[error("rate limit exceeded ({provider}): {message}")]
    RateLimited {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The provider is overloaded or temporarily unable to serve requests.
    #[error("service unavailable ({provider}): {message}")]
    ServiceUnavailable {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The provider answered with a non-success status that is neither
    /// rate limiting nor unavailability.
    #[error("API error ({provider}) {status}: {message}")]
    Api {
        /// The provider that produced the error.
        provider: String,
        /// HTTP status code returned by the provider.
        status: u16,
        /// A description of the failure.
        message: String,
    },

    /// The request could not be sent or the connection failed.
    #[error("request failed ({provider}): {message}")]
    Request {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The provider answered with a body that could not be understood.
    #[error("invalid response ({provider}): {message}")]
    InvalidResponse {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// No stream fragment arrived within the configured idle timeout.
    #[error("stream idle for more than {0:?}")]
    StreamTimeout(Duration),

    /// A configuration validation error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ModelError {
    /// Classify a non-success HTTP status returned by `provider`.
    ///
    /// `429` is rate limiting, `500`/`502`/`503` are treated as the
    /// provider being overloaded, anything else is a plain API error.
    pub fn from_status(provider: &str, status: u16, message: impl Into<String>) -> Self {
        let provider = provider.to_string();
        let message = message.into();
        match status {
            429 => Self::RateLimited { provider, message },
            500 | 502 | 503 => Self::ServiceUnavailable { provider, message },
            _ => Self::Api { provider, status, message },
        }
    }
}

/// A convenience result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            ModelError::from_status("OpenAI", 429, "slow down"),
            ModelError::RateLimited { .. }
        ));
        assert!(matches!(
            ModelError::from_status("OpenAI", 503, "busy"),
            ModelError::ServiceUnavailable { .. }
        ));
        assert!(matches!(
            ModelError::from_status("OpenAI", 502, "bad gateway"),
            ModelError::ServiceUnavailable { .. }
        ));
        assert_eq!(
            ModelError::from_status("OpenAI", 401, "bad key"),
            ModelError::Api { provider: "OpenAI".into(), status: 401, message: "bad key".into() }
        );
    }
}
