//! Error types for the `docqa-voice` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in the translation and voice bridge.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum VoiceError {
    /// Neither query text nor an audio reference was supplied.
    #[error("Either 'Query Text' or 'Audio URL' should be present")]
    MissingInput,

    /// Every provider for a capability failed.
    #[error("{capability} is unavailable at the moment. Please try again later")]
    ServiceUnavailable {
        /// The capability that could not be served.
        capability: &'static str,
    },

    /// A single provider call failed.
    #[error("{provider} request failed: {message}")]
    Provider {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A single provider call did not finish in time.
    #[error("{provider} did not respond within {timeout:?}")]
    Timeout {
        /// The provider that timed out.
        provider: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The referenced audio could not be loaded.
    #[error("audio error: {0}")]
    Audio(String),
}

impl VoiceError {
    pub(crate) fn provider(provider: &str, message: impl Into<String>) -> Self {
        Self::Provider { provider: provider.to_string(), message: message.into() }
    }

    /// HTTP status code reported for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingInput => 422,
            _ => 503,
        }
    }
}

/// A convenience result type for voice bridge operations.
pub type Result<T> = std::result::Result<T, VoiceError>;
