//! Error types for the gas price tracker

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when fetching the gas price from a provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Invalid response from provider
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Provider API error
    #[error("Provider API error: {0}")]
    ApiError(String),

    /// Timeout waiting for response
    #[error("Request timeout")]
    Timeout,

    /// No API key configured
    #[error("Missing API key")]
    MissingApiKey,

    /// Request was superseded or the session ended before it resolved
    #[error("Request cancelled")]
    Cancelled,

    /// Configuration rejected before any request was made
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl ProviderError {
    /// Cancellation is not a failure: the result is dropped without touching state
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProviderError::Cancelled)
    }

    /// Creates an InvalidResponse error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}

/// Errors raised while building an [`OracleConfig`](crate::config::OracleConfig)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// API URL does not parse
    #[error("Invalid API URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Base delay is shorter than one countdown tick
    #[error("Base delay {0:?} is shorter than one second")]
    BaseDelayTooShort(Duration),

    /// Max delay is below the base delay
    #[error("Max delay {max:?} is below base delay {base:?}")]
    MaxBelowBase { base: Duration, max: Duration },
}

impl ConfigError {
    /// Creates an InvalidUrl error
    pub fn invalid_url(url: &str, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
