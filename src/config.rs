//! Session configuration
//!
//! The API key is the only value that normally comes from outside. Absence
//! of a key is a valid configuration: the tracker reports it and never
//! issues a request.

use crate::{
    constants::{
        API_KEY_ENV_VAR, BASE_DELAY_MS, ETHERSCAN_API_URL, MAX_DELAY_MS, REQUEST_TIMEOUT_SECS,
    },
    error::ConfigError,
};
use std::time::Duration;
use url::Url;

/// Immutable configuration for one tracker session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleConfig {
    /// Etherscan API key; `None` disables fetching for the session
    pub api_key: Option<String>,
    /// Base URL of the Etherscan API
    pub api_url: String,
    /// Refresh delay after a successful attempt
    pub base_delay: Duration,
    /// Ceiling for the backoff delay
    pub max_delay: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: ETHERSCAN_API_URL.to_string(),
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

impl OracleConfig {
    /// Default configuration with the API key read from `ETHERSCAN_API_KEY`
    pub fn from_env() -> Self {
        Self::default().with_api_key(std::env::var(API_KEY_ENV_VAR).ok())
    }

    /// Sets the API key. Blank keys are treated as missing.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Returns true if a usable API key is present
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Checks the URL and delay bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.api_url).map_err(|e| ConfigError::invalid_url(&self.api_url, e))?;

        if self.base_delay < Duration::from_secs(1) {
            return Err(ConfigError::BaseDelayTooShort(self.base_delay));
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigError::MaxBelowBase {
                base: self.base_delay,
                max: self.max_delay,
            });
        }
        Ok(())
    }
}
