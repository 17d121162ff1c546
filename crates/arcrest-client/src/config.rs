//! Validated client configuration shared by the catalog model and fetcher.

use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Per-request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Attempts made for retryable failures before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Immutable settings for talking to one ArcGIS server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
    timeout: Duration,
    max_attempts: u32,
}

impl ClientConfig {
    /// Build a configuration for `base_url` with default timeout and retries.
    ///
    /// The URL must be absolute http(s); trailing slashes are dropped so paths
    /// can be appended verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not absolute http or https.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|source| ConfigError::InvalidBaseUrl {
            value: base_url.to_string(),
            source,
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme {
                scheme: parsed.scheme().to_string(),
            });
        }

        Ok(Self {
            base_url: trimmed.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Override the per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if `timeout` is zero.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "timeout",
                reason: "must be greater than zero",
            });
        }
        self.timeout = timeout;
        Ok(self)
    }

    /// Override the number of attempts for retryable failures.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_attempts` is zero.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts",
                reason: "must be at least 1",
            });
        }
        self.max_attempts = max_attempts;
        Ok(self)
    }

    /// Server root without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Attempts made for retryable failures.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `{base}/rest/services` followed by `path` when it is non-empty.
    #[must_use]
    pub fn services_url(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        if path.is_empty() {
            format!("{}/rest/services", self.base_url)
        } else {
            format!("{}/rest/services/{path}", self.base_url)
        }
    }
}
