//! Application context and the CLI error type.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use anyhow::anyhow;
use arcrest_client::{ArcGisClient, ClientConfig};

/// Bad input caught before any request, or a failure while talking to the
/// server or writing output.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) | Self::Failure(_) => 1,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_message())
    }
}

impl std::error::Error for CliError {}

/// Shared client handed to every command handler.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) client: ArcGisClient,
}

impl AppContext {
    /// Build a client for `url` with a per-request timeout of `timeout_secs`.
    pub(crate) fn new(url: Option<&str>, timeout_secs: u64) -> CliResult<Self> {
        let url = url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| CliError::validation("--url is required (or set ARCREST_URL)"))?;

        let config = ClientConfig::new(url)
            .and_then(|config| config.with_timeout(Duration::from_secs(timeout_secs)))
            .map_err(|err| CliError::validation(err.to_string()))?;

        let client = ArcGisClient::new(config)
            .map_err(|err| CliError::failure(anyhow!(err).context("failed to build HTTP client")))?;

        Ok(Self { client })
    }
}
