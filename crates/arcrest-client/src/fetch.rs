//! JSON fetching with retries and ArcGIS error detection.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{FetchError, FetchResult};

/// Output dialect requested when the caller does not pick one.
pub const DEFAULT_FORMAT: &str = "pjson";

/// Issues one logical GET and decodes the JSON body.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` with `params` appended as the query string.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status, invalid JSON,
    /// or an embedded ArcGIS error object.
    async fn fetch_json(&self, url: &str, params: &[(String, String)]) -> FetchResult<Value>;
}

/// `reqwest`-backed fetcher with immediate retries for transient failures.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    max_attempts: u32,
}

enum Attempt {
    Done(Value),
    Retry(FetchError),
}

impl HttpFetcher {
    /// Build a fetcher honouring the configured timeout and retry budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|source| FetchError::Request {
                url: config.base_url().to_string(),
                source,
            })?;
        Ok(Self {
            client,
            max_attempts: config.max_attempts(),
        })
    }

    async fn attempt(
        &self,
        url: &str,
        params: &[(String, String)],
        attempt: u32,
    ) -> FetchResult<Attempt> {
        let response = match self.client.get(url).query(params).send().await {
            Ok(response) => response,
            Err(source) if source.is_connect() || source.is_timeout() => {
                tracing::debug!(url, attempt, error = %source, "transport failure");
                return Ok(Attempt::Retry(FetchError::Transport {
                    url: url.to_string(),
                    attempts: attempt,
                    source,
                }));
            }
            Err(source) => {
                return Err(FetchError::Request {
                    url: url.to_string(),
                    source,
                });
            }
        };

        let status = response.status();
        tracing::debug!(url = %response.url(), status = status.as_u16(), attempt, "arcgis response");

        match status {
            StatusCode::NOT_FOUND => {
                return Err(FetchError::NotFound {
                    url: url.to_string(),
                });
            }
            StatusCode::FORBIDDEN => {
                return Err(FetchError::Forbidden {
                    url: url.to_string(),
                });
            }
            status if status.is_server_error() => {
                return Ok(Attempt::Retry(FetchError::Server {
                    url: url.to_string(),
                    status: status.as_u16(),
                }));
            }
            status if !status.is_success() => {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            _ => {}
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(source) if source.is_timeout() => {
                return Ok(Attempt::Retry(FetchError::Transport {
                    url: url.to_string(),
                    attempts: attempt,
                    source,
                }));
            }
            Err(source) => {
                return Err(FetchError::Request {
                    url: url.to_string(),
                    source,
                });
            }
        };

        decode_body(url, &bytes).map(Attempt::Done)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_json(&self, url: &str, params: &[(String, String)]) -> FetchResult<Value> {
        let params = with_default_format(params);
        let mut attempt = 1;
        loop {
            match self.attempt(url, &params, attempt).await? {
                Attempt::Done(value) => return Ok(value),
                Attempt::Retry(err) if attempt < self.max_attempts => {
                    tracing::debug!(url, attempt, error = %err, "retrying request");
                    attempt += 1;
                }
                Attempt::Retry(err) => return Err(err),
            }
        }
    }
}

/// Append `f=pjson` unless the caller already chose a format.
#[must_use]
pub fn with_default_format(params: &[(String, String)]) -> Vec<(String, String)> {
    let mut params = params.to_vec();
    if !params.iter().any(|(key, _)| key == "f") {
        params.push(("f".to_string(), DEFAULT_FORMAT.to_string()));
    }
    params
}

/// Decode a response body, surfacing embedded ArcGIS `error` objects.
///
/// # Errors
///
/// Returns an error if the body is not JSON or carries an `error` object.
pub fn decode_body(url: &str, bytes: &[u8]) -> FetchResult<Value> {
    let value: Value = serde_json::from_slice(bytes).map_err(|source| FetchError::InvalidJson {
        url: url.to_string(),
        source,
    })?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown ArcGIS error")
            .to_string();
        return Err(FetchError::Api {
            url: url.to_string(),
            code: error.get("code").and_then(Value::as_i64),
            message,
        });
    }

    Ok(value)
}
