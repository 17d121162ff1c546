//! # Design
//!
//! - One error type per concern: fetching, querying, catalog lookups, output.
//! - Operation context (url, layer id, path) travels as fields.
//! - Underlying errors are preserved as `source` so callers can render chains.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for single HTTP fetches.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for layer queries.
pub type QueryResult<T> = Result<T, QueryError>;

/// Result type for catalog lookups.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Result type for KML/KMZ output.
pub type OutputResult<T> = Result<T, OutputError>;

/// Invalid client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The base URL could not be parsed.
    #[error("invalid base URL '{value}'")]
    InvalidBaseUrl {
        /// Offending input.
        value: String,
        /// Underlying parse error.
        source: url::ParseError,
    },
    /// The base URL does not use http or https.
    #[error("unsupported URL scheme '{scheme}'")]
    UnsupportedScheme {
        /// Scheme found in the URL.
        scheme: String,
    },
    /// A numeric setting was outside its accepted range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Setting that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
    },
}

/// Failures raised by a [`crate::Fetcher`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection or timeout failures that persisted through every attempt.
    #[error("request to {url} failed after {attempts} attempts")]
    Transport {
        /// Requested URL.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// Last transport error.
        source: reqwest::Error,
    },
    /// Request failures that are not worth retrying (invalid URL, body read).
    #[error("request to {url} failed")]
    Request {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        source: reqwest::Error,
    },
    /// HTTP 404.
    #[error("resource not found: {url}")]
    NotFound {
        /// Requested URL.
        url: String,
    },
    /// HTTP 403.
    #[error("access forbidden: {url}")]
    Forbidden {
        /// Requested URL.
        url: String,
    },
    /// HTTP 5xx that persisted through every attempt.
    #[error("server error ({status}): {url}")]
    Server {
        /// Requested URL.
        url: String,
        /// Last status code observed.
        status: u16,
    },
    /// Any other non-success HTTP status.
    #[error("http error ({status}): {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Status code returned.
        status: u16,
    },
    /// The body was not valid JSON.
    #[error("invalid JSON response from {url}")]
    InvalidJson {
        /// Requested URL.
        url: String,
        /// Underlying decode error.
        source: serde_json::Error,
    },
    /// The server answered with an embedded `error` object.
    #[error("ArcGIS API error: {message}")]
    Api {
        /// Requested URL.
        url: String,
        /// Error code reported by the server, when present.
        code: Option<i64>,
        /// Message reported by the server.
        message: String,
    },
}

/// A layer query aborted because one of its page fetches failed.
#[derive(Debug, Error)]
#[error("query failed for layer {layer_id}")]
pub struct QueryError {
    /// Layer being queried.
    pub layer_id: i64,
    /// Fetch failure that aborted the query.
    #[source]
    pub source: FetchError,
}

/// Catalog lookups against the services directory.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Fetching catalog JSON failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Catalog JSON did not have the expected shape.
    #[error("unexpected catalog response from {url}")]
    Malformed {
        /// Requested URL.
        url: String,
        /// Underlying decode error.
        source: serde_json::Error,
    },
    /// No service with the requested name exists.
    #[error("{}", service_not_found_message(.service, .folder.as_deref()))]
    ServiceNotFound {
        /// Requested service name.
        service: String,
        /// Folder searched, `None` for the root.
        folder: Option<String>,
    },
    /// No layer matched the requested id or name.
    #[error("layer {layer} not found in service {service}")]
    LayerNotFound {
        /// Service that was searched.
        service: String,
        /// Requested layer id or name.
        layer: String,
    },
}

fn service_not_found_message(service: &str, folder: Option<&str>) -> String {
    folder.map_or_else(
        || format!("service {service} not found"),
        |folder| format!("service {service} not found in folder {folder}"),
    )
}

/// Failures writing KML/KMZ output.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Filesystem failures.
    #[error("{operation} failed at {}", .path.display())]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Archive failures.
    #[error("kmz {operation} failed at {}", .path.display())]
    Zip {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Archive path.
        path: PathBuf,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },
    /// Archive output was requested without a destination path.
    #[error("kmz output requires an output path")]
    ArchiveWithoutPath,
    /// The vertex-counting pattern failed to compile.
    #[error("failed to compile vertex pattern")]
    Pattern {
        /// Underlying regex error.
        source: regex::Error,
    },
}

impl OutputError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: zip::result::ZipError,
    ) -> Self {
        Self::Zip {
            operation,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn output_error_helpers_build_variants() {
        let io_err = OutputError::io("write_kml", "out.kml", io::Error::other("disk"));
        assert!(matches!(io_err, OutputError::Io { .. }));
        assert!(io_err.source().is_some());
        assert_eq!(io_err.to_string(), "write_kml failed at out.kml");

        let zip_err = OutputError::zip("finish", "out.kmz", zip::result::ZipError::FileNotFound);
        assert!(matches!(zip_err, OutputError::Zip { .. }));
        assert!(zip_err.source().is_some());
        assert_eq!(zip_err.to_string(), "kmz finish failed at out.kmz");
    }

    #[test]
    fn query_error_names_layer_and_keeps_cause() {
        let err = QueryError {
            layer_id: 7,
            source: FetchError::NotFound {
                url: "http://host/rest/services/a/MapServer/7/query".to_string(),
            },
        };
        assert_eq!(err.to_string(), "query failed for layer 7");
        let cause = err.source().map(ToString::to_string).unwrap_or_default();
        assert!(cause.contains("resource not found"));
    }

    #[test]
    fn service_not_found_mentions_folder() {
        let root = CatalogError::ServiceNotFound {
            service: "Parcels".to_string(),
            folder: None,
        };
        assert_eq!(root.to_string(), "service Parcels not found");

        let nested = CatalogError::ServiceNotFound {
            service: "Parcels".to_string(),
            folder: Some("Land".to_string()),
        };
        assert_eq!(
            nested.to_string(),
            "service Parcels not found in folder Land"
        );
    }
}
