#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Client library for browsing and querying ArcGIS REST map/feature services.
//!
//! Layout:
//! - `config.rs`: validated client configuration
//! - `fetch.rs`: the `Fetcher` seam and its retrying HTTP implementation
//! - `catalog.rs`: folder/service/layer object model and lookups
//! - `query/`: query parameters and the paginating query engine
//! - `feature.rs`: feature collection model parsed from query responses
//! - `kml.rs`: KML placemark encoder
//! - `split.rs`: vertex-budget splitter and KMZ archiving
//! - `progress.rs`: progress reporting hooks

pub mod catalog;
pub mod config;
pub mod error;
pub mod feature;
pub mod fetch;
pub mod kml;
pub mod progress;
pub mod query;
pub mod split;

pub use catalog::{
    ArcGisClient, Folder, Layer, LayerSelector, LayerSummary, Service, ServiceCatalog,
    ServiceSummary,
};
pub use config::{ClientConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT_SECS};
pub use error::{
    CatalogError, CatalogResult, ConfigError, FetchError, FetchResult, OutputError, OutputResult,
    QueryError, QueryResult,
};
pub use feature::{Feature, FeatureCollection, Geometry};
pub use fetch::{Fetcher, HttpFetcher};
pub use kml::{KmlEncoder, to_kml};
pub use progress::{LogProgress, NoProgress, ProgressReporter};
pub use query::{
    DEFAULT_PAGE_SIZE, DEFAULT_WHERE, LayerEndpoint, QueryEngine, QueryFormat, QueryParams,
    QueryResponse,
};
pub use split::{
    INDEX_DOCUMENT_NAME, KmlWriter, VERTEX_CEILING, VertexCounter, count_vertices,
    network_link_index,
};
