//! Folder/service/layer object model over the REST services directory.
//!
//! # Design
//! - Every lookup is a single fetch through the shared [`Fetcher`]; objects
//!   own their children and keep the raw JSON for verbatim output.
//! - Objects that build URLs hold an `Arc<ClientConfig>` instead of a
//!   back-reference to the client.
//! - Services are addressed by path: `{service}/{type}` at the root,
//!   `{folder}/{service}/{type}` inside a folder.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{CatalogError, CatalogResult, FetchResult, QueryResult};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::progress::ProgressReporter;
use crate::query::{LayerEndpoint, QueryEngine, QueryParams, QueryResponse};

/// Service entry from a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceSummary {
    /// Service name; folder listings prefix it with `folder/`.
    #[serde(default)]
    pub name: String,
    /// Service type such as `MapServer` or `FeatureServer`.
    #[serde(default, rename = "type")]
    pub service_type: String,
}

/// Layer entry from a service description.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LayerSummary {
    /// Layer id within its service.
    pub id: i64,
    /// Layer name.
    #[serde(default)]
    pub name: String,
}

/// Root listing of the services directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCatalog {
    /// Folder names.
    pub folders: Vec<String>,
    /// Services published at the root.
    pub services: Vec<ServiceSummary>,
    /// Response as returned by the server.
    pub raw: Value,
}

/// One folder of the services directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Folder {
    /// Folder name.
    pub name: String,
    /// Services in the folder, names carrying the folder prefix.
    pub services: Vec<ServiceSummary>,
    /// Response as returned by the server.
    pub raw: Value,
}

impl Folder {
    /// Service names with the `folder/` prefix removed.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        self.services
            .iter()
            .map(|summary| strip_folder(&summary.name, &self.name).to_string())
            .collect()
    }
}

/// A map or feature service.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    /// Directory path, e.g. `Land/Parcels/MapServer`.
    pub path: String,
    /// Layers in server order.
    pub layers: Vec<LayerSummary>,
    /// Response as returned by the server.
    pub raw: Value,
}

impl Service {
    /// Layers ordered by id.
    #[must_use]
    pub fn sorted_layers(&self) -> Vec<LayerSummary> {
        let mut layers = self.layers.clone();
        layers.sort_by_key(|layer| layer.id);
        layers
    }
}

/// A queryable layer.
#[derive(Debug, Clone)]
pub struct Layer {
    config: Arc<ClientConfig>,
    /// Path of the owning service.
    pub service_path: String,
    /// Layer id.
    pub id: i64,
    /// Layer name.
    pub name: String,
    /// Attribute used to name placemarks, when the layer declares one.
    pub display_field: Option<String>,
    /// Response as returned by the server.
    pub raw: Value,
}

impl Layer {
    /// Absolute `/query` endpoint of this layer.
    #[must_use]
    pub fn query_endpoint(&self) -> LayerEndpoint {
        LayerEndpoint {
            layer_id: self.id,
            url: self
                .config
                .services_url(&format!("{}/{}/query", self.service_path, self.id)),
        }
    }
}

/// How a layer is picked out of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerSelector {
    /// Match on layer id.
    Id(i64),
    /// Match on exact layer name.
    Name(String),
}

impl fmt::Display for LayerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl LayerSelector {
    fn matches(&self, layer: &LayerSummary) -> bool {
        match self {
            Self::Id(id) => layer.id == *id,
            Self::Name(name) => layer.name == *name,
        }
    }
}

#[derive(Deserialize)]
struct Listing {
    #[serde(default)]
    folders: Vec<String>,
    #[serde(default)]
    services: Vec<ServiceSummary>,
}

#[derive(Deserialize)]
struct ServiceBody {
    #[serde(default)]
    layers: Vec<LayerSummary>,
}

#[derive(Deserialize)]
struct LayerBody {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "displayField")]
    display_field: Option<String>,
}

/// Entry point for browsing and querying one ArcGIS server.
#[derive(Clone)]
pub struct ArcGisClient {
    config: Arc<ClientConfig>,
    fetcher: Arc<dyn Fetcher>,
}

impl ArcGisClient {
    /// Client backed by [`HttpFetcher`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> FetchResult<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Client backed by a caller-supplied fetcher.
    #[must_use]
    pub fn with_fetcher(config: ClientConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Root listing: folders and root-level services.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing cannot be fetched or decoded.
    pub async fn services(&self) -> CatalogResult<ServiceCatalog> {
        let (url, raw) = self.get("").await?;
        let listing: Listing = decode(&url, &raw)?;
        Ok(ServiceCatalog {
            folders: listing.folders,
            services: listing.services,
            raw,
        })
    }

    /// Listing of one folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be fetched or decoded.
    pub async fn folder(&self, name: &str) -> CatalogResult<Folder> {
        let (url, raw) = self.get(name).await?;
        let listing: Listing = decode(&url, &raw)?;
        Ok(Folder {
            name: name.to_string(),
            services: listing.services,
            raw,
        })
    }

    /// Description of the service at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be fetched or decoded.
    pub async fn service(&self, path: &str) -> CatalogResult<Service> {
        let (url, raw) = self.get(path).await?;
        let body: ServiceBody = decode(&url, &raw)?;
        Ok(Service {
            path: path.to_string(),
            layers: body.layers,
            raw,
        })
    }

    /// Description of layer `id` in the service at `service_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer cannot be fetched or decoded.
    pub async fn layer(&self, service_path: &str, id: i64) -> CatalogResult<Layer> {
        let (url, raw) = self.get(&format!("{service_path}/{id}")).await?;
        let body: LayerBody = decode(&url, &raw)?;
        Ok(Layer {
            config: Arc::clone(&self.config),
            service_path: service_path.to_string(),
            id,
            name: body.name,
            display_field: body.display_field.filter(|field| !field.is_empty()),
            raw,
        })
    }

    /// Directory path of `service`, searched at the root or in `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ServiceNotFound`] when no listed service matches.
    pub async fn resolve_service_path(
        &self,
        folder: Option<&str>,
        service: &str,
    ) -> CatalogResult<String> {
        let found = match folder {
            Some(folder) => self
                .folder(folder)
                .await?
                .services
                .into_iter()
                .find(|summary| strip_folder(&summary.name, folder) == service)
                .map(|summary| format!("{folder}/{service}/{}", summary.service_type)),
            None => self
                .services()
                .await?
                .services
                .into_iter()
                .find(|summary| summary.name == service)
                .map(|summary| format!("{service}/{}", summary.service_type)),
        };

        found.ok_or_else(|| CatalogError::ServiceNotFound {
            service: service.to_string(),
            folder: folder.map(str::to_string),
        })
    }

    /// First layer of `service` matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::LayerNotFound`] when no layer matches.
    pub fn find_layer<'s>(
        service: &'s Service,
        selector: &LayerSelector,
    ) -> CatalogResult<&'s LayerSummary> {
        service
            .layers
            .iter()
            .find(|layer| selector.matches(layer))
            .ok_or_else(|| CatalogError::LayerNotFound {
                service: service.path.clone(),
                layer: selector.to_string(),
            })
    }

    /// Resolve service and layer, then load the layer description.
    ///
    /// # Errors
    ///
    /// Returns an error if the service or layer cannot be found or fetched.
    pub async fn resolve_layer(
        &self,
        folder: Option<&str>,
        service: &str,
        selector: &LayerSelector,
    ) -> CatalogResult<Layer> {
        let path = self.resolve_service_path(folder, service).await?;
        let description = self.service(&path).await?;
        let id = Self::find_layer(&description, selector)
            .map_err(|_| CatalogError::LayerNotFound {
                service: service.to_string(),
                layer: selector.to_string(),
            })?
            .id;
        self.layer(&path, id).await
    }

    /// Run a query against `layer`.
    ///
    /// # Errors
    ///
    /// Returns an error if any page fetch fails.
    pub async fn query(
        &self,
        layer: &Layer,
        params: &QueryParams,
        reporter: &dyn ProgressReporter,
    ) -> QueryResult<QueryResponse> {
        QueryEngine::new(self.fetcher.as_ref(), reporter)
            .run(&layer.query_endpoint(), params)
            .await
    }

    async fn get(&self, path: &str) -> CatalogResult<(String, Value)> {
        let url = self.config.services_url(path);
        let raw = self.fetcher.fetch_json(&url, &[]).await?;
        Ok((url, raw))
    }
}

fn decode<T: DeserializeOwned>(url: &str, raw: &Value) -> CatalogResult<T> {
    T::deserialize(raw).map_err(|source| CatalogError::Malformed {
        url: url.to_string(),
        source,
    })
}

fn strip_folder<'n>(name: &'n str, folder: &str) -> &'n str {
    name.strip_prefix(folder)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(name)
}
