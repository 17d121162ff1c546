//! Paginating executor for a layer's `/query` endpoint.
//!
//! # Design
//! - Without an explicit `resultOffset`, pages are requested at offsets
//!   0, P, 2P, … until a page returns fewer than P features.
//! - With an explicit offset exactly one page is fetched and returned as-is.
//! - Any page failure aborts the query; pages already fetched are dropped.

use serde_json::{Map, Value};

use crate::error::{QueryError, QueryResult};
use crate::feature::FeatureCollection;
use crate::fetch::Fetcher;
use crate::progress::ProgressReporter;
use crate::query::params::QueryParams;

/// Query URL of one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerEndpoint {
    /// Layer id, used to label failures.
    pub layer_id: i64,
    /// Absolute `/query` URL.
    pub url: String,
}

/// Aggregated result of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    body: Value,
}

impl QueryResponse {
    /// Wrap a response body.
    #[must_use]
    pub const fn new(body: Value) -> Self {
        Self { body }
    }

    /// Features in fetch order; empty when the response carries none.
    #[must_use]
    pub fn features(&self) -> &[Value] {
        self.body
            .get("features")
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice)
    }

    /// Borrow the response body.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.body
    }

    /// Take the response body.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.body
    }

    /// Parse the features for local rendering.
    #[must_use]
    pub fn feature_collection(&self) -> FeatureCollection {
        FeatureCollection::from_value(&self.body)
    }
}

/// Runs queries through a [`Fetcher`], reporting each page.
pub struct QueryEngine<'a> {
    fetcher: &'a dyn Fetcher,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> QueryEngine<'a> {
    /// Engine issuing requests through `fetcher`.
    #[must_use]
    pub const fn new(fetcher: &'a dyn Fetcher, reporter: &'a dyn ProgressReporter) -> Self {
        Self { fetcher, reporter }
    }

    /// Fetch every page matching `params`, or the single page at an explicit
    /// offset.
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError`] naming the layer if any page fetch fails.
    pub async fn run(
        &self,
        layer: &LayerEndpoint,
        params: &QueryParams,
    ) -> QueryResult<QueryResponse> {
        if let Some(offset) = params.result_offset {
            let page = self.fetch_page(layer, params, offset).await?;
            return Ok(QueryResponse::new(page));
        }

        let page_size = params.page_size();
        let mut features: Vec<Value> = Vec::new();
        let mut saw_features = false;
        let mut offset = 0_u32;

        loop {
            let page = self.fetch_page(layer, params, offset).await?;
            let mut body = if let Value::Object(map) = page {
                map
            } else {
                Map::new()
            };

            let count = if let Some(Value::Array(batch)) = body.remove("features") {
                saw_features = true;
                let count = batch.len();
                features.extend(batch);
                count
            } else {
                0
            };

            let next = offset.checked_add(page_size);
            let short_page = count < usize::try_from(page_size).unwrap_or(usize::MAX);
            if short_page || page_size == 0 || next.is_none() {
                tracing::debug!(
                    layer_id = layer.layer_id,
                    total = features.len(),
                    "query complete"
                );
                if saw_features {
                    body.insert("features".to_string(), Value::Array(features));
                }
                return Ok(QueryResponse::new(Value::Object(body)));
            }
            offset = next.unwrap_or(offset);
        }
    }

    async fn fetch_page(
        &self,
        layer: &LayerEndpoint,
        params: &QueryParams,
        offset: u32,
    ) -> QueryResult<Value> {
        let pairs = params.to_pairs(Some(offset));
        let page = self
            .fetcher
            .fetch_json(&layer.url, &pairs)
            .await
            .map_err(|source| QueryError {
                layer_id: layer.layer_id,
                source,
            })?;

        let count = page
            .get("features")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        self.reporter
            .page_fetched(layer.layer_id, offset, count);
        Ok(page)
    }
}
