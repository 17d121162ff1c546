//! Layer queries: enumerated parameters and the paginating engine.

pub mod engine;
pub mod params;

pub use engine::{LayerEndpoint, QueryEngine, QueryResponse};
pub use params::{DEFAULT_PAGE_SIZE, DEFAULT_WHERE, QueryFormat, QueryParams};
