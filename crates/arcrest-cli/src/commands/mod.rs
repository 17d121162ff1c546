//! Command handlers grouped by concern.

pub(crate) mod catalog;
pub(crate) mod query;

pub(crate) use catalog::{
    handle_folder, handle_folders, handle_layer, handle_layers, handle_service, handle_services,
};
pub(crate) use query::handle_query;
