//! Folder, service, and layer listings.

use arcrest_client::{ArcGisClient, Service};

use crate::cli::{FolderArgs, LayerArgs, LayersArgs, OutputArgs, ServiceArgs, ServicesArgs, ServiceTarget};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::render_json;

pub(crate) async fn handle_folders(ctx: &AppContext, args: OutputArgs) -> CliResult<()> {
    let catalog = ctx.client.services().await.map_err(CliError::failure)?;
    render_json(&catalog.folders, args.output.as_deref())
}

pub(crate) async fn handle_folder(ctx: &AppContext, args: FolderArgs) -> CliResult<()> {
    let folder = ctx
        .client
        .folder(&args.name)
        .await
        .map_err(CliError::failure)?;
    render_json(&folder.raw, args.output.output.as_deref())
}

pub(crate) async fn handle_services(ctx: &AppContext, args: ServicesArgs) -> CliResult<()> {
    let names: Vec<String> = match args.folder.as_deref() {
        Some(folder) => ctx
            .client
            .folder(folder)
            .await
            .map_err(CliError::failure)?
            .service_names(),
        None => ctx
            .client
            .services()
            .await
            .map_err(CliError::failure)?
            .services
            .into_iter()
            .map(|summary| summary.name)
            .collect(),
    };
    render_json(&names, args.output.output.as_deref())
}

pub(crate) async fn handle_service(ctx: &AppContext, args: ServiceArgs) -> CliResult<()> {
    let target = ServiceTarget {
        service: args.name,
        folder: args.folder,
    };
    let service = load_service(&ctx.client, &target).await?;
    render_json(&service.raw, args.output.output.as_deref())
}

pub(crate) async fn handle_layers(ctx: &AppContext, args: LayersArgs) -> CliResult<()> {
    let service = load_service(&ctx.client, &args.target).await?;
    render_json(&service.sorted_layers(), args.output.output.as_deref())
}

pub(crate) async fn handle_layer(ctx: &AppContext, args: LayerArgs) -> CliResult<()> {
    let selector = args.layer.selector()?;
    let layer = ctx
        .client
        .resolve_layer(
            args.target.folder.as_deref(),
            &args.target.service,
            &selector,
        )
        .await
        .map_err(CliError::failure)?;
    render_json(&layer.raw, args.output.output.as_deref())
}

async fn load_service(client: &ArcGisClient, target: &ServiceTarget) -> CliResult<Service> {
    let path = client
        .resolve_service_path(target.folder.as_deref(), &target.service)
        .await
        .map_err(CliError::failure)?;
    client.service(&path).await.map_err(CliError::failure)
}
