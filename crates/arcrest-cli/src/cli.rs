//! Command-line interface for browsing and querying ArcGIS REST services.

use std::path::PathBuf;

use arcrest_client::{DEFAULT_TIMEOUT_SECS, DEFAULT_WHERE, LayerSelector, QueryFormat, QueryParams};
use arcrest_telemetry::{LogFormat, LoggingConfig, init_logging};
use clap::{ArgAction, Args, Parser, Subcommand};

use crate::client::{AppContext, CliError, CliResult};
use crate::commands::{
    handle_folder, handle_folders, handle_layer, handle_layers, handle_query, handle_service,
    handle_services,
};

const DEFAULT_GEOMETRY_TYPE: &str = "esriGeometryEnvelope";
const DEFAULT_SPATIAL_REL: &str = "esriSpatialRelIntersects";
const DEFAULT_UNITS: &str = "esriSRUnit_Foot";
const DEFAULT_OUT_FIELDS: &str = "*";
const DEFAULT_ENCODING: &str = "esriDefault";

/// Parses CLI arguments, installs logging, and executes the requested
/// command. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: log_level(&cli),
        format: cli.log_format.unwrap_or_else(LogFormat::infer),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("error: {err:#}");
        return 1;
    }

    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let ctx = AppContext::new(cli.url.as_deref(), cli.timeout)?;

    match cli.command {
        Command::Folders(args) => handle_folders(&ctx, args).await,
        Command::Folder(args) => handle_folder(&ctx, args).await,
        Command::Services(args) => handle_services(&ctx, args).await,
        Command::Service(args) => handle_service(&ctx, args).await,
        Command::Layers(args) => handle_layers(&ctx, args).await,
        Command::Layer(args) => handle_layer(&ctx, args).await,
        Command::Query(args) => handle_query(&ctx, args).await,
    }
}

/// `debug` with `--debug`, `info` for progress reporting, otherwise `warn`.
fn log_level(cli: &Cli) -> &'static str {
    if cli.debug {
        "debug"
    } else if matches!(&cli.command, Command::Query(args) if args.progress) {
        "info"
    } else {
        "warn"
    }
}

#[derive(Parser)]
#[command(name = "arcrest", about = "Browse and query ArcGIS REST services")]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "ARCREST_URL",
        help = "Base URL of the ArcGIS server, e.g. https://host/arcgis"
    )]
    url: Option<String>,
    #[arg(
        long,
        global = true,
        env = "ARCREST_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        help = "Per-request timeout in seconds"
    )]
    timeout: u64,
    #[arg(long, global = true, help = "Enable debug logging")]
    debug: bool,
    #[arg(
        long,
        global = true,
        env = "ARCREST_LOG_FORMAT",
        value_parser = parse_log_format,
        help = "Log format: pretty or json"
    )]
    log_format: Option<LogFormat>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
#[allow(clippy::large_enum_variant)]
enum Command {
    /// List folder names.
    Folders(OutputArgs),
    /// Show a folder's listing.
    Folder(FolderArgs),
    /// List service names at the root or in a folder.
    Services(ServicesArgs),
    /// Show a service description.
    Service(ServiceArgs),
    /// List a service's layers sorted by id.
    Layers(LayersArgs),
    /// Show a layer description.
    Layer(LayerArgs),
    /// Query a layer.
    Query(QueryArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct OutputArgs {
    #[arg(long, help = "Write output to this path instead of stdout")]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct FolderArgs {
    pub(crate) name: String,
    #[command(flatten)]
    pub(crate) output: OutputArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct ServicesArgs {
    #[arg(long)]
    pub(crate) folder: Option<String>,
    #[command(flatten)]
    pub(crate) output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ServiceArgs {
    pub(crate) name: String,
    #[arg(long)]
    pub(crate) folder: Option<String>,
    #[command(flatten)]
    pub(crate) output: OutputArgs,
}

/// Service addressed by name, optionally inside a folder.
#[derive(Args, Debug, Clone)]
pub(crate) struct ServiceTarget {
    #[arg(long)]
    pub(crate) service: String,
    #[arg(long)]
    pub(crate) folder: Option<String>,
}

/// Layer addressed by id or name; the id wins when both are given.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct LayerTarget {
    #[arg(long)]
    pub(crate) id: Option<i64>,
    #[arg(long)]
    pub(crate) name: Option<String>,
}

impl LayerTarget {
    pub(crate) fn selector(&self) -> CliResult<LayerSelector> {
        match (self.id, self.name.as_deref()) {
            (Some(id), _) => Ok(LayerSelector::Id(id)),
            (None, Some(name)) if !name.is_empty() => Ok(LayerSelector::Name(name.to_string())),
            _ => Err(CliError::validation("either --id or --name is required")),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct LayersArgs {
    #[command(flatten)]
    pub(crate) target: ServiceTarget,
    #[command(flatten)]
    pub(crate) output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct LayerArgs {
    #[command(flatten)]
    pub(crate) target: ServiceTarget,
    #[command(flatten)]
    pub(crate) layer: LayerTarget,
    #[command(flatten)]
    pub(crate) output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct QueryArgs {
    #[command(flatten)]
    pub(crate) target: ServiceTarget,
    #[command(flatten)]
    pub(crate) layer: LayerTarget,
    #[command(flatten)]
    pub(crate) options: QueryOptions,
    #[arg(
        long,
        value_parser = parse_query_format,
        default_value = "pjson",
        help = "Output format: pjson, json, geojson, kml or kmz"
    )]
    pub(crate) format: QueryFormat,
    #[arg(long, help = "Log each fetched page and written file")]
    pub(crate) progress: bool,
    #[command(flatten)]
    pub(crate) output: OutputArgs,
}

/// ArcGIS query options under their REST parameter names.
#[derive(Args, Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct QueryOptions {
    #[arg(long = "where", default_value = DEFAULT_WHERE)]
    pub(crate) where_clause: String,
    #[arg(long)]
    pub(crate) text: Option<String>,
    #[arg(long = "objectIds")]
    pub(crate) object_ids: Option<String>,
    #[arg(long)]
    pub(crate) time: Option<String>,
    #[arg(long = "timeRelation")]
    pub(crate) time_relation: Option<String>,
    #[arg(long)]
    pub(crate) geometry: Option<String>,
    #[arg(long = "geometryType", default_value = DEFAULT_GEOMETRY_TYPE)]
    pub(crate) geometry_type: String,
    #[arg(long = "inSR")]
    pub(crate) in_sr: Option<String>,
    #[arg(long = "spatialRel", default_value = DEFAULT_SPATIAL_REL)]
    pub(crate) spatial_rel: String,
    #[arg(long)]
    pub(crate) distance: Option<String>,
    #[arg(long, default_value = DEFAULT_UNITS)]
    pub(crate) units: String,
    #[arg(long = "relationParam")]
    pub(crate) relation_param: Option<String>,
    #[arg(long = "outFields", default_value = DEFAULT_OUT_FIELDS)]
    pub(crate) out_fields: String,
    #[arg(long = "returnGeometry", default_value_t = true, action = ArgAction::Set)]
    pub(crate) return_geometry: bool,
    #[arg(long = "returnTrueCurves", default_value_t = false, action = ArgAction::Set)]
    pub(crate) return_true_curves: bool,
    #[arg(long = "maxAllowableOffset")]
    pub(crate) max_allowable_offset: Option<String>,
    #[arg(long = "geometryPrecision")]
    pub(crate) geometry_precision: Option<String>,
    #[arg(long = "outSR")]
    pub(crate) out_sr: Option<String>,
    #[arg(long = "havingClause")]
    pub(crate) having_clause: Option<String>,
    #[arg(long = "returnIdsOnly", default_value_t = false, action = ArgAction::Set)]
    pub(crate) return_ids_only: bool,
    #[arg(long = "returnCountOnly", default_value_t = false, action = ArgAction::Set)]
    pub(crate) return_count_only: bool,
    #[arg(long = "orderByFields")]
    pub(crate) order_by_fields: Option<String>,
    #[arg(long = "groupByFieldsForStatistics")]
    pub(crate) group_by_fields_for_statistics: Option<String>,
    #[arg(long = "outStatistics")]
    pub(crate) out_statistics: Option<String>,
    #[arg(long = "returnZ", default_value_t = false, action = ArgAction::Set)]
    pub(crate) return_z: bool,
    #[arg(long = "returnM", default_value_t = false, action = ArgAction::Set)]
    pub(crate) return_m: bool,
    #[arg(long = "gdbVersion")]
    pub(crate) gdb_version: Option<String>,
    #[arg(long = "historicMoment")]
    pub(crate) historic_moment: Option<String>,
    #[arg(long = "returnDistinctValues", default_value_t = false, action = ArgAction::Set)]
    pub(crate) return_distinct_values: bool,
    #[arg(long = "resultOffset")]
    pub(crate) result_offset: Option<String>,
    #[arg(long = "resultRecordCount")]
    pub(crate) result_record_count: Option<String>,
    #[arg(long = "returnExtentOnly", default_value_t = false, action = ArgAction::Set)]
    pub(crate) return_extent_only: bool,
    #[arg(long = "sqlFormat")]
    pub(crate) sql_format: Option<String>,
    #[arg(long = "datumTransformation")]
    pub(crate) datum_transformation: Option<String>,
    #[arg(long = "parameterValues")]
    pub(crate) parameter_values: Option<String>,
    #[arg(long = "rangeValues")]
    pub(crate) range_values: Option<String>,
    #[arg(long = "quantizationParameters")]
    pub(crate) quantization_parameters: Option<String>,
    #[arg(long = "featureEncoding", default_value = DEFAULT_ENCODING)]
    pub(crate) feature_encoding: String,
}

impl QueryOptions {
    /// Convert flags into engine parameters, coercing the paging numbers.
    pub(crate) fn to_params(&self, format: QueryFormat) -> CliResult<QueryParams> {
        let mut params = QueryParams {
            where_clause: Some(self.where_clause.clone()),
            text: self.text.clone(),
            object_ids: self.object_ids.clone(),
            time: self.time.clone(),
            time_relation: self.time_relation.clone(),
            geometry: self.geometry.clone(),
            geometry_type: Some(self.geometry_type.clone()),
            in_sr: self.in_sr.clone(),
            spatial_rel: Some(self.spatial_rel.clone()),
            distance: self.distance.clone(),
            units: Some(self.units.clone()),
            relation_param: self.relation_param.clone(),
            out_fields: Some(self.out_fields.clone()),
            return_geometry: Some(self.return_geometry),
            return_true_curves: Some(self.return_true_curves),
            max_allowable_offset: self.max_allowable_offset.clone(),
            geometry_precision: self.geometry_precision.clone(),
            out_sr: self.out_sr.clone(),
            having_clause: self.having_clause.clone(),
            return_ids_only: Some(self.return_ids_only),
            return_count_only: Some(self.return_count_only),
            order_by_fields: self.order_by_fields.clone(),
            group_by_fields_for_statistics: self.group_by_fields_for_statistics.clone(),
            out_statistics: self.out_statistics.clone(),
            return_z: Some(self.return_z),
            return_m: Some(self.return_m),
            gdb_version: self.gdb_version.clone(),
            historic_moment: self.historic_moment.clone(),
            return_distinct_values: Some(self.return_distinct_values),
            result_offset: None,
            result_record_count: None,
            return_extent_only: Some(self.return_extent_only),
            sql_format: self.sql_format.clone(),
            datum_transformation: self.datum_transformation.clone(),
            parameter_values: self.parameter_values.clone(),
            range_values: self.range_values.clone(),
            quantization_parameters: self.quantization_parameters.clone(),
            feature_encoding: Some(self.feature_encoding.clone()),
            format,
        };

        if let Some(offset) = self.result_offset.as_deref() {
            params
                .set_result_offset(offset)
                .map_err(CliError::validation)?;
        }
        if let Some(count) = self.result_record_count.as_deref() {
            params
                .set_result_record_count(count)
                .map_err(CliError::validation)?;
        }
        Ok(params)
    }
}

fn parse_query_format(input: &str) -> Result<QueryFormat, String> {
    input.parse()
}

fn parse_log_format(input: &str) -> Result<LogFormat, String> {
    input.parse()
}
