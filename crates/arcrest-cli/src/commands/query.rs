//! Layer queries.

use arcrest_client::{LogProgress, NoProgress, ProgressReporter, QueryFormat};

use crate::cli::QueryArgs;
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{render_json, render_kml};

pub(crate) async fn handle_query(ctx: &AppContext, args: QueryArgs) -> CliResult<()> {
    let selector = args.layer.selector()?;
    let params = args.options.to_params(args.format)?;
    let output = args.output.output.as_deref();
    if params.format == QueryFormat::Kmz && output.is_none() {
        return Err(CliError::validation("kmz output requires --output"));
    }

    let layer = ctx
        .client
        .resolve_layer(
            args.target.folder.as_deref(),
            &args.target.service,
            &selector,
        )
        .await
        .map_err(CliError::failure)?;

    let reporter: &dyn ProgressReporter = if args.progress {
        &LogProgress
    } else {
        &NoProgress
    };
    let response = ctx
        .client
        .query(&layer, &params, reporter)
        .await
        .map_err(CliError::failure)?;

    if params.format.is_spatial_file() {
        render_kml(
            &response,
            layer.display_field.as_deref(),
            params.format == QueryFormat::Kmz,
            output,
            reporter,
        )
    } else {
        render_json(response.as_value(), output)
    }
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use super::*;
    use crate::cli::{LayerTarget, OutputArgs, QueryOptions, ServiceTarget};
    use anyhow::{Result, anyhow};
    use httpmock::prelude::*;
    use serde_json::{Value, json};
    use std::fs;
    use std::io::Read;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn context(server: &MockServer) -> Result<AppContext> {
        AppContext::new(Some(&server.url("/arcgis")), 5).map_err(|err| anyhow!(err.display_message()))
    }

    fn options() -> QueryOptions {
        QueryOptions {
            where_clause: "1=1".to_string(),
            text: None,
            object_ids: None,
            time: None,
            time_relation: None,
            geometry: None,
            geometry_type: "esriGeometryEnvelope".to_string(),
            in_sr: None,
            spatial_rel: "esriSpatialRelIntersects".to_string(),
            distance: None,
            units: "esriSRUnit_Foot".to_string(),
            relation_param: None,
            out_fields: "*".to_string(),
            return_geometry: true,
            return_true_curves: false,
            max_allowable_offset: None,
            geometry_precision: None,
            out_sr: None,
            having_clause: None,
            return_ids_only: false,
            return_count_only: false,
            order_by_fields: None,
            group_by_fields_for_statistics: None,
            out_statistics: None,
            return_z: false,
            return_m: false,
            gdb_version: None,
            historic_moment: None,
            return_distinct_values: false,
            result_offset: None,
            result_record_count: None,
            return_extent_only: false,
            sql_format: None,
            datum_transformation: None,
            parameter_values: None,
            range_values: None,
            quantization_parameters: None,
            feature_encoding: "esriDefault".to_string(),
        }
    }

    fn query_args(format: QueryFormat, output: Option<PathBuf>) -> QueryArgs {
        QueryArgs {
            target: ServiceTarget {
                service: "Sites".to_string(),
                folder: None,
            },
            layer: LayerTarget {
                id: Some(0),
                name: None,
            },
            options: options(),
            format,
            progress: false,
            output: OutputArgs { output },
        }
    }

    fn mock_layer(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET).path("/arcgis/rest/services");
            then.status(200)
                .json_body(json!({"services": [{"name": "Sites", "type": "MapServer"}]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/arcgis/rest/services/Sites/MapServer");
            then.status(200)
                .json_body(json!({"layers": [{"id": 0, "name": "Points"}]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/arcgis/rest/services/Sites/MapServer/0");
            then.status(200)
                .json_body(json!({"id": 0, "name": "Points", "displayField": "SITE"}));
        });
    }

    fn site_page() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-74.0, 40.0]},
                 "properties": {"SITE": "Pier 1", "DEPTH": 12}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-73.5, 40.5]},
                 "properties": {"SITE": "Pier 2", "DEPTH": 0}}
            ]
        })
    }

    fn unwrap_cli<T>(result: CliResult<T>) -> Result<T> {
        result.map_err(|err| anyhow!(err.display_message()))
    }

    #[tokio::test]
    async fn pjson_query_writes_response_with_cli_defaults() -> Result<()> {
        let server = MockServer::start_async().await;
        mock_layer(&server);
        let query = server.mock(|when, then| {
            when.method(GET)
                .path("/arcgis/rest/services/Sites/MapServer/0/query")
                .query_param("where", "1=1")
                .query_param("outFields", "*")
                .query_param("returnGeometry", "true")
                .query_param("returnCountOnly", "false")
                .query_param("featureEncoding", "esriDefault")
                .query_param("resultRecordCount", "100")
                .query_param("f", "pjson");
            then.status(200).json_body(json!({
                "features": [{"attributes": {"OBJECTID": 1}}],
                "spatialReference": {"wkid": 4326}
            }));
        });
        let temp = TempDir::new()?;
        let path = temp.path().join("result.json");

        unwrap_cli(
            handle_query(
                &context(&server)?,
                query_args(QueryFormat::Pjson, Some(path.clone())),
            )
            .await,
        )?;

        query.assert();
        let written: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(written["features"][0]["attributes"]["OBJECTID"], json!(1));
        assert_eq!(written["spatialReference"]["wkid"], json!(4326));
        Ok(())
    }

    #[tokio::test]
    async fn kml_query_requests_geojson_and_names_by_display_field() -> Result<()> {
        let server = MockServer::start_async().await;
        mock_layer(&server);
        let query = server.mock(|when, then| {
            when.method(GET)
                .path("/arcgis/rest/services/Sites/MapServer/0/query")
                .query_param("f", "geojson");
            then.status(200).json_body(site_page());
        });
        let temp = TempDir::new()?;
        let path = temp.path().join("sites.kml");

        unwrap_cli(
            handle_query(
                &context(&server)?,
                query_args(QueryFormat::Kml, Some(path.clone())),
            )
            .await,
        )?;

        query.assert();
        let kml = fs::read_to_string(&path)?;
        assert!(kml.contains("<name>Pier 1</name>"));
        assert!(kml.contains("<coordinates>-73.5,40.5</coordinates>"));
        assert!(kml.contains("<td>DEPTH</td><td>0</td>"));
        Ok(())
    }

    #[tokio::test]
    async fn kmz_query_writes_archive() -> Result<()> {
        let server = MockServer::start_async().await;
        mock_layer(&server);
        server.mock(|when, then| {
            when.method(GET)
                .path("/arcgis/rest/services/Sites/MapServer/0/query");
            then.status(200).json_body(site_page());
        });
        let temp = TempDir::new()?;
        let path = temp.path().join("sites.kmz");

        unwrap_cli(
            handle_query(
                &context(&server)?,
                query_args(QueryFormat::Kmz, Some(path.clone())),
            )
            .await,
        )?;

        let mut archive = zip::ZipArchive::new(fs::File::open(&path)?)?;
        let mut doc = String::new();
        archive.by_name("doc.kml")?.read_to_string(&mut doc)?;
        assert_eq!(doc.matches("<Placemark>").count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn kmz_without_output_is_rejected_before_any_request() -> Result<()> {
        let server = MockServer::start_async().await;
        let root = server.mock(|when, then| {
            when.method(GET).path("/arcgis/rest/services");
            then.status(200).json_body(json!({}));
        });

        let err = handle_query(&context(&server)?, query_args(QueryFormat::Kmz, None))
            .await
            .err();

        assert!(
            matches!(err, Some(CliError::Validation(ref message)) if message.contains("--output"))
        );
        root.assert_hits(0);
        Ok(())
    }

    #[tokio::test]
    async fn api_error_surfaces_layer_and_server_message() -> Result<()> {
        let server = MockServer::start_async().await;
        mock_layer(&server);
        server.mock(|when, then| {
            when.method(GET)
                .path("/arcgis/rest/services/Sites/MapServer/0/query");
            then.status(200).json_body(
                json!({"error": {"code": 400, "message": "Invalid or missing input parameters."}}),
            );
        });
        let temp = TempDir::new()?;

        let err = handle_query(
            &context(&server)?,
            query_args(QueryFormat::Pjson, Some(temp.path().join("never.json"))),
        )
        .await
        .err()
        .ok_or_else(|| anyhow!("api error expected"))?;

        let message = err.display_message();
        assert!(message.starts_with("query failed for layer 0"), "{message}");
        assert!(message.contains("Invalid or missing input parameters."), "{message}");
        assert_eq!(err.exit_code(), 1);
        assert!(!temp.path().join("never.json").exists());
        Ok(())
    }

    #[tokio::test]
    async fn explicit_offset_is_forwarded_once() -> Result<()> {
        let server = MockServer::start_async().await;
        mock_layer(&server);
        let query = server.mock(|when, then| {
            when.method(GET)
                .path("/arcgis/rest/services/Sites/MapServer/0/query")
                .query_param("resultOffset", "200")
                .query_param("resultRecordCount", "50");
            then.status(200)
                .json_body(json!({"features": [], "exceededTransferLimit": false}));
        });
        let temp = TempDir::new()?;
        let path = temp.path().join("page.json");
        let mut args = query_args(QueryFormat::Json, Some(path.clone()));
        args.options.result_offset = Some("200".to_string());
        args.options.result_record_count = Some("50".to_string());

        unwrap_cli(handle_query(&context(&server)?, args).await)?;

        query.assert_hits(1);
        let written: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(written, json!({"features": [], "exceededTransferLimit": false}));
        Ok(())
    }
}
