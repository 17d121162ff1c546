//! Enumerated ArcGIS `/query` options.
//!
//! Every recognised option is a field; `None` means the option is left off
//! the wire entirely. Options outside this list are not forwarded.

use std::fmt;
use std::str::FromStr;

/// Where clause applied when none is given.
pub const DEFAULT_WHERE: &str = "1=1";

/// Page size applied when none is given.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Output format requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryFormat {
    /// Pretty-printed ESRI JSON.
    #[default]
    Pjson,
    /// Compact ESRI JSON.
    Json,
    /// GeoJSON.
    Geojson,
    /// KML rendered locally from GeoJSON.
    Kml,
    /// Zipped KML rendered locally from GeoJSON.
    Kmz,
}

impl QueryFormat {
    /// Dialect sent to the server as `f`; the server has no KML dialect, so
    /// KML and KMZ request GeoJSON.
    #[must_use]
    pub const fn wire_format(self) -> &'static str {
        match self {
            Self::Pjson => "pjson",
            Self::Json => "json",
            Self::Geojson | Self::Kml | Self::Kmz => "geojson",
        }
    }

    /// Whether results are rendered locally as KML.
    #[must_use]
    pub const fn is_spatial_file(self) -> bool {
        matches!(self, Self::Kml | Self::Kmz)
    }

    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pjson => "pjson",
            Self::Json => "json",
            Self::Geojson => "geojson",
            Self::Kml => "kml",
            Self::Kmz => "kmz",
        }
    }
}

impl fmt::Display for QueryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pjson" => Ok(Self::Pjson),
            "json" => Ok(Self::Json),
            "geojson" => Ok(Self::Geojson),
            "kml" => Ok(Self::Kml),
            "kmz" => Ok(Self::Kmz),
            other => Err(format!("unsupported output format '{other}'")),
        }
    }
}

/// Parameters for one layer query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// `where`; defaults to `1=1`.
    pub where_clause: Option<String>,
    /// `text`
    pub text: Option<String>,
    /// `objectIds`
    pub object_ids: Option<String>,
    /// `time`
    pub time: Option<String>,
    /// `timeRelation`
    pub time_relation: Option<String>,
    /// `geometry`
    pub geometry: Option<String>,
    /// `geometryType`
    pub geometry_type: Option<String>,
    /// `inSR`
    pub in_sr: Option<String>,
    /// `spatialRel`
    pub spatial_rel: Option<String>,
    /// `distance`
    pub distance: Option<String>,
    /// `units`
    pub units: Option<String>,
    /// `relationParam`
    pub relation_param: Option<String>,
    /// `outFields`
    pub out_fields: Option<String>,
    /// `returnGeometry`
    pub return_geometry: Option<bool>,
    /// `returnTrueCurves`
    pub return_true_curves: Option<bool>,
    /// `maxAllowableOffset`
    pub max_allowable_offset: Option<String>,
    /// `geometryPrecision`
    pub geometry_precision: Option<String>,
    /// `outSR`
    pub out_sr: Option<String>,
    /// `havingClause`
    pub having_clause: Option<String>,
    /// `returnIdsOnly`
    pub return_ids_only: Option<bool>,
    /// `returnCountOnly`
    pub return_count_only: Option<bool>,
    /// `orderByFields`
    pub order_by_fields: Option<String>,
    /// `groupByFieldsForStatistics`
    pub group_by_fields_for_statistics: Option<String>,
    /// `outStatistics`
    pub out_statistics: Option<String>,
    /// `returnZ`
    pub return_z: Option<bool>,
    /// `returnM`
    pub return_m: Option<bool>,
    /// `gdbVersion`
    pub gdb_version: Option<String>,
    /// `historicMoment`
    pub historic_moment: Option<String>,
    /// `returnDistinctValues`
    pub return_distinct_values: Option<bool>,
    /// `resultOffset`; when set, pagination is disabled and exactly one page
    /// is fetched.
    pub result_offset: Option<u32>,
    /// `resultRecordCount`; the page size, defaults to 100.
    pub result_record_count: Option<u32>,
    /// `returnExtentOnly`
    pub return_extent_only: Option<bool>,
    /// `sqlFormat`
    pub sql_format: Option<String>,
    /// `datumTransformation`
    pub datum_transformation: Option<String>,
    /// `parameterValues`
    pub parameter_values: Option<String>,
    /// `rangeValues`
    pub range_values: Option<String>,
    /// `quantizationParameters`
    pub quantization_parameters: Option<String>,
    /// `featureEncoding`
    pub feature_encoding: Option<String>,
    /// Requested output format; drives the `f` parameter.
    pub format: QueryFormat,
}

impl QueryParams {
    /// Effective where clause.
    #[must_use]
    pub fn where_or_default(&self) -> &str {
        self.where_clause.as_deref().unwrap_or(DEFAULT_WHERE)
    }

    /// Effective page size.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.result_record_count.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Set `resultOffset` from text, rejecting non-integers.
    ///
    /// # Errors
    ///
    /// Returns a message if `value` is not a non-negative integer.
    pub fn set_result_offset(&mut self, value: &str) -> Result<(), String> {
        self.result_offset = Some(parse_count("resultOffset", value)?);
        Ok(())
    }

    /// Set `resultRecordCount` from text, rejecting non-integers.
    ///
    /// # Errors
    ///
    /// Returns a message if `value` is not a non-negative integer.
    pub fn set_result_record_count(&mut self, value: &str) -> Result<(), String> {
        self.result_record_count = Some(parse_count("resultRecordCount", value)?);
        Ok(())
    }

    /// Wire pairs for one page at `offset`, with defaults applied and unset
    /// options omitted.
    #[must_use]
    pub fn to_pairs(&self, offset: Option<u32>) -> Vec<(String, String)> {
        let mut pairs = PairWriter::default();
        pairs.text("where", Some(self.where_or_default()));
        pairs.text("text", self.text.as_deref());
        pairs.text("objectIds", self.object_ids.as_deref());
        pairs.text("time", self.time.as_deref());
        pairs.text("timeRelation", self.time_relation.as_deref());
        pairs.text("geometry", self.geometry.as_deref());
        pairs.text("geometryType", self.geometry_type.as_deref());
        pairs.text("inSR", self.in_sr.as_deref());
        pairs.text("spatialRel", self.spatial_rel.as_deref());
        pairs.text("distance", self.distance.as_deref());
        pairs.text("units", self.units.as_deref());
        pairs.text("relationParam", self.relation_param.as_deref());
        pairs.text("outFields", self.out_fields.as_deref());
        pairs.flag("returnGeometry", self.return_geometry);
        pairs.flag("returnTrueCurves", self.return_true_curves);
        pairs.text("maxAllowableOffset", self.max_allowable_offset.as_deref());
        pairs.text("geometryPrecision", self.geometry_precision.as_deref());
        pairs.text("outSR", self.out_sr.as_deref());
        pairs.text("havingClause", self.having_clause.as_deref());
        pairs.flag("returnIdsOnly", self.return_ids_only);
        pairs.flag("returnCountOnly", self.return_count_only);
        pairs.text("orderByFields", self.order_by_fields.as_deref());
        pairs.text(
            "groupByFieldsForStatistics",
            self.group_by_fields_for_statistics.as_deref(),
        );
        pairs.text("outStatistics", self.out_statistics.as_deref());
        pairs.flag("returnZ", self.return_z);
        pairs.flag("returnM", self.return_m);
        pairs.text("gdbVersion", self.gdb_version.as_deref());
        pairs.text("historicMoment", self.historic_moment.as_deref());
        pairs.flag("returnDistinctValues", self.return_distinct_values);
        pairs.number("resultOffset", offset);
        pairs.number("resultRecordCount", Some(self.page_size()));
        pairs.flag("returnExtentOnly", self.return_extent_only);
        pairs.text("sqlFormat", self.sql_format.as_deref());
        pairs.text("datumTransformation", self.datum_transformation.as_deref());
        pairs.text("parameterValues", self.parameter_values.as_deref());
        pairs.text("rangeValues", self.range_values.as_deref());
        pairs.text(
            "quantizationParameters",
            self.quantization_parameters.as_deref(),
        );
        pairs.text("featureEncoding", self.feature_encoding.as_deref());
        pairs.text("f", Some(self.format.wire_format()));
        pairs.0
    }
}

fn parse_count(name: &str, value: &str) -> Result<u32, String> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("{name} must be a non-negative integer: {err}"))
}

#[derive(Default)]
struct PairWriter(Vec<(String, String)>);

impl PairWriter {
    fn text(&mut self, name: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.0.push((name.to_string(), value.to_string()));
        }
    }

    fn flag(&mut self, name: &str, value: Option<bool>) {
        if let Some(value) = value {
            self.0.push((name.to_string(), value.to_string()));
        }
    }

    fn number(&mut self, name: &str, value: Option<u32>) {
        if let Some(value) = value {
            self.0.push((name.to_string(), value.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
        pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn defaults_fill_where_page_size_and_format() {
        let pairs = QueryParams::default().to_pairs(Some(0));
        assert_eq!(
            pairs,
            vec![
                ("where".to_string(), "1=1".to_string()),
                ("resultOffset".to_string(), "0".to_string()),
                ("resultRecordCount".to_string(), "100".to_string()),
                ("f".to_string(), "pjson".to_string()),
            ]
        );
    }

    #[test]
    fn unset_options_are_omitted() {
        let params = QueryParams {
            out_fields: Some("NAME,POP".to_string()),
            return_geometry: Some(false),
            ..QueryParams::default()
        };
        let pairs = params.to_pairs(None);
        assert_eq!(lookup(&pairs, "outFields"), Some("NAME,POP"));
        assert_eq!(lookup(&pairs, "returnGeometry"), Some("false"));
        assert_eq!(lookup(&pairs, "resultOffset"), None);
        assert_eq!(lookup(&pairs, "geometry"), None);
        assert_eq!(lookup(&pairs, "orderByFields"), None);
    }

    #[test]
    fn spatial_formats_request_geojson() {
        for format in [QueryFormat::Kml, QueryFormat::Kmz, QueryFormat::Geojson] {
            let params = QueryParams {
                format,
                ..QueryParams::default()
            };
            assert_eq!(lookup(&params.to_pairs(None), "f"), Some("geojson"));
        }
        assert!(QueryFormat::Kmz.is_spatial_file());
        assert!(!QueryFormat::Json.is_spatial_file());
    }

    #[test]
    fn textual_counts_are_coerced() -> Result<(), String> {
        let mut params = QueryParams::default();
        params.set_result_record_count(" 250 ")?;
        params.set_result_offset("500")?;
        assert_eq!(params.result_record_count, Some(250));
        assert_eq!(params.result_offset, Some(500));
        assert!(params.set_result_offset("ten").is_err());
        assert!(params.set_result_record_count("-1").is_err());
        Ok(())
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("KMZ".parse::<QueryFormat>(), Ok(QueryFormat::Kmz));
        assert_eq!("geojson".parse::<QueryFormat>(), Ok(QueryFormat::Geojson));
        assert!("shapefile".parse::<QueryFormat>().is_err());
        assert_eq!(QueryFormat::Pjson.to_string(), "pjson");
    }
}
