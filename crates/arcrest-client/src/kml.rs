//! KML 2.2 encoding of feature collections.
//!
//! Only Point and Polygon geometries produce placemarks. Placemark names come
//! from the layer's display field when the feature carries it, otherwise from
//! the first property named `name` in any letter case.

use serde_json::{Map, Value};

use crate::feature::{Feature, FeatureCollection, Geometry};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const KML_OPEN: &str = r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#;
const KML_CLOSE: &str = "</kml>";
const DOCUMENT_OPEN: &str = "<Document>";
const DOCUMENT_CLOSE: &str = "</Document>";
const TABLE_HEADER: &str = r#"<table border="1"><tr><th>Attribute</th><th>Value</th></tr>"#;

/// Render `collection` as a KML document.
#[must_use]
pub fn to_kml(collection: &FeatureCollection, display_field: Option<&str>) -> String {
    KmlEncoder::new(display_field).render(&collection.features)
}

/// Stateless placemark encoder bound to an optional display field.
#[derive(Debug, Clone, Copy, Default)]
pub struct KmlEncoder<'a> {
    display_field: Option<&'a str>,
}

impl<'a> KmlEncoder<'a> {
    /// Encoder naming placemarks after `display_field` when present.
    #[must_use]
    pub const fn new(display_field: Option<&'a str>) -> Self {
        Self { display_field }
    }

    /// Render a complete document wrapping the placemarks of `features`.
    #[must_use]
    pub fn render<'f>(&self, features: impl IntoIterator<Item = &'f Feature>) -> String {
        let mut parts = vec![
            XML_DECLARATION.to_string(),
            KML_OPEN.to_string(),
            DOCUMENT_OPEN.to_string(),
        ];
        parts.extend(features.into_iter().filter_map(|feature| self.placemark(feature)));
        parts.push(DOCUMENT_CLOSE.to_string());
        parts.push(KML_CLOSE.to_string());
        parts.join("\n")
    }

    /// Render one placemark, or `None` when the feature has no renderable
    /// geometry.
    #[must_use]
    pub fn placemark(&self, feature: &Feature) -> Option<String> {
        let geometry = match feature.geometry.as_ref()? {
            Geometry::Point { x, y } => {
                vec![
                    "<Point>".to_string(),
                    format!("<coordinates>{x},{y}</coordinates>"),
                    "</Point>".to_string(),
                ]
            }
            Geometry::Polygon { outer } => {
                let coordinates = outer
                    .iter()
                    .map(|(x, y)| format!("{x},{y},0"))
                    .collect::<Vec<_>>()
                    .join(" ");
                vec![
                    "<Polygon>".to_string(),
                    "<outerBoundaryIs>".to_string(),
                    "<LinearRing>".to_string(),
                    format!("<coordinates>{coordinates}</coordinates>"),
                    "</LinearRing>".to_string(),
                    "</outerBoundaryIs>".to_string(),
                    "</Polygon>".to_string(),
                ]
            }
        };

        let mut lines = vec![
            "<Placemark>".to_string(),
            format!("<name>{}</name>", self.name(&feature.properties)),
            format!("<description>{}</description>", description(&feature.properties)),
        ];
        lines.extend(geometry);
        lines.push("</Placemark>".to_string());
        Some(lines.join("\n"))
    }

    fn name(&self, properties: &Map<String, Value>) -> String {
        let value = self
            .display_field
            .and_then(|field| properties.get(field))
            .or_else(|| {
                properties
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case("name"))
                    .map(|(_, value)| value)
            });

        match value {
            Some(value) if !is_falsy(value) => escape_html(&display_value(value)),
            _ => String::new(),
        }
    }
}

fn description(properties: &Map<String, Value>) -> String {
    let rows: String = properties
        .iter()
        .filter(|(key, _)| !key.eq_ignore_ascii_case("name"))
        .map(|(key, value)| {
            format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                escape_html(key),
                escape_html(&display_value(value))
            )
        })
        .collect();
    format!("<![CDATA[{TABLE_HEADER}{rows}</table>]]>")
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Escape `& < > " '` for embedding in markup.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection(value: &Value) -> FeatureCollection {
        FeatureCollection::from_value(value)
    }

    #[test]
    fn point_placemark_uses_name_and_coordinates() {
        let kml = to_kml(
            &collection(&json!({"features": [{
                "geometry": {"type": "Point", "coordinates": [-74.0, 40.0]},
                "properties": {"Name": "Test Point", "attr1": "value1"}
            }]})),
            Some("Name"),
        );

        assert!(kml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(kml.contains(r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#));
        assert!(kml.contains("<name>Test Point</name>"));
        assert!(kml.contains("<coordinates>-74.0,40.0</coordinates>"));
        assert!(kml.contains(r#"<table border="1">"#));
        assert!(kml.contains("<td>attr1</td><td>value1</td>"));
        assert!(kml.ends_with("</Document>\n</kml>"));
    }

    #[test]
    fn polygon_outer_ring_forces_zero_elevation() {
        let kml = to_kml(
            &collection(&json!({"features": [{
                "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]},
                "properties": {"NAME": "Test Polygon", "attr1": "value1"}
            }]})),
            Some("NAME"),
        );

        assert!(kml.contains("<Polygon>"));
        assert!(kml.contains("<name>Test Polygon</name>"));
        assert!(kml.contains("<coordinates>0,0,0 1,0,0 1,1,0 0,1,0 0,0,0</coordinates>"));
    }

    #[test]
    fn empty_collection_renders_bare_document() {
        let kml = to_kml(&FeatureCollection::default(), None);
        assert_eq!(
            kml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n<Document>\n</Document>\n</kml>"
        );
        assert!(!kml.contains("<Placemark>"));
    }

    #[test]
    fn display_field_wins_over_name_scan() {
        let feature = Feature::from_value(&json!({
            "geometry": {"type": "Point", "coordinates": [1, 2]},
            "properties": {"NAME": "A", "name": "B"}
        }));
        let placemark = KmlEncoder::new(Some("NAME"))
            .placemark(&feature)
            .unwrap_or_default();
        assert!(placemark.contains("<name>A</name>"));
    }

    #[test]
    fn name_scan_is_case_insensitive_and_excluded_from_table() {
        let feature = Feature::from_value(&json!({
            "geometry": {"type": "Point", "coordinates": [1, 2]},
            "properties": {"Name": "B", "attr": 1}
        }));
        let placemark = KmlEncoder::new(None).placemark(&feature).unwrap_or_default();
        assert!(placemark.contains("<name>B</name>"));
        assert!(!placemark.contains("<td>Name</td>"));
        assert!(placemark.contains("<td>attr</td><td>1</td>"));
    }

    #[test]
    fn table_excludes_name_keys_even_when_display_field_differs() {
        let feature = Feature::from_value(&json!({
            "geometry": {"type": "Point", "coordinates": [1, 2]},
            "properties": {"LABEL": "Main St", "name": "ignored", "code": "7"}
        }));
        let placemark = KmlEncoder::new(Some("LABEL"))
            .placemark(&feature)
            .unwrap_or_default();
        assert!(placemark.contains("<name>Main St</name>"));
        assert!(placemark.contains("<td>LABEL</td><td>Main St</td>"));
        assert!(!placemark.contains("<td>name</td>"));
    }

    #[test]
    fn missing_and_falsy_names_render_empty() {
        let encoder = KmlEncoder::new(Some("TITLE"));
        let cases = [
            json!({"attr": 1}),
            json!({"TITLE": null}),
            json!({"TITLE": ""}),
            json!({"name": 0}),
        ];
        for properties in cases {
            let feature = Feature::from_value(&json!({
                "geometry": {"type": "Point", "coordinates": [1, 2]},
                "properties": properties
            }));
            let placemark = encoder.placemark(&feature).unwrap_or_default();
            assert!(placemark.contains("<name></name>"), "{placemark}");
        }
    }

    #[test]
    fn attribute_values_are_escaped() {
        let feature = Feature::from_value(&json!({
            "geometry": {"type": "Point", "coordinates": [1, 2]},
            "properties": {"name": "A & B", "note": "<b>bold</b>", "owner": null}
        }));
        let placemark = KmlEncoder::new(None).placemark(&feature).unwrap_or_default();
        assert!(placemark.contains("<name>A &amp; B</name>"));
        assert!(placemark.contains("<td>note</td><td>&lt;b&gt;bold&lt;/b&gt;</td>"));
        assert!(placemark.contains("<td>owner</td><td></td>"));
        assert!(!placemark.contains("<b>bold</b>"));
    }

    #[test]
    fn unrenderable_features_are_skipped() {
        let kml = to_kml(
            &collection(&json!({"features": [
                {"geometry": null, "properties": {"name": "none"}},
                {"geometry": {"type": "Point", "coordinates": [5]}, "properties": {}},
                {"geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}, "properties": {}},
                {"properties": {"name": "bare"}}
            ]})),
            None,
        );
        assert!(!kml.contains("<Placemark>"));
    }

    #[test]
    fn escape_html_covers_quotes() {
        assert_eq!(escape_html(r#"a"b'c"#), "a&quot;b&#x27;c");
    }
}
