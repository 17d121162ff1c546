//! Feature collection model parsed leniently from query responses.
//!
//! Both GeoJSON (`properties` + typed `geometry`) and ESRI JSON
//! (`attributes` + `{x, y}` / `{rings}`) shapes are accepted. Geometry that is
//! absent, empty, or malformed parses as `None`; it is never an error.
//! Coordinates keep the server's number formatting so `40.0` renders as
//! `40.0` and `0` as `0`.

use serde_json::{Map, Number, Value};

/// Renderable geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Geometry {
    /// Single position.
    Point {
        /// Easting / longitude.
        x: Number,
        /// Northing / latitude.
        y: Number,
    },
    /// Polygon reduced to its outer ring, vertices in server order.
    Polygon {
        /// Outer ring vertices as `(x, y)` pairs.
        outer: Vec<(Number, Number)>,
    },
}

/// One feature: optional geometry plus ordered properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feature {
    /// Renderable geometry, `None` when absent or unsupported.
    pub geometry: Option<Geometry>,
    /// Properties in server order.
    pub properties: Map<String, Value>,
}

/// Ordered sequence of features.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    /// Features in the order returned by the server.
    pub features: Vec<Feature>,
}

impl Feature {
    /// Parse one feature object.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let properties = value
            .get("properties")
            .or_else(|| value.get("attributes"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let geometry = value.get("geometry").and_then(Geometry::from_value);
        Self {
            geometry,
            properties,
        }
    }
}

impl FeatureCollection {
    /// Parse the `features` array of a query response; anything else yields
    /// an empty collection.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let features = value
            .get("features")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(Feature::from_value).collect())
            .unwrap_or_default();
        Self { features }
    }

    /// Number of features.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection has no features.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Geometry {
    /// Parse a GeoJSON or ESRI JSON geometry object.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value.get("type").and_then(Value::as_str) {
            Some("Point") => point(value.get("coordinates")?),
            Some("Polygon") => polygon(value.get("coordinates")?),
            Some(_) => None,
            None => esri_geometry(value),
        }
    }
}

fn point(coordinates: &Value) -> Option<Geometry> {
    let (x, y) = position(coordinates)?;
    Some(Geometry::Point { x, y })
}

fn polygon(rings: &Value) -> Option<Geometry> {
    let outer = rings.as_array()?.first()?.as_array()?;
    if outer.is_empty() {
        return None;
    }
    let outer = outer.iter().map(position).collect::<Option<Vec<_>>>()?;
    Some(Geometry::Polygon { outer })
}

fn esri_geometry(value: &Value) -> Option<Geometry> {
    if let Some(rings) = value.get("rings") {
        return polygon(rings);
    }
    match (value.get("x")?, value.get("y")?) {
        (Value::Number(x), Value::Number(y)) => Some(Geometry::Point {
            x: x.clone(),
            y: y.clone(),
        }),
        _ => None,
    }
}

fn position(value: &Value) -> Option<(Number, Number)> {
    match value.as_array()?.as_slice() {
        [Value::Number(x), Value::Number(y), ..] => Some((x.clone(), y.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_geojson_point_and_polygon() {
        let collection = FeatureCollection::from_value(&json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "geometry": {"type": "Point", "coordinates": [-74.0, 40.0]},
                    "properties": {"Name": "Test Point"}
                },
                {
                    "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]},
                    "properties": {"NAME": "Block"}
                }
            ]
        }));

        assert_eq!(collection.len(), 2);
        match &collection.features[0].geometry {
            Some(Geometry::Point { x, y }) => {
                assert_eq!(x.to_string(), "-74.0");
                assert_eq!(y.to_string(), "40.0");
            }
            other => panic!("unexpected geometry: {other:?}"),
        }
        match &collection.features[1].geometry {
            Some(Geometry::Polygon { outer }) => assert_eq!(outer.len(), 4),
            other => panic!("unexpected geometry: {other:?}"),
        }
    }

    #[test]
    fn preserves_property_order() {
        let feature = Feature::from_value(&json!({
            "properties": {"zeta": 1, "alpha": 2, "Name": "x"}
        }));
        let keys: Vec<&str> = feature.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "Name"]);
        assert!(feature.geometry.is_none());
    }

    #[test]
    fn malformed_geometry_is_absent() {
        let cases = [
            json!({"type": "Point", "coordinates": [1.5]}),
            json!({"type": "Polygon", "coordinates": []}),
            json!({"type": "Polygon", "coordinates": [[]]}),
            json!({"type": "Polygon", "coordinates": [[[0, 0], ["a", 1]]]}),
            json!({"type": "LineString", "coordinates": [[0, 0], [1, 1]]}),
            json!({}),
        ];
        for case in cases {
            assert_eq!(Geometry::from_value(&case), None, "{case}");
        }
    }

    #[test]
    fn parses_esri_json_shapes() {
        let point = Feature::from_value(&json!({
            "attributes": {"OBJECTID": 1},
            "geometry": {"x": 10.5, "y": -3}
        }));
        assert!(matches!(point.geometry, Some(Geometry::Point { .. })));
        assert_eq!(point.properties.get("OBJECTID"), Some(&json!(1)));

        let polygon = Geometry::from_value(&json!({"rings": [[[0, 0], [2, 0], [2, 2], [0, 0]]]}));
        assert!(matches!(polygon, Some(Geometry::Polygon { ref outer }) if outer.len() == 4));
    }

    #[test]
    fn missing_features_key_is_empty() {
        assert!(FeatureCollection::from_value(&json!({"count": 12})).is_empty());
    }
}
