//! GeoJSON dataset loading.
//!
//! A dataset is either a single `FeatureCollection`, which becomes one layer
//! under a caller-chosen name, or a JSON object whose values are
//! `FeatureCollection`s, one layer per key in document order:
//!
//! ```json
//! {
//!   "islands": { "type": "FeatureCollection", "features": [] },
//!   "papers":  { "type": "FeatureCollection", "features": [] }
//! }
//! ```
//!
//! Features with a `null` geometry are skipped. Everything else that is not
//! a valid feature aborts the load.

use geo::{Coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use geojson::feature::Id;
use geojson::{GeoJson, Value as GeoJsonValue};
use serde_json::Value as JsonValue;

use crate::geometry::{Feature, Geometry, Layer, Layers, PropertyValue};
use crate::validate::{validate_geometry, validate_raw_ring, InvalidReason};
use crate::{Error, Result};

/// Parse a dataset, auto-detecting the single-collection and named-layer forms.
///
/// A top-level object whose `"type"` is `"FeatureCollection"` is loaded as a
/// single layer called `default_layer_name`.
pub fn load_layers(bytes: &[u8], default_layer_name: &str) -> Result<Layers<f64>> {
    let value = parse_json(bytes)?;
    if is_feature_collection(&value) {
        let layer = feature_collection_to_layer(default_layer_name, value)?;
        return Layers::from_layers(vec![layer]);
    }
    named_layers_from_value(value)
}

/// Parse a dataset that must be in the named-layer form.
pub fn load_named_layers(bytes: &[u8]) -> Result<Layers<f64>> {
    named_layers_from_value(parse_json(bytes)?)
}

/// Parse a single `FeatureCollection` into a layer called `name`.
pub fn load_feature_collection(bytes: &[u8], name: &str) -> Result<Layer<f64>> {
    feature_collection_to_layer(name, parse_json(bytes)?)
}

fn parse_json(bytes: &[u8]) -> Result<JsonValue> {
    serde_json::from_slice(bytes).map_err(|e| Error::DatasetParse {
        layer: None,
        reason: e.to_string(),
    })
}

fn is_feature_collection(value: &JsonValue) -> bool {
    value.get("type").and_then(JsonValue::as_str) == Some("FeatureCollection")
}

fn named_layers_from_value(value: JsonValue) -> Result<Layers<f64>> {
    let JsonValue::Object(entries) = value else {
        return Err(Error::DatasetParse {
            layer: None,
            reason: format!("expected an object of named layers, found {}", json_kind(&value)),
        });
    };

    let mut layers = Layers::new();
    for (name, collection) in entries {
        let layer = feature_collection_to_layer(&name, collection)?;
        layers.push(layer)?;
    }
    log::debug!(
        "Loaded {} layers with {} features",
        layers.len(),
        layers.feature_count()
    );
    Ok(layers)
}

fn feature_collection_to_layer(name: &str, value: JsonValue) -> Result<Layer<f64>> {
    let parse_error = |reason: String| Error::DatasetParse {
        layer: Some(name.to_string()),
        reason,
    };

    let collection = match GeoJson::from_json_value(value).map_err(|e| parse_error(e.to_string()))? {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(_) => return Err(parse_error("expected a FeatureCollection, found a Feature".into())),
        GeoJson::Geometry(_) => {
            return Err(parse_error("expected a FeatureCollection, found a Geometry".into()))
        }
    };

    let mut layer = Layer::new(name);
    let mut skipped = 0;
    for (feature_index, feature) in collection.features.into_iter().enumerate() {
        let Some(geometry) = feature.geometry else {
            log::debug!("Layer {:?}: skipping feature {} with null geometry", name, feature_index);
            skipped += 1;
            continue;
        };

        let geometry = convert_geometry(&geometry.value)
            .and_then(|g| validate_geometry(&g).map(|_| g))
            .map_err(|reason| Error::MalformedGeometry {
                layer: name.to_string(),
                feature_index,
                reason: reason.to_string(),
            })?;

        layer.features.push(Feature {
            geometry,
            id: feature.id.as_ref().and_then(numeric_id),
            properties: feature
                .properties
                .map(|props| {
                    props
                        .iter()
                        .map(|(k, v)| (k.clone(), PropertyValue::from(v)))
                        .collect()
                })
                .unwrap_or_default(),
        });
    }

    log::debug!(
        "Loaded layer {:?}: {} features ({} skipped)",
        name,
        layer.len(),
        skipped
    );
    Ok(layer)
}

/// MVT ids are unsigned integers; string and negative ids are dropped.
fn numeric_id(id: &Id) -> Option<u64> {
    match id {
        Id::Number(n) => n.as_u64(),
        Id::String(_) => None,
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

// ============================================================================
// GeoJSON → geo conversion
// ============================================================================

fn convert_geometry(value: &GeoJsonValue) -> std::result::Result<Geometry<f64>, InvalidReason> {
    let geometry = match value {
        GeoJsonValue::Point(p) => Geometry::Point(Point(position(p)?)),
        GeoJsonValue::MultiPoint(points) => Geometry::MultiPoint(MultiPoint::new(
            points
                .iter()
                .map(|p| position(p).map(Point))
                .collect::<std::result::Result<_, _>>()?,
        )),
        GeoJsonValue::LineString(line) => Geometry::LineString(line_string(line)?),
        GeoJsonValue::MultiLineString(lines) => Geometry::MultiLineString(MultiLineString::new(
            lines
                .iter()
                .map(|line| line_string(line))
                .collect::<std::result::Result<_, _>>()?,
        )),
        GeoJsonValue::Polygon(rings) => Geometry::Polygon(polygon(rings)?),
        GeoJsonValue::MultiPolygon(polygons) => Geometry::MultiPolygon(MultiPolygon::new(
            polygons
                .iter()
                .map(|rings| polygon(rings))
                .collect::<std::result::Result<_, _>>()?,
        )),
        GeoJsonValue::GeometryCollection(_) => {
            return Err(InvalidReason::UnsupportedType("GeometryCollection"))
        }
    };
    Ok(geometry)
}

fn position(p: &[f64]) -> std::result::Result<Coord<f64>, InvalidReason> {
    match p {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(InvalidReason::ShortPosition { dimensions: p.len() }),
    }
}

fn coords(positions: &[Vec<f64>]) -> std::result::Result<Vec<Coord<f64>>, InvalidReason> {
    positions.iter().map(|p| position(p)).collect()
}

fn line_string(positions: &[Vec<f64>]) -> std::result::Result<LineString<f64>, InvalidReason> {
    Ok(LineString::new(coords(positions)?))
}

/// Rings are checked before `Polygon::new`, which would silently close them.
fn polygon(rings: &[Vec<Vec<f64>>]) -> std::result::Result<Polygon<f64>, InvalidReason> {
    let mut rings = rings
        .iter()
        .enumerate()
        .map(|(ring_index, ring)| {
            let ring = coords(ring)?;
            validate_raw_ring(&ring, ring_index)?;
            Ok(LineString::new(ring))
        })
        .collect::<std::result::Result<Vec<_>, InvalidReason>>()?;

    if rings.is_empty() {
        return Err(InvalidReason::TooFewRingPoints {
            ring_index: 0,
            unique_points: 0,
        });
    }
    let exterior = rings.remove(0);
    Ok(Polygon::new(exterior, rings))
}
