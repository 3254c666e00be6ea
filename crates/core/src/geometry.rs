//! Feature model shared by every pipeline stage.
//!
//! Geometries are generic over the coordinate type: `Geometry<f64>` holds
//! longitude/latitude in world space, [`TileGeometry`] (`Geometry<i64>`) holds
//! integer coordinates on a tile's local grid. Each stage takes a layer by
//! reference and returns a new one, so the same types flow from the loader to
//! the encoder.

use geo::{
    BoundingRect, Coord, CoordNum, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon, Rect,
};
use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// A geometry restricted to the six types a vector tile can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry<T: CoordNum = f64> {
    Point(Point<T>),
    MultiPoint(MultiPoint<T>),
    LineString(LineString<T>),
    MultiLineString(MultiLineString<T>),
    Polygon(Polygon<T>),
    MultiPolygon(MultiPolygon<T>),
}

/// Geometry projected onto a tile's integer grid
pub type TileGeometry = Geometry<i64>;

impl<T: CoordNum> Geometry<T> {
    /// GeoJSON name of the geometry type
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Bounding box of all coordinates, `None` for an empty geometry.
    pub fn bounding_rect(&self) -> Option<Rect<T>> {
        match self {
            Geometry::Point(p) => Some(p.bounding_rect()),
            Geometry::MultiPoint(mp) => mp.bounding_rect(),
            Geometry::LineString(ls) => ls.bounding_rect(),
            Geometry::MultiLineString(mls) => mls.bounding_rect(),
            Geometry::Polygon(poly) => poly.bounding_rect(),
            Geometry::MultiPolygon(mp) => mp.bounding_rect(),
        }
    }

    /// Iterate over every coordinate, ring closing points included.
    pub fn coords(&self) -> Box<dyn Iterator<Item = Coord<T>> + '_> {
        match self {
            Geometry::Point(p) => Box::new(std::iter::once(p.0)),
            Geometry::MultiPoint(mp) => Box::new(mp.0.iter().map(|p| p.0)),
            Geometry::LineString(ls) => Box::new(ls.0.iter().copied()),
            Geometry::MultiLineString(mls) => {
                Box::new(mls.0.iter().flat_map(|ls| ls.0.iter().copied()))
            }
            Geometry::Polygon(poly) => Box::new(polygon_coords(poly)),
            Geometry::MultiPolygon(mp) => Box::new(mp.0.iter().flat_map(polygon_coords)),
        }
    }

    /// Rebuild the geometry with every coordinate passed through `f`.
    ///
    /// Structure (part order, ring order, vertex order) is preserved. The
    /// first error returned by `f` aborts the mapping.
    pub fn try_map_coords<U, E, F>(&self, mut f: F) -> std::result::Result<Geometry<U>, E>
    where
        U: CoordNum,
        F: FnMut(Coord<T>) -> std::result::Result<Coord<U>, E>,
    {
        let geometry = match self {
            Geometry::Point(p) => Geometry::Point(Point(f(p.0)?)),
            Geometry::MultiPoint(mp) => Geometry::MultiPoint(MultiPoint::new(
                mp.0.iter()
                    .map(|p| f(p.0).map(Point))
                    .collect::<std::result::Result<_, _>>()?,
            )),
            Geometry::LineString(ls) => Geometry::LineString(map_line(ls, &mut f)?),
            Geometry::MultiLineString(mls) => Geometry::MultiLineString(MultiLineString::new(
                mls.0
                    .iter()
                    .map(|ls| map_line(ls, &mut f))
                    .collect::<std::result::Result<_, _>>()?,
            )),
            Geometry::Polygon(poly) => Geometry::Polygon(map_polygon(poly, &mut f)?),
            Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(MultiPolygon::new(
                mp.0.iter()
                    .map(|poly| map_polygon(poly, &mut f))
                    .collect::<std::result::Result<_, _>>()?,
            )),
        };
        Ok(geometry)
    }
}

fn polygon_coords<T: CoordNum>(poly: &Polygon<T>) -> impl Iterator<Item = Coord<T>> + '_ {
    poly.exterior()
        .0
        .iter()
        .chain(poly.interiors().iter().flat_map(|ring| ring.0.iter()))
        .copied()
}

fn map_line<T, U, E, F>(ls: &LineString<T>, f: &mut F) -> std::result::Result<LineString<U>, E>
where
    T: CoordNum,
    U: CoordNum,
    F: FnMut(Coord<T>) -> std::result::Result<Coord<U>, E>,
{
    ls.0.iter()
        .map(|c| f(*c))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn map_polygon<T, U, E, F>(poly: &Polygon<T>, f: &mut F) -> std::result::Result<Polygon<U>, E>
where
    T: CoordNum,
    U: CoordNum,
    F: FnMut(Coord<T>) -> std::result::Result<Coord<U>, E>,
{
    let exterior = map_line(poly.exterior(), f)?;
    let interiors = poly
        .interiors()
        .iter()
        .map(|ring| map_line(ring, f))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

macro_rules! impl_from_geo {
    ($($variant:ident),*) => {
        $(
            impl<T: CoordNum> From<$variant<T>> for Geometry<T> {
                fn from(value: $variant<T>) -> Self {
                    Geometry::$variant(value)
                }
            }
        )*
    };
}

impl_from_geo!(Point, MultiPoint, LineString, MultiLineString, Polygon, MultiPolygon);

// ============================================================================
// Properties
// ============================================================================

/// Numeric property value, split the way MVT stores numbers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Non-negative integer
    UInt(u64),
    /// Negative integer
    Int(i64),
    Double(f64),
}

impl From<&serde_json::Number> for Number {
    fn from(n: &serde_json::Number) -> Self {
        if let Some(u) = n.as_u64() {
            Number::UInt(u)
        } else if let Some(i) = n.as_i64() {
            Number::Int(i)
        } else {
            Number::Double(n.as_f64().unwrap_or(f64::NAN))
        }
    }
}

/// A feature property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<PropertyValue>),
    Object(Vec<(String, PropertyValue)>),
}

impl PropertyValue {
    /// Convert back to JSON. Non-finite doubles become `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            PropertyValue::Null => JsonValue::Null,
            PropertyValue::Bool(b) => JsonValue::Bool(*b),
            PropertyValue::Number(Number::UInt(u)) => JsonValue::from(*u),
            PropertyValue::Number(Number::Int(i)) => JsonValue::from(*i),
            PropertyValue::Number(Number::Double(d)) => serde_json::Number::from_f64(*d)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            PropertyValue::String(s) => JsonValue::String(s.clone()),
            PropertyValue::Array(items) => {
                JsonValue::Array(items.iter().map(PropertyValue::to_json).collect())
            }
            PropertyValue::Object(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<&JsonValue> for PropertyValue {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => PropertyValue::Null,
            JsonValue::Bool(b) => PropertyValue::Bool(*b),
            JsonValue::Number(n) => PropertyValue::Number(n.into()),
            JsonValue::String(s) => PropertyValue::String(s.clone()),
            JsonValue::Array(items) => {
                PropertyValue::Array(items.iter().map(PropertyValue::from).collect())
            }
            JsonValue::Object(map) => PropertyValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), PropertyValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        match u64::try_from(i) {
            Ok(u) => PropertyValue::Number(Number::UInt(u)),
            Err(_) => PropertyValue::Number(Number::Int(i)),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(d: f64) -> Self {
        PropertyValue::Number(Number::Double(d))
    }
}

// ============================================================================
// Features and layers
// ============================================================================

/// A geometry with its identifier and properties
#[derive(Debug, Clone, PartialEq)]
pub struct Feature<T: CoordNum = f64> {
    pub geometry: Geometry<T>,
    pub id: Option<u64>,
    /// Properties in input order
    pub properties: Vec<(String, PropertyValue)>,
}

impl<T: CoordNum> Feature<T> {
    pub fn new(geometry: impl Into<Geometry<T>>) -> Self {
        Self {
            geometry: geometry.into(),
            id: None,
            properties: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Same id and properties, different geometry.
    pub fn with_geometry<U: CoordNum>(&self, geometry: Geometry<U>) -> Feature<U> {
        Feature {
            geometry,
            id: self.id,
            properties: self.properties.clone(),
        }
    }

    /// Look up a property by key
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

/// A named, ordered collection of features
#[derive(Debug, Clone, PartialEq)]
pub struct Layer<T: CoordNum = f64> {
    pub name: String,
    pub features: Vec<Feature<T>>,
}

impl<T: CoordNum> Layer<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
        }
    }

    pub fn with_features(name: impl Into<String>, features: Vec<Feature<T>>) -> Self {
        Self {
            name: name.into(),
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Ordered layers with unique names
#[derive(Debug, Clone, PartialEq)]
pub struct Layers<T: CoordNum = f64> {
    layers: Vec<Layer<T>>,
}

impl<T: CoordNum> Default for Layers<T> {
    fn default() -> Self {
        Self { layers: Vec::new() }
    }
}

impl<T: CoordNum> Layers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of layers, rejecting duplicate names.
    pub fn from_layers(layers: Vec<Layer<T>>) -> Result<Self> {
        let mut out = Self::new();
        for layer in layers {
            out.push(layer)?;
        }
        Ok(out)
    }

    /// Append a layer. Fails with [`Error::DatasetParse`] if the name is taken.
    pub fn push(&mut self, layer: Layer<T>) -> Result<()> {
        if self.get(&layer.name).is_some() {
            return Err(Error::DatasetParse {
                layer: Some(layer.name),
                reason: "duplicate layer name".to_string(),
            });
        }
        self.layers.push(layer);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Layer<T>> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Layer<T>> {
        self.layers.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|layer| layer.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Total number of features across all layers
    pub fn feature_count(&self) -> usize {
        self.layers.iter().map(Layer::len).sum()
    }

    /// Transform every layer, keeping names and order.
    ///
    /// `f` must not rename layers; names are carried over from the input.
    pub fn try_map<U, F>(&self, mut f: F) -> Result<Layers<U>>
    where
        U: CoordNum,
        F: FnMut(&Layer<T>) -> Result<Vec<Feature<U>>>,
    {
        let layers = self
            .layers
            .iter()
            .map(|layer| Ok(Layer::with_features(layer.name.clone(), f(layer)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Layers { layers })
    }
}

impl<T: CoordNum> IntoIterator for Layers<T> {
    type Item = Layer<T>;
    type IntoIter = std::vec::IntoIter<Layer<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.into_iter()
    }
}

impl<'a, T: CoordNum> IntoIterator for &'a Layers<T> {
    type Item = &'a Layer<T>;
    type IntoIter = std::slice::Iter<'a, Layer<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}
