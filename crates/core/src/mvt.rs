//! MVT (Mapbox Vector Tile) encoding and decoding.
//!
//! Encodes tile-local geometries into the MVT v2 wire structures:
//!
//! - **Zigzag encoding**: Efficiently encode signed integers as unsigned
//! - **Delta encoding**: Store coordinates as differences from previous position
//! - **Command encoding**: Pack geometry commands (MoveTo, LineTo, ClosePath)
//! - **Feature encoding**: Convert a [`TileGeometry`] to an MVT Feature
//! - **Layer encoding**: Group features with deduplicated keys/values
//!
//! The decoding half turns an encoded layer back into [`Layer<i64>`] so that
//! tiles can be inspected and verified.
//!
//! Reference: <https://github.com/mapbox/vector-tile-spec>

use std::collections::HashMap;

use geo::{Coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};

use crate::feature_drop::signed_ring_area;
use crate::geometry::{self, Number, PropertyValue, TileGeometry};
use crate::vector_tile::tile::{self, GeomType, Value};
use crate::vector_tile::Tile;
use crate::{Error, Result};

/// Default tile extent (4096 as per MVT spec)
pub const DEFAULT_EXTENT: u32 = 4096;

/// Layer version written into every encoded layer
pub const MVT_VERSION: u32 = 2;

/// MVT command IDs
pub const CMD_MOVE_TO: u32 = 1;
pub const CMD_LINE_TO: u32 = 2;
pub const CMD_CLOSE_PATH: u32 = 7;

/// Largest repeat count that fits next to the 3-bit command id
const MAX_COMMAND_COUNT: usize = (1 << 29) - 1;

// ============================================================================
// Zigzag Encoding
// ============================================================================

/// Encode a signed integer using zigzag encoding.
///
/// Zigzag encoding maps signed integers to unsigned integers so that
/// small negative numbers have small encoded values:
/// - 0 → 0
/// - -1 → 1
/// - 1 → 2
/// - -2 → 3
/// - 2 → 4
/// - etc.
#[inline]
pub fn zigzag_encode(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Decode a zigzag-encoded unsigned integer back to signed.
#[inline]
pub fn zigzag_decode(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

// ============================================================================
// Command Encoding
// ============================================================================

/// Pack a command with a repeat count.
///
/// MVT commands are packed as: `(command_id | (count << 3))`
/// - command_id: 1=MoveTo, 2=LineTo, 7=ClosePath
/// - count: number of times to repeat the command
#[inline]
pub fn command_encode(command_id: u32, count: u32) -> u32 {
    (command_id & 0x7) | (count << 3)
}

/// Unpack a command into (command_id, count).
#[inline]
pub fn command_decode(command: u32) -> (u32, u32) {
    (command & 0x7, command >> 3)
}

// ============================================================================
// Geometry Encoding
// ============================================================================

/// Accumulates the command stream of one feature.
///
/// The cursor starts at (0, 0) and carries over between the parts of a
/// multi-geometry.
struct CommandWriter {
    commands: Vec<u32>,
    cursor: Coord<i64>,
}

impl CommandWriter {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
            cursor: Coord { x: 0, y: 0 },
        }
    }

    fn command(&mut self, command_id: u32, count: usize) -> Result<()> {
        if count > MAX_COMMAND_COUNT {
            return Err(Error::MvtEncoding(format!(
                "command count {} exceeds {}",
                count, MAX_COMMAND_COUNT
            )));
        }
        self.commands.push(command_encode(command_id, count as u32));
        Ok(())
    }

    fn vertex(&mut self, c: Coord<i64>) -> Result<()> {
        fit_i32(c.x, "coordinate")?;
        fit_i32(c.y, "coordinate")?;
        let dx = fit_i32(c.x - self.cursor.x, "coordinate delta")?;
        let dy = fit_i32(c.y - self.cursor.y, "coordinate delta")?;
        self.commands.push(zigzag_encode(dx));
        self.commands.push(zigzag_encode(dy));
        self.cursor = c;
        Ok(())
    }

    fn move_to(&mut self, points: &[Coord<i64>]) -> Result<()> {
        self.command(CMD_MOVE_TO, points.len())?;
        points.iter().try_for_each(|c| self.vertex(*c))
    }

    fn line_to(&mut self, points: &[Coord<i64>]) -> Result<()> {
        self.command(CMD_LINE_TO, points.len())?;
        points.iter().try_for_each(|c| self.vertex(*c))
    }

    /// MoveTo the first vertex, LineTo the rest.
    fn path(&mut self, points: &[Coord<i64>]) -> Result<()> {
        self.move_to(&points[..1])?;
        self.line_to(&points[1..])
    }

    /// A ring without its closing vertex, terminated by ClosePath.
    fn ring(&mut self, open_ring: &[Coord<i64>]) -> Result<()> {
        self.path(open_ring)?;
        self.command(CMD_CLOSE_PATH, 1)
    }

    fn linestring(&mut self, ls: &LineString<i64>) -> Result<()> {
        // Linestrings need at least 2 points
        if ls.0.len() < 2 {
            return Ok(());
        }
        self.path(&ls.0)
    }

    fn polygon(&mut self, poly: &Polygon<i64>) -> Result<()> {
        let Some(exterior) = orient_ring(&poly.exterior().0, true) else {
            return Ok(());
        };
        self.ring(&exterior)?;
        for interior in poly.interiors() {
            if let Some(hole) = orient_ring(&interior.0, false) {
                self.ring(&hole)?;
            }
        }
        Ok(())
    }

    fn finish(self) -> Vec<u32> {
        self.commands
    }
}

fn fit_i32(value: i64, what: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| Error::MvtEncoding(format!("{} {} does not fit in 32 bits", what, value)))
}

/// Open a closed ring and orient it for MVT.
///
/// MVT specification requires:
/// - Exterior rings: positive shoelace area in tile coordinates (clockwise on screen)
/// - Interior rings: negative area (counter-clockwise on screen)
///
/// Returns `None` for rings with fewer than 3 vertices or zero area. A
/// zero-area ring has no winding, so a decoder could not tell its role.
fn orient_ring(ring: &[Coord<i64>], exterior: bool) -> Option<Vec<Coord<i64>>> {
    let area = signed_ring_area(ring);
    let mut open = ring.to_vec();
    if open.len() > 1 && open.first() == open.last() {
        open.pop();
    }
    if open.len() < 3 || area == 0.0 {
        return None;
    }
    if (exterior && area < 0.0) || (!exterior && area > 0.0) {
        open.reverse();
    }
    Some(open)
}

/// Encode a tile geometry to MVT geometry commands and return the geometry type.
///
/// Degenerate parts (lines under 2 points, rings under 3 vertices or with
/// zero area) are left
/// out; a geometry with nothing left encodes to an empty command stream.
pub fn encode_geometry(geom: &TileGeometry) -> Result<(Vec<u32>, GeomType)> {
    let mut writer = CommandWriter::new();
    let geom_type = match geom {
        TileGeometry::Point(p) => {
            writer.move_to(&[p.0])?;
            GeomType::Point
        }
        TileGeometry::MultiPoint(mp) => {
            if !mp.0.is_empty() {
                let points: Vec<Coord<i64>> = mp.0.iter().map(|p| p.0).collect();
                writer.move_to(&points)?;
            }
            GeomType::Point
        }
        TileGeometry::LineString(ls) => {
            writer.linestring(ls)?;
            GeomType::Linestring
        }
        TileGeometry::MultiLineString(mls) => {
            mls.0.iter().try_for_each(|ls| writer.linestring(ls))?;
            GeomType::Linestring
        }
        TileGeometry::Polygon(poly) => {
            writer.polygon(poly)?;
            GeomType::Polygon
        }
        TileGeometry::MultiPolygon(mp) => {
            mp.0.iter().try_for_each(|poly| writer.polygon(poly))?;
            GeomType::Polygon
        }
    };
    Ok((writer.finish(), geom_type))
}

// ============================================================================
// Property Encoding
// ============================================================================

/// Identity of an encoded value for deduplication: type + content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ValueKey {
    String(String),
    Double(u64),
    UInt(u64),
    SInt(i64),
    Bool(bool),
}

impl ValueKey {
    fn to_mvt_value(&self) -> Value {
        match self {
            ValueKey::String(s) => Value {
                string_value: Some(s.clone()),
                ..Default::default()
            },
            ValueKey::Double(bits) => Value {
                double_value: Some(f64::from_bits(*bits)),
                ..Default::default()
            },
            ValueKey::UInt(u) => Value {
                uint_value: Some(*u),
                ..Default::default()
            },
            ValueKey::SInt(i) => Value {
                sint_value: Some(*i),
                ..Default::default()
            },
            ValueKey::Bool(b) => Value {
                bool_value: Some(*b),
                ..Default::default()
            },
        }
    }
}

/// Map a property to the MVT value it is stored as. `Null` is not stored.
///
/// Arrays and objects have no MVT counterpart and are stored as JSON text.
fn value_key(value: &PropertyValue) -> Option<ValueKey> {
    let key = match value {
        PropertyValue::Null => return None,
        PropertyValue::Bool(b) => ValueKey::Bool(*b),
        PropertyValue::Number(Number::UInt(u)) => ValueKey::UInt(*u),
        PropertyValue::Number(Number::Int(i)) => match u64::try_from(*i) {
            Ok(u) => ValueKey::UInt(u),
            Err(_) => ValueKey::SInt(*i),
        },
        PropertyValue::Number(Number::Double(d)) => ValueKey::Double(d.to_bits()),
        PropertyValue::String(s) => ValueKey::String(s.clone()),
        PropertyValue::Array(_) | PropertyValue::Object(_) => {
            ValueKey::String(value.to_json().to_string())
        }
    };
    Some(key)
}

fn table_index(len: usize, table: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::MvtEncoding(format!("too many {} in layer", table)))
}

// ============================================================================
// Layer / Tile Builders
// ============================================================================

/// Builder for encoding features into an MVT layer.
pub struct LayerBuilder {
    name: String,
    extent: u32,
    features: Vec<tile::Feature>,
    keys: Vec<String>,
    key_index: HashMap<String, u32>,
    values: Vec<Value>,
    value_index: HashMap<ValueKey, u32>,
}

impl LayerBuilder {
    /// Create a new layer builder with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extent: DEFAULT_EXTENT,
            features: Vec::new(),
            keys: Vec::new(),
            key_index: HashMap::new(),
            values: Vec::new(),
            value_index: HashMap::new(),
        }
    }

    /// Set the layer extent.
    pub fn with_extent(mut self, extent: u32) -> Self {
        self.extent = extent;
        self
    }

    /// Get or insert a key, returning its index.
    fn get_or_insert_key(&mut self, key: &str) -> Result<u32> {
        if let Some(&idx) = self.key_index.get(key) {
            return Ok(idx);
        }
        let idx = table_index(self.keys.len(), "keys")?;
        self.keys.push(key.to_string());
        self.key_index.insert(key.to_string(), idx);
        Ok(idx)
    }

    /// Get or insert a value, returning its index.
    fn get_or_insert_value(&mut self, value: ValueKey) -> Result<u32> {
        if let Some(&idx) = self.value_index.get(&value) {
            return Ok(idx);
        }
        let idx = table_index(self.values.len(), "values")?;
        self.values.push(value.to_mvt_value());
        self.value_index.insert(value, idx);
        Ok(idx)
    }

    /// Add a feature to the layer.
    ///
    /// Features whose geometry encodes to nothing are skipped.
    pub fn add_feature(&mut self, feature: &geometry::Feature<i64>) -> Result<()> {
        let (geom_commands, geom_type) = encode_geometry(&feature.geometry)?;

        // Skip empty geometries
        if geom_commands.is_empty() {
            log::trace!(
                "Layer {:?}: skipping degenerate {}",
                self.name,
                feature.geometry.type_name()
            );
            return Ok(());
        }

        // Encode tags as [key_idx, value_idx, key_idx, value_idx, ...]
        let mut tags = Vec::with_capacity(feature.properties.len() * 2);
        for (key, value) in &feature.properties {
            let Some(value) = value_key(value) else {
                continue;
            };
            tags.push(self.get_or_insert_key(key)?);
            tags.push(self.get_or_insert_value(value)?);
        }

        self.features.push(tile::Feature {
            id: feature.id,
            tags,
            r#type: Some(geom_type as i32),
            geometry: geom_commands,
        });
        Ok(())
    }

    /// Build the MVT Layer.
    pub fn build(self) -> tile::Layer {
        tile::Layer {
            version: MVT_VERSION,
            name: self.name,
            features: self.features,
            keys: self.keys,
            values: self.values,
            extent: Some(self.extent),
        }
    }
}

/// Builder for encoding multiple layers into an MVT tile.
pub struct TileBuilder {
    layers: Vec<tile::Layer>,
}

impl TileBuilder {
    /// Create a new tile builder.
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Add a layer to the tile.
    pub fn add_layer(&mut self, layer: tile::Layer) {
        self.layers.push(layer);
    }

    /// Build the MVT Tile.
    pub fn build(self) -> Tile {
        Tile {
            layers: self.layers,
        }
    }
}

impl Default for TileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode one tile-space layer.
pub fn encode_layer(layer: &geometry::Layer<i64>, extent: u32) -> Result<tile::Layer> {
    let mut builder = LayerBuilder::new(layer.name.clone()).with_extent(extent);
    for feature in &layer.features {
        builder.add_feature(feature)?;
    }
    Ok(builder.build())
}

// ============================================================================
// Decoding
// ============================================================================

fn malformed(reason: impl Into<String>) -> Error {
    Error::MvtDecode(reason.into())
}

/// Paths of a command stream. Closed paths repeat their first vertex at the end.
fn decode_paths(commands: &[u32]) -> Result<Vec<Vec<Coord<i64>>>> {
    let mut paths: Vec<Vec<Coord<i64>>> = Vec::new();
    let mut cursor = Coord { x: 0_i64, y: 0_i64 };
    let mut iter = commands.iter();

    while let Some(&command) = iter.next() {
        let (id, count) = command_decode(command);
        match id {
            CMD_MOVE_TO | CMD_LINE_TO => {
                for _ in 0..count {
                    let (Some(&dx), Some(&dy)) = (iter.next(), iter.next()) else {
                        return Err(malformed("command stream ends inside a vertex"));
                    };
                    cursor.x += zigzag_decode(dx) as i64;
                    cursor.y += zigzag_decode(dy) as i64;

                    if id == CMD_MOVE_TO {
                        paths.push(vec![cursor]);
                    } else {
                        paths
                            .last_mut()
                            .ok_or_else(|| malformed("LineTo before MoveTo"))?
                            .push(cursor);
                    }
                }
            }
            CMD_CLOSE_PATH => {
                let path = paths
                    .last_mut()
                    .ok_or_else(|| malformed("ClosePath before MoveTo"))?;
                let first = path[0];
                path.push(first);
            }
            other => return Err(malformed(format!("unknown command id {}", other))),
        }
    }
    Ok(paths)
}

/// Rebuild the geometry of an encoded feature.
///
/// Polygon rings are grouped by winding: a positive-area ring starts a new
/// polygon, a negative-area ring is a hole of the preceding one. Returns
/// `None` for an empty command stream.
pub fn decode_geometry(feature: &tile::Feature) -> Result<Option<TileGeometry>> {
    let paths = decode_paths(&feature.geometry)?;
    if paths.is_empty() {
        return Ok(None);
    }

    let geom_type = feature
        .r#type
        .and_then(|t| GeomType::try_from(t).ok())
        .unwrap_or(GeomType::Unknown);

    let geometry = match geom_type {
        GeomType::Point => {
            let mut points: Vec<Point<i64>> = paths.into_iter().flatten().map(Point).collect();
            if points.len() == 1 {
                TileGeometry::Point(points.remove(0))
            } else {
                TileGeometry::MultiPoint(MultiPoint::new(points))
            }
        }
        GeomType::Linestring => {
            let mut lines: Vec<LineString<i64>> = paths.into_iter().map(LineString::new).collect();
            if lines.len() == 1 {
                TileGeometry::LineString(lines.remove(0))
            } else {
                TileGeometry::MultiLineString(MultiLineString::new(lines))
            }
        }
        GeomType::Polygon => {
            let mut polygons: Vec<(LineString<i64>, Vec<LineString<i64>>)> = Vec::new();
            for ring in paths {
                if signed_ring_area(&ring) > 0.0 {
                    polygons.push((LineString::new(ring), Vec::new()));
                } else {
                    polygons
                        .last_mut()
                        .ok_or_else(|| malformed("polygon starts with an interior ring"))?
                        .1
                        .push(LineString::new(ring));
                }
            }
            let mut polygons: Vec<Polygon<i64>> = polygons
                .into_iter()
                .map(|(exterior, interiors)| Polygon::new(exterior, interiors))
                .collect();
            if polygons.len() == 1 {
                TileGeometry::Polygon(polygons.remove(0))
            } else {
                TileGeometry::MultiPolygon(MultiPolygon::new(polygons))
            }
        }
        GeomType::Unknown => return Err(malformed("feature has unknown geometry type")),
    };
    Ok(Some(geometry))
}

fn decode_value(value: &Value) -> PropertyValue {
    if let Some(s) = &value.string_value {
        PropertyValue::String(s.clone())
    } else if let Some(b) = value.bool_value {
        PropertyValue::Bool(b)
    } else if let Some(u) = value.uint_value {
        PropertyValue::Number(Number::UInt(u))
    } else if let Some(i) = value.sint_value.or(value.int_value) {
        PropertyValue::from(i)
    } else if let Some(d) = value.double_value {
        PropertyValue::Number(Number::Double(d))
    } else if let Some(f) = value.float_value {
        PropertyValue::Number(Number::Double(f as f64))
    } else {
        PropertyValue::Null
    }
}

/// Rebuild the property list of an encoded feature from the layer tables.
pub fn decode_properties(
    layer: &tile::Layer,
    feature: &tile::Feature,
) -> Result<Vec<(String, PropertyValue)>> {
    if feature.tags.len() % 2 != 0 {
        return Err(malformed("odd number of tags"));
    }
    feature
        .tags
        .chunks(2)
        .map(|pair| {
            let key = layer
                .keys
                .get(pair[0] as usize)
                .ok_or_else(|| malformed(format!("key index {} out of range", pair[0])))?;
            let value = layer
                .values
                .get(pair[1] as usize)
                .ok_or_else(|| malformed(format!("value index {} out of range", pair[1])))?;
            Ok((key.clone(), decode_value(value)))
        })
        .collect()
}

/// Decode an encoded layer back into tile-space features.
pub fn decode_layer(layer: &tile::Layer) -> Result<geometry::Layer<i64>> {
    let mut decoded = geometry::Layer::new(layer.name.clone());
    for feature in &layer.features {
        let Some(geometry) = decode_geometry(feature)? else {
            continue;
        };
        decoded.features.push(geometry::Feature {
            geometry,
            id: feature.id,
            properties: decode_properties(layer, feature)?,
        });
    }
    Ok(decoded)
}

// ============================================================================
// Tests
// ============================================================================
