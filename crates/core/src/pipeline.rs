//! Tiler pipeline - wires together projection, clipping, simplification, filtering and MVT encoding.
//!
//! For one tile request every layer of the dataset goes through the same
//! chain of stages:
//! 1. Project longitude/latitude onto the tile's integer grid
//! 2. Clip to the tile extent plus a buffer
//! 3. Simplify with Douglas-Peucker in tile units
//! 4. Drop features that collapsed below the size thresholds
//! 5. Encode to MVT and compress
//!
//! # Tippecanoe Alignment
//!
//! - Buffer: 8 pixels (configurable)
//! - Extent: 4096
//! - Layers with no surviving features are still written, so the tile lists
//!   every layer of the dataset

use prost::Message;

use crate::clip::{clip_features, ClipBounds, DEFAULT_BUFFER};
use crate::compression::{self, compress, Compression};
use crate::dataset::load_layers;
use crate::feature_drop::{remove_empty, DEFAULT_MIN_LINE_LENGTH, DEFAULT_MIN_POLYGON_AREA};
use crate::geometry::Layers;
use crate::mvt::{encode_layer, TileBuilder, DEFAULT_EXTENT};
use crate::project::project_layer;
use crate::simplify::{simplify_features, DEFAULT_TOLERANCE};
use crate::tile::{RangePolicy, TileCoord, TileRequest};
use crate::vector_tile::Tile;
use crate::{Error, Result};

/// Layer name used when the input is a single `FeatureCollection`
pub const DEFAULT_LAYER_NAME: &str = "default";

/// Configuration for the tiling pipeline.
#[derive(Debug, Clone)]
pub struct TilerConfig {
    /// Tile extent in pixels (default: 4096)
    pub extent: u32,
    /// Buffer in pixels around tile bounds (default: 8)
    pub buffer: u32,
    /// Douglas-Peucker tolerance in tile units (default: 1.0)
    pub simplify_tolerance: f64,
    /// Lines shorter than this are dropped (default: 1.0)
    pub min_line_length: f64,
    /// Polygons smaller than this are dropped (default: 1.0)
    pub min_polygon_area: f64,
    /// What to do with `x`/`y` beyond `2^zoom - 1`
    pub range_policy: RangePolicy,
    /// Compression of the encoded tile (default: gzip)
    pub compression: Compression,
    /// Layer name for a bare `FeatureCollection`
    pub default_layer_name: String,
}

impl Default for TilerConfig {
    fn default() -> Self {
        Self {
            extent: DEFAULT_EXTENT,
            buffer: DEFAULT_BUFFER,
            simplify_tolerance: DEFAULT_TOLERANCE,
            min_line_length: DEFAULT_MIN_LINE_LENGTH,
            min_polygon_area: DEFAULT_MIN_POLYGON_AREA,
            range_policy: RangePolicy::default(),
            compression: Compression::default(),
            default_layer_name: DEFAULT_LAYER_NAME.to_string(),
        }
    }
}

impl TilerConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the layer name used for a bare `FeatureCollection`.
    pub fn with_layer_name(mut self, name: impl Into<String>) -> Self {
        self.default_layer_name = name.into();
        self
    }

    /// Set the tile extent.
    pub fn with_extent(mut self, extent: u32) -> Self {
        self.extent = extent;
        self
    }

    /// Set the buffer in pixels.
    pub fn with_buffer(mut self, buffer: u32) -> Self {
        self.buffer = buffer;
        self
    }

    /// Set the simplification tolerance in tile units.
    pub fn with_simplify_tolerance(mut self, tolerance: f64) -> Self {
        self.simplify_tolerance = tolerance;
        self
    }

    /// Set the minimum line length.
    pub fn with_min_line_length(mut self, length: f64) -> Self {
        self.min_line_length = length;
        self
    }

    /// Set the minimum polygon area.
    pub fn with_min_polygon_area(mut self, area: f64) -> Self {
        self.min_polygon_area = area;
        self
    }

    /// Set how out-of-range tile addresses are handled.
    pub fn with_range_policy(mut self, policy: RangePolicy) -> Self {
        self.range_policy = policy;
        self
    }

    /// Set the output compression.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }
}

/// Run every layer through project → clip → simplify → drop empty.
///
/// Layer names and order are preserved; a layer may end up with no features.
pub fn process_layers(
    layers: &Layers<f64>,
    tile: TileCoord,
    config: &TilerConfig,
) -> Result<Layers<i64>> {
    let bounds = ClipBounds::from_extent(config.extent, config.buffer);

    layers.try_map(|layer| {
        let projected = project_layer(layer, tile, config.extent)?;
        let clipped = clip_features(&projected, &bounds);
        let simplified = simplify_features(&clipped, config.simplify_tolerance);
        let kept = remove_empty(
            &simplified,
            config.min_line_length,
            config.min_polygon_area,
        );

        log::debug!(
            "Tile {} layer {:?}: {} features in, {} after clip, {} kept",
            tile,
            layer.name,
            projected.len(),
            clipped.len(),
            kept.len()
        );
        Ok(kept)
    })
}

/// Encode tile-space layers into an MVT tile message, in layer order.
pub fn encode_layers(layers: &Layers<i64>, config: &TilerConfig) -> Result<Tile> {
    let mut tile_builder = TileBuilder::new();
    for layer in layers {
        tile_builder.add_layer(encode_layer(layer, config.extent)?);
    }
    Ok(tile_builder.build())
}

/// Generate one encoded, compressed tile from already-loaded layers.
pub fn generate_tile(layers: &Layers<f64>, tile: TileCoord, config: &TilerConfig) -> Result<Vec<u8>> {
    let processed = process_layers(layers, tile, config)?;
    let data = encode_layers(&processed, config)?.encode_to_vec();
    let compressed = compress(&data, config.compression)?;

    log::debug!(
        "Tile {}: {} layers, {} features, {} bytes ({})",
        tile,
        processed.len(),
        processed.feature_count(),
        compressed.len(),
        config.compression.name()
    );
    Ok(compressed)
}

/// Generate one tile straight from GeoJSON bytes.
///
/// The request is validated before the input is parsed, so a bad tile
/// address is reported even when the input is also broken.
pub fn generate_tile_from_slice(
    input: &[u8],
    request: TileRequest,
    config: &TilerConfig,
) -> Result<Vec<u8>> {
    let tile = request.to_tile(config.range_policy)?;
    if !tile.is_in_range() {
        log::warn!("Tile {} is outside the tile pyramid, output will be empty", tile);
    }

    let layers = load_layers(input, &config.default_layer_name)?;
    generate_tile(&layers, tile, config)
}

/// Decode an MVT tile from bytes, gzip-compressed or raw.
pub fn decode_tile(data: &[u8]) -> Result<Tile> {
    let raw = compression::decompress(data)?;
    Tile::decode(raw.as_slice())
        .map_err(|e| Error::MvtDecode(format!("Failed to decode tile: {}", e)))
}
