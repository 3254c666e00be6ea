//! Core library for rendering GeoJSON datasets into Mapbox Vector Tiles.
//!
//! A tile request runs a fixed chain of pure stages over every layer of a
//! dataset:
//!
//! ```text
//! GeoJSON → Layers<f64> → project → clip → simplify → drop empty → MVT → gzip
//! ```
//!
//! # Examples
//!
//! ```
//! use geo2mvt_core::pipeline::{generate_tile_from_slice, TilerConfig};
//! use geo2mvt_core::tile::TileRequest;
//!
//! let geojson = br#"{
//!     "type": "FeatureCollection",
//!     "features": [
//!         {"type": "Feature", "properties": {"name": "null island"},
//!          "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}}
//!     ]
//! }"#;
//!
//! let request = TileRequest { zoom: 0, x: 0, y: 0 };
//! let tile = generate_tile_from_slice(geojson, request, &TilerConfig::default()).unwrap();
//! assert!(!tile.is_empty());
//! ```

use thiserror::Error;

pub mod vector_tile;

pub mod clip;
pub mod compression;
pub mod dataset;
pub mod feature_drop;
pub mod geometry;
pub mod mvt;
pub mod pipeline;
pub mod project;
pub mod simplify;
pub mod tile;
pub mod validate;

pub use compression::Compression;
pub use geometry::{Feature, Geometry, Layer, Layers, PropertyValue, TileGeometry};
pub use pipeline::{generate_tile, generate_tile_from_slice, TilerConfig};
pub use tile::{RangePolicy, TileCoord, TileRequest};

/// Errors that can occur while turning a dataset into a vector tile
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid tile coordinate {zoom}/{x}/{y}: {} out of range", .fields.join(", "))]
    InvalidTileCoordinate {
        zoom: i64,
        x: i64,
        y: i64,
        fields: Vec<&'static str>,
    },

    #[error("Failed to parse dataset{}: {reason}", layer_suffix(.layer))]
    DatasetParse {
        layer: Option<String>,
        reason: String,
    },

    #[error("Malformed geometry in layer {layer:?} at feature {feature_index}: {reason}")]
    MalformedGeometry {
        layer: String,
        feature_index: usize,
        reason: String,
    },

    #[error("MVT encoding failed: {0}")]
    MvtEncoding(String),

    #[error("MVT decoding failed: {0}")]
    MvtDecode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn layer_suffix(layer: &Option<String>) -> String {
    match layer {
        Some(name) => format!(" (layer {:?})", name),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_tile_coordinate_lists_fields() {
        let err = Error::InvalidTileCoordinate {
            zoom: 0,
            x: -1,
            y: -2,
            fields: vec!["x", "y"],
        };
        assert_eq!(
            err.to_string(),
            "Invalid tile coordinate 0/-1/-2: x, y out of range"
        );
    }

    #[test]
    fn test_dataset_parse_names_layer() {
        let err = Error::DatasetParse {
            layer: Some("islands".to_string()),
            reason: "not a FeatureCollection".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to parse dataset (layer \"islands\"): not a FeatureCollection"
        );

        let err = Error::DatasetParse {
            layer: None,
            reason: "expected value".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to parse dataset: expected value");
    }

    #[test]
    fn test_encode_and_decode_errors_are_distinct() {
        assert_eq!(
            Error::MvtDecode("truncated".to_string()).to_string(),
            "MVT decoding failed: truncated"
        );
        assert_eq!(
            Error::MvtEncoding("overflow".to_string()).to_string(),
            "MVT encoding failed: overflow"
        );
    }
}
