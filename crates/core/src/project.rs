//! World → tile-local projection.
//!
//! Longitude/latitude are mapped through Web Mercator onto the tile pyramid,
//! then expressed relative to the requested tile on an `extent × extent`
//! integer grid. Coordinates outside the tile are kept (they may be negative
//! or exceed the extent); the clipper deals with them.
//!
//! ```text
//! wx = (lng + 180) / 360 · 2^z
//! wy = (1 − asinh(tan φ) / π) / 2 · 2^z
//! (px, py) = (round((wx − x) · E), round((wy − y) · E))
//! ```

use std::f64::consts::PI;

use geo::Coord;

use crate::geometry::{Feature, Layer, TileGeometry};
use crate::tile::TileCoord;
use crate::validate::{validate_geometry, InvalidReason};
use crate::{Error, Result};

/// Web Mercator latitude limit in degrees
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Project a single position. Latitude is clamped to [`MAX_LATITUDE`].
pub fn project_coord(
    coord: Coord<f64>,
    tile: TileCoord,
    extent: u32,
) -> std::result::Result<Coord<i64>, InvalidReason> {
    if !coord.x.is_finite() || !coord.y.is_finite() {
        return Err(InvalidReason::NonFiniteCoordinate {
            x: coord.x,
            y: coord.y,
        });
    }

    let n = tile.tiles_per_side();
    let lat = coord.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();

    let wx = (coord.x + 180.0) / 360.0 * n;
    let wy = (1.0 - lat.tan().asinh() / PI) / 2.0 * n;

    let extent = extent as f64;
    Ok(Coord {
        x: ((wx - tile.x as f64) * extent).round() as i64,
        y: ((wy - tile.y as f64) * extent).round() as i64,
    })
}

/// Validate and project a world geometry onto the tile grid.
pub fn project_geometry(
    geom: &crate::Geometry<f64>,
    tile: TileCoord,
    extent: u32,
) -> std::result::Result<TileGeometry, InvalidReason> {
    validate_geometry(geom)?;
    geom.try_map_coords(|c| project_coord(c, tile, extent))
}

/// Project every feature of a layer. The first malformed feature aborts.
///
/// `feature_index` in the error is the position in `layer.features`. Layers
/// from the dataset loader never fail here, because the loader has already
/// rejected malformed input using its own input positions.
pub fn project_layer(
    layer: &Layer<f64>,
    tile: TileCoord,
    extent: u32,
) -> Result<Vec<Feature<i64>>> {
    layer
        .features
        .iter()
        .enumerate()
        .map(|(feature_index, feature)| {
            let geometry = project_geometry(&feature.geometry, tile, extent).map_err(|reason| {
                Error::MalformedGeometry {
                    layer: layer.name.clone(),
                    feature_index,
                    reason: reason.to_string(),
                }
            })?;
            Ok(feature.with_geometry(geometry))
        })
        .collect()
}
