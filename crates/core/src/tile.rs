//! Tile coordinate validation
//!
//! A tile request arrives as three signed integers. This module turns it into
//! a [`TileCoord`], rejecting negative components, and applies the
//! [`RangePolicy`] to addresses beyond the edge of the tile pyramid.

use serde::Deserialize;

use crate::{Error, Result};

/// Tile coordinates: x, y, and zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

/// What to do with a tile address whose `x` or `y` is `>= 2^zoom`.
///
/// Such an address does not exist in the tile pyramid. `Allow` lets it
/// through (the tile is simply empty or degenerate), `Reject` fails
/// validation with [`Error::InvalidTileCoordinate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangePolicy {
    #[default]
    Allow,
    Reject,
}

impl TileCoord {
    /// Create a new tile coordinate
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Validate a signed `(zoom, x, y)` triple.
    ///
    /// Fails when any component is negative or too large to be stored. The
    /// error lists every offending field, not just the first one.
    pub fn try_new(zoom: i64, x: i64, y: i64) -> Result<Self> {
        let mut fields = Vec::new();
        let z = u8::try_from(zoom).map_err(|_| fields.push("zoom")).ok();
        let tx = u32::try_from(x).map_err(|_| fields.push("x")).ok();
        let ty = u32::try_from(y).map_err(|_| fields.push("y")).ok();

        match (z, tx, ty) {
            (Some(z), Some(tx), Some(ty)) => Ok(Self::new(tx, ty, z)),
            _ => Err(Error::InvalidTileCoordinate { zoom, x, y, fields }),
        }
    }

    /// Number of tiles along one axis at this zoom level (`2^z`).
    pub fn tiles_per_side(&self) -> f64 {
        2_f64.powi(self.z as i32)
    }

    /// Whether `x` and `y` address an existing tile at this zoom level.
    pub fn is_in_range(&self) -> bool {
        let n = self.tiles_per_side();
        (self.x as f64) < n && (self.y as f64) < n
    }

    /// Apply a [`RangePolicy`] to this coordinate.
    pub fn check_range(self, policy: RangePolicy) -> Result<Self> {
        if policy == RangePolicy::Allow || self.is_in_range() {
            return Ok(self);
        }

        let n = self.tiles_per_side();
        let mut fields = Vec::new();
        if self.x as f64 >= n {
            fields.push("x");
        }
        if self.y as f64 >= n {
            fields.push("y");
        }
        Err(Error::InvalidTileCoordinate {
            zoom: self.z as i64,
            x: self.x as i64,
            y: self.y as i64,
            fields,
        })
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// A tile request as it arrives from a caller: `{"zoom": 3, "x": 4, "y": 2}`.
///
/// Components are signed so that negative values can be reported instead of
/// failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TileRequest {
    pub zoom: i64,
    pub x: i64,
    pub y: i64,
}

impl TileRequest {
    /// Validate this request into a [`TileCoord`].
    pub fn to_tile(&self, policy: RangePolicy) -> Result<TileCoord> {
        TileCoord::try_new(self.zoom, self.x, self.y)?.check_range(policy)
    }
}
