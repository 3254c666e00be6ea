//! Structural checks on world-space geometry.
//!
//! The loader and the projector reject geometry that cannot be placed on a
//! tile grid:
//! - Coordinates that are NaN or infinite
//! - Polygon rings whose first and last positions differ
//! - Polygon rings with fewer than 3 unique positions
//! - LineStrings with fewer than 2 positions
//!
//! A failure aborts the whole request with [`crate::Error::MalformedGeometry`]. Nothing
//! is repaired.
//!
//! # Usage
//!
//! ```
//! use geo2mvt_core::validate::validate_geometry;
//! use geo2mvt_core::Geometry;
//! use geo::point;
//!
//! let geom: Geometry<f64> = point!(x: 139.7, y: 35.7).into();
//! assert!(validate_geometry(&geom).is_ok());
//! ```

use geo::{Coord, CoordNum, LineString, Polygon};
use crate::geometry::Geometry;

/// Minimum number of distinct positions in a polygon ring
pub const MIN_RING_UNIQUE_POINTS: usize = 3;

/// Minimum number of positions in a linestring
pub const MIN_LINESTRING_POINTS: usize = 2;

/// Why a geometry was rejected
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum InvalidReason {
    #[error("non-finite coordinate ({x}, {y})")]
    NonFiniteCoordinate { x: f64, y: f64 },

    #[error("ring {ring_index} is not closed")]
    UnclosedRing { ring_index: usize },

    #[error("ring {ring_index} has {unique_points} unique points, need at least 3")]
    TooFewRingPoints {
        ring_index: usize,
        unique_points: usize,
    },

    #[error("linestring has {point_count} points, need at least 2")]
    TooFewLinePoints { point_count: usize },

    #[error("position has {dimensions} dimensions, need at least 2")]
    ShortPosition { dimensions: usize },

    #[error("{0} is not supported")]
    UnsupportedType(&'static str),
}

/// True if `coords` contains at least `min` distinct positions.
pub fn has_unique_points<T: CoordNum>(coords: &[Coord<T>], min: usize) -> bool {
    count_unique_points(coords, min) >= min
}

/// Count distinct positions, stopping once `limit` have been seen.
fn count_unique_points<T: CoordNum>(coords: &[Coord<T>], limit: usize) -> usize {
    let mut seen: Vec<Coord<T>> = Vec::with_capacity(limit);
    for c in coords {
        if seen.len() >= limit {
            break;
        }
        if !seen.contains(c) {
            seen.push(*c);
        }
    }
    seen.len()
}

/// Validate a raw ring as it appears in the input, before `geo` closes it.
pub fn validate_raw_ring(
    ring: &[Coord<f64>],
    ring_index: usize,
) -> std::result::Result<(), InvalidReason> {
    if ring.first() != ring.last() {
        return Err(InvalidReason::UnclosedRing { ring_index });
    }
    validate_ring_points(ring, ring_index)
}

fn validate_ring_points(
    ring: &[Coord<f64>],
    ring_index: usize,
) -> std::result::Result<(), InvalidReason> {
    let unique_points = count_unique_points(ring, MIN_RING_UNIQUE_POINTS);
    if unique_points < MIN_RING_UNIQUE_POINTS {
        return Err(InvalidReason::TooFewRingPoints {
            ring_index,
            unique_points,
        });
    }
    Ok(())
}

fn validate_linestring(ls: &LineString<f64>) -> std::result::Result<(), InvalidReason> {
    let point_count = ls.0.len();
    if point_count < MIN_LINESTRING_POINTS {
        return Err(InvalidReason::TooFewLinePoints { point_count });
    }
    Ok(())
}

fn validate_polygon(poly: &Polygon<f64>) -> std::result::Result<(), InvalidReason> {
    validate_ring_points(&poly.exterior().0, 0)?;
    for (idx, interior) in poly.interiors().iter().enumerate() {
        // +1 because exterior is ring 0
        validate_ring_points(&interior.0, idx + 1)?;
    }
    Ok(())
}

/// Validate a world-space geometry.
pub fn validate_geometry(geom: &Geometry<f64>) -> std::result::Result<(), InvalidReason> {
    if let Some(c) = geom.coords().find(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(InvalidReason::NonFiniteCoordinate { x: c.x, y: c.y });
    }

    match geom {
        Geometry::Point(_) | Geometry::MultiPoint(_) => Ok(()),
        Geometry::LineString(ls) => validate_linestring(ls),
        Geometry::MultiLineString(mls) => mls.0.iter().try_for_each(validate_linestring),
        Geometry::Polygon(poly) => validate_polygon(poly),
        Geometry::MultiPolygon(mp) => mp.0.iter().try_for_each(validate_polygon),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, line_string, point, polygon, MultiPolygon};

    #[test]
    fn test_valid_geometries() {
        let point: Geometry<f64> = point!(x: 1.0, y: 2.0).into();
        assert!(validate_geometry(&point).is_ok());

        let line: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)].into();
        assert!(validate_geometry(&line).is_ok());

        let poly: Geometry<f64> = polygon![(x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)].into();
        assert!(validate_geometry(&poly).is_ok());
    }

    #[test]
    fn test_non_finite_coordinate() {
        let point: Geometry<f64> = point!(x: f64::NAN, y: 0.0).into();
        assert!(matches!(
            validate_geometry(&point),
            Err(InvalidReason::NonFiniteCoordinate { .. })
        ));

        let line: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: f64::INFINITY)].into();
        assert!(matches!(
            validate_geometry(&line),
            Err(InvalidReason::NonFiniteCoordinate { .. })
        ));
    }

    #[test]
    fn test_single_point_linestring() {
        let line: Geometry<f64> = line_string![(x: 0.0, y: 0.0)].into();
        assert_eq!(
            validate_geometry(&line),
            Err(InvalidReason::TooFewLinePoints { point_count: 1 })
        );
    }

    #[test]
    fn test_degenerate_ring() {
        // Two distinct points, closed
        let poly: Geometry<f64> = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)].into();
        assert_eq!(
            validate_geometry(&poly),
            Err(InvalidReason::TooFewRingPoints {
                ring_index: 0,
                unique_points: 2
            })
        );
    }

    #[test]
    fn test_degenerate_hole_in_multipolygon() {
        let good = polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0)];
        let bad = polygon!(
            exterior: [(x: 10.0, y: 0.0), (x: 14.0, y: 0.0), (x: 14.0, y: 4.0)],
            interiors: [[(x: 11.0, y: 1.0), (x: 11.0, y: 1.0), (x: 11.0, y: 1.0)]],
        );
        let geom: Geometry<f64> = MultiPolygon::new(vec![good, bad]).into();
        assert_eq!(
            validate_geometry(&geom),
            Err(InvalidReason::TooFewRingPoints {
                ring_index: 1,
                unique_points: 1
            })
        );
    }

    #[test]
    fn test_raw_ring_must_be_closed() {
        let ring = vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 1.0, y: 0.0 },
            coord! { x: 1.0, y: 1.0 },
        ];
        assert_eq!(
            validate_raw_ring(&ring, 0),
            Err(InvalidReason::UnclosedRing { ring_index: 0 })
        );

        let mut closed = ring.clone();
        closed.push(ring[0]);
        assert!(validate_raw_ring(&closed, 0).is_ok());
    }

    #[test]
    fn test_has_unique_points() {
        let coords = vec![
            coord! { x: 0, y: 0 },
            coord! { x: 0, y: 0 },
            coord! { x: 5, y: 0 },
            coord! { x: 0, y: 0 },
        ];
        assert!(has_unique_points(&coords, 2));
        assert!(!has_unique_points(&coords, 3));
        assert!(!has_unique_points::<i64>(&[], 1));
    }

    #[test]
    fn test_reason_messages() {
        assert_eq!(
            InvalidReason::UnclosedRing { ring_index: 1 }.to_string(),
            "ring 1 is not closed"
        );
        assert_eq!(
            InvalidReason::TooFewLinePoints { point_count: 1 }.to_string(),
            "linestring has 1 points, need at least 2"
        );

        // Usable as a boxed std error
        let err: Box<dyn std::error::Error> = Box::new(InvalidReason::UnsupportedType("Feature"));
        assert_eq!(err.to_string(), "Feature is not supported");
    }
}
