//! Removal of features that became too small to draw.
//!
//! After clipping and simplification a line may have collapsed to a point and
//! a polygon to a sliver. Such features are dropped:
//!
//! - **Lines**: total length of all parts `< min_line_length`
//! - **Polygons**: total area `< min_polygon_area`, where each polygon counts
//!   `|area(exterior)| − Σ |area(hole)|`
//! - **Points** are never dropped
//!
//! Both thresholds default to 1.0 tile unit (one pixel at extent 4096).
//!
//! # Coordinate System
//!
//! Measurements are taken on the tile-local integer grid, so a threshold means
//! the same on-screen size at every latitude and zoom.

use geo::{Coord, LineString, Polygon};

use crate::geometry::{Feature, TileGeometry};

/// Default minimum line length in tile units
pub const DEFAULT_MIN_LINE_LENGTH: f64 = 1.0;

/// Default minimum polygon area in square tile units
pub const DEFAULT_MIN_POLYGON_AREA: f64 = 1.0;

/// Signed shoelace area of a closed ring.
///
/// Positive when the ring runs clockwise on screen (y pointing down), which
/// is the orientation MVT requires for exterior rings.
pub fn signed_ring_area(ring: &[Coord<i64>]) -> f64 {
    let twice: i128 = ring
        .windows(2)
        .map(|w| w[0].x as i128 * w[1].y as i128 - w[1].x as i128 * w[0].y as i128)
        .sum();
    twice as f64 / 2.0
}

/// Sum of segment lengths
pub fn linestring_length(ls: &LineString<i64>) -> f64 {
    ls.0.windows(2)
        .map(|w| ((w[1].x - w[0].x) as f64).hypot((w[1].y - w[0].y) as f64))
        .sum()
}

/// Exterior area minus the area of the holes
pub fn polygon_area(poly: &Polygon<i64>) -> f64 {
    let holes: f64 = poly
        .interiors()
        .iter()
        .map(|ring| signed_ring_area(&ring.0).abs())
        .sum();
    signed_ring_area(&poly.exterior().0).abs() - holes
}

/// Size of a geometry: length for lines, area for polygons, `None` for points.
pub fn geometry_measure(geom: &TileGeometry) -> Option<f64> {
    match geom {
        TileGeometry::Point(_) | TileGeometry::MultiPoint(_) => None,
        TileGeometry::LineString(ls) => Some(linestring_length(ls)),
        TileGeometry::MultiLineString(mls) => Some(mls.0.iter().map(linestring_length).sum()),
        TileGeometry::Polygon(poly) => Some(polygon_area(poly)),
        TileGeometry::MultiPolygon(mp) => Some(mp.0.iter().map(polygon_area).sum()),
    }
}

/// Returns true if the geometry is too small to keep.
pub fn is_empty_geometry(geom: &TileGeometry, min_line_length: f64, min_polygon_area: f64) -> bool {
    let Some(measure) = geometry_measure(geom) else {
        return false;
    };
    match geom {
        TileGeometry::LineString(_) | TileGeometry::MultiLineString(_) => measure < min_line_length,
        _ => measure < min_polygon_area,
    }
}

/// Drop empty features, preserving the order of the rest.
pub fn remove_empty(
    features: &[Feature<i64>],
    min_line_length: f64,
    min_polygon_area: f64,
) -> Vec<Feature<i64>> {
    let kept: Vec<Feature<i64>> = features
        .iter()
        .filter(|f| !is_empty_geometry(&f.geometry, min_line_length, min_polygon_area))
        .cloned()
        .collect();

    if kept.len() < features.len() {
        log::trace!("Dropped {} empty features", features.len() - kept.len());
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon, MultiLineString, MultiPoint, MultiPolygon};

    // ----------------------------------------------------------------
    // Measurements
    // ----------------------------------------------------------------

    #[test]
    fn test_signed_ring_area_orientation() {
        // Clockwise on screen (y down): positive
        let ring = line_string![(x: 0, y: 0), (x: 10, y: 0), (x: 10, y: 10), (x: 0, y: 10), (x: 0, y: 0)];
        assert_eq!(signed_ring_area(&ring.0), 100.0);

        let reversed: Vec<_> = ring.0.iter().rev().copied().collect();
        assert_eq!(signed_ring_area(&reversed), -100.0);
    }

    #[test]
    fn test_signed_ring_area_large_coordinates() {
        let big = 1_i64 << 40;
        let ring = line_string![(x: 0, y: 0), (x: big, y: 0), (x: big, y: big), (x: 0, y: 0)];
        assert_eq!(signed_ring_area(&ring.0), (big as f64) * (big as f64) / 2.0);
    }

    #[test]
    fn test_polygon_area_subtracts_holes() {
        let poly = polygon!(
            exterior: [(x: 0, y: 0), (x: 10, y: 0), (x: 10, y: 10), (x: 0, y: 10)],
            interiors: [[(x: 2, y: 2), (x: 2, y: 4), (x: 4, y: 4), (x: 4, y: 2)]],
        );
        assert_eq!(polygon_area(&poly), 96.0);
    }

    #[test]
    fn test_multilinestring_length_sums_parts() {
        let geom = TileGeometry::MultiLineString(MultiLineString::new(vec![
            line_string![(x: 0, y: 0), (x: 3, y: 4)],
            line_string![(x: 0, y: 0), (x: 0, y: 2)],
        ]));
        assert_eq!(geometry_measure(&geom), Some(7.0));
    }

    // ----------------------------------------------------------------
    // Filtering
    // ----------------------------------------------------------------

    #[test]
    fn test_zero_length_line_dropped() {
        let geom: TileGeometry = line_string![(x: 5, y: 5), (x: 5, y: 5)].into();
        assert!(is_empty_geometry(&geom, 1.0, 1.0));

        let geom: TileGeometry = line_string![(x: 5, y: 5), (x: 6, y: 5)].into();
        assert!(!is_empty_geometry(&geom, 1.0, 1.0));
    }

    #[test]
    fn test_zero_area_polygon_dropped() {
        let geom: TileGeometry = polygon![(x: 0, y: 0), (x: 10, y: 0), (x: 20, y: 0)].into();
        assert!(is_empty_geometry(&geom, 1.0, 1.0));
    }

    #[test]
    fn test_half_unit_triangle_dropped() {
        let geom: TileGeometry = polygon![(x: 0, y: 0), (x: 1, y: 0), (x: 1, y: 1)].into();
        assert!(is_empty_geometry(&geom, 1.0, 1.0));

        let geom: TileGeometry = polygon![(x: 0, y: 0), (x: 2, y: 0), (x: 2, y: 1)].into();
        assert!(!is_empty_geometry(&geom, 1.0, 1.0));
    }

    #[test]
    fn test_multipolygon_area_is_summed() {
        // Two half-unit triangles together reach the threshold
        let geom = TileGeometry::MultiPolygon(MultiPolygon::new(vec![
            polygon![(x: 0, y: 0), (x: 1, y: 0), (x: 1, y: 1)],
            polygon![(x: 10, y: 0), (x: 11, y: 0), (x: 11, y: 1)],
        ]));
        assert!(!is_empty_geometry(&geom, 1.0, 1.0));
    }

    #[test]
    fn test_points_never_dropped() {
        let geom: TileGeometry = point!(x: 0, y: 0).into();
        assert!(!is_empty_geometry(&geom, f64::MAX, f64::MAX));

        let geom = TileGeometry::MultiPoint(MultiPoint::new(vec![point!(x: 0, y: 0)]));
        assert!(!is_empty_geometry(&geom, f64::MAX, f64::MAX));
    }

    #[test]
    fn test_remove_empty_preserves_order() {
        let features = vec![
            Feature::new(point!(x: 0, y: 0)).with_id(1),
            Feature::new(line_string![(x: 0, y: 0), (x: 0, y: 0)]).with_id(2),
            Feature::new(polygon![(x: 0, y: 0), (x: 10, y: 0), (x: 10, y: 10)]).with_id(3),
            Feature::new(polygon![(x: 0, y: 0), (x: 1, y: 1), (x: 2, y: 2)]).with_id(4),
            Feature::new(line_string![(x: 0, y: 0), (x: 9, y: 0)]).with_id(5),
        ];
        let kept = remove_empty(&features, DEFAULT_MIN_LINE_LENGTH, DEFAULT_MIN_POLYGON_AREA);
        let ids: Vec<Option<u64>> = kept.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![Some(1), Some(3), Some(5)]);
    }
}
