//! Douglas–Peucker simplification in tile-local coordinates.
//!
//! Simplification runs after projection and clipping, so the tolerance is
//! measured in tile units (1/4096 of a tile at the default extent) and is
//! independent of latitude.
//!
//! # Algorithm
//!
//! For each line and ring:
//! 1. Collapse consecutive duplicate vertices.
//! 2. Keep both endpoints; recursively keep the vertex farthest from the
//!    current chord segment while that distance exceeds the tolerance.
//!
//! A closed ring starts with a degenerate chord (first == last); distance is
//! then measured to that single point.

use geo::{Coord, LineString, MultiLineString, MultiPolygon, Polygon};

use crate::geometry::{Feature, TileGeometry};

/// Default tolerance in tile units
pub const DEFAULT_TOLERANCE: f64 = 1.0;

/// Rings shorter than this (3 unique + closing) are removed
pub const MIN_RING_POINTS: usize = 4;

/// Simplify a sequence of vertices, keeping its endpoints.
pub fn simplify_coords(coords: &[Coord<i64>], tolerance: f64) -> Vec<Coord<i64>> {
    let mut points = coords.to_vec();
    points.dedup();
    if points.len() <= 2 {
        return points;
    }

    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    let mut stack = vec![(0, last)];
    while let Some((first, last)) = stack.pop() {
        if last <= first + 1 {
            continue;
        }

        let (index, distance) = (first + 1..last)
            .map(|i| (i, segment_distance(points[i], points[first], points[last])))
            .fold((first, 0.0), |best, candidate| {
                if candidate.1 > best.1 {
                    candidate
                } else {
                    best
                }
            });

        if distance > tolerance {
            keep[index] = true;
            stack.push((first, index));
            stack.push((index, last));
        }
    }

    points
        .into_iter()
        .zip(keep)
        .filter_map(|(c, kept)| kept.then_some(c))
        .collect()
}

/// Distance from `p` to the segment `a`..`b`, or to `a` if `a == b`.
fn segment_distance(p: Coord<i64>, a: Coord<i64>, b: Coord<i64>) -> f64 {
    let (px, py) = (p.x as f64, p.y as f64);
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (bx, by) = (b.x as f64, b.y as f64);

    let (dx, dy) = (bx - ax, by - ay);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return (px - ax).hypot(py - ay);
    }
    // Points projecting past either end measure to that endpoint
    let t = (((px - ax) * dx + (py - ay) * dy) / length_sq).clamp(0.0, 1.0);
    (px - (ax + t * dx)).hypot(py - (ay + t * dy))
}

fn simplify_linestring(ls: &LineString<i64>, tolerance: f64) -> LineString<i64> {
    LineString::new(simplify_coords(&ls.0, tolerance))
}

/// Simplify the exterior and holes; holes that fall below [`MIN_RING_POINTS`] are removed.
fn simplify_polygon(poly: &Polygon<i64>, tolerance: f64) -> Polygon<i64> {
    let exterior = simplify_linestring(poly.exterior(), tolerance);
    let interiors = poly
        .interiors()
        .iter()
        .map(|ring| simplify_linestring(ring, tolerance))
        .filter(|ring| ring.0.len() >= MIN_RING_POINTS)
        .collect();
    Polygon::new(exterior, interiors)
}

/// Simplify a tile geometry. Points and MultiPoints pass through unchanged.
pub fn simplify_geometry(geom: &TileGeometry, tolerance: f64) -> TileGeometry {
    match geom {
        TileGeometry::Point(_) | TileGeometry::MultiPoint(_) => geom.clone(),
        TileGeometry::LineString(ls) => TileGeometry::LineString(simplify_linestring(ls, tolerance)),
        TileGeometry::MultiLineString(mls) => TileGeometry::MultiLineString(MultiLineString::new(
            mls.0
                .iter()
                .map(|ls| simplify_linestring(ls, tolerance))
                .collect(),
        )),
        TileGeometry::Polygon(poly) => TileGeometry::Polygon(simplify_polygon(poly, tolerance)),
        TileGeometry::MultiPolygon(mp) => TileGeometry::MultiPolygon(MultiPolygon::new(
            mp.0.iter()
                .map(|poly| simplify_polygon(poly, tolerance))
                .filter(|poly| poly.exterior().0.len() >= MIN_RING_POINTS)
                .collect(),
        )),
    }
}

/// Simplify every feature in place order.
pub fn simplify_features(features: &[Feature<i64>], tolerance: f64) -> Vec<Feature<i64>> {
    features
        .iter()
        .map(|feature| feature.with_geometry(simplify_geometry(&feature.geometry, tolerance)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, line_string, point, polygon, MultiPoint};

    fn coords(points: &[(i64, i64)]) -> Vec<Coord<i64>> {
        points.iter().map(|&(x, y)| coord! { x: x, y: y }).collect()
    }

    /// Distance from `p` to the closest segment of `line`
    fn distance_to_polyline(p: Coord<i64>, line: &[Coord<i64>]) -> f64 {
        line.windows(2)
            .map(|w| {
                let (ax, ay, bx, by) = (w[0].x as f64, w[0].y as f64, w[1].x as f64, w[1].y as f64);
                let (px, py) = (p.x as f64, p.y as f64);
                let (dx, dy) = (bx - ax, by - ay);
                let len2 = dx * dx + dy * dy;
                let t = if len2 == 0.0 {
                    0.0
                } else {
                    (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0)
                };
                (px - (ax + t * dx)).hypot(py - (ay + t * dy))
            })
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn test_collinear_points_removed() {
        let line = coords(&[(0, 0), (10, 0), (20, 0), (30, 0)]);
        assert_eq!(simplify_coords(&line, 1.0), coords(&[(0, 0), (30, 0)]));
    }

    #[test]
    fn test_deviation_at_tolerance_is_removed() {
        // Distance exactly 1.0 does not exceed the tolerance
        let line = coords(&[(0, 0), (10, 1), (20, 0)]);
        assert_eq!(simplify_coords(&line, 1.0), coords(&[(0, 0), (20, 0)]));

        let line = coords(&[(0, 0), (10, 2), (20, 0)]);
        assert_eq!(simplify_coords(&line, 1.0), line);
    }

    #[test]
    fn test_backtracking_vertex_is_kept() {
        // (200, 0) lies on the chord's line but 100 units past its end
        let line = coords(&[(0, 0), (200, 0), (100, 0)]);
        assert_eq!(simplify_coords(&line, 1.0), line);

        // A line that doubles back stays within tolerance of every input vertex
        let line = coords(&[(0, 0), (50, 0), (10, 0), (60, 0), (30, 0)]);
        let simplified = simplify_coords(&line, 1.0);
        for p in &line {
            assert!(distance_to_polyline(*p, &simplified) <= 1.0, "{:?} drifted too far", p);
        }
    }

    #[test]
    fn test_duplicates_collapsed_first() {
        let line = coords(&[(0, 0), (0, 0), (5, 5), (5, 5)]);
        assert_eq!(simplify_coords(&line, 1.0), coords(&[(0, 0), (5, 5)]));

        let point_like = coords(&[(3, 3), (3, 3), (3, 3)]);
        assert_eq!(simplify_coords(&point_like, 1.0), coords(&[(3, 3)]));
    }

    #[test]
    fn test_endpoints_kept_and_hausdorff_bounded() {
        let line: Vec<Coord<i64>> = (0..200)
            .map(|i| coord! { x: i * 3, y: ((i as f64 * 0.3).sin() * 4.0).round() as i64 })
            .collect();
        let simplified = simplify_coords(&line, DEFAULT_TOLERANCE);

        assert_eq!(simplified.first(), line.first());
        assert_eq!(simplified.last(), line.last());
        assert!(simplified.len() < line.len());
        for p in &line {
            assert!(
                distance_to_polyline(*p, &simplified) <= DEFAULT_TOLERANCE + 1e-9,
                "{:?} drifted too far",
                p
            );
        }
    }

    #[test]
    fn test_simplification_is_deterministic() {
        let line: Vec<Coord<i64>> = (0..100).map(|i| coord! { x: i, y: (i * 7) % 5 }).collect();
        assert_eq!(simplify_coords(&line, 1.0), simplify_coords(&line, 1.0));
    }

    #[test]
    fn test_closed_ring_uses_point_distance() {
        let ring = coords(&[(0, 0), (100, 0), (100, 100), (0, 100), (0, 0)]);
        assert_eq!(simplify_coords(&ring, 1.0), ring);
    }

    #[test]
    fn test_points_unchanged() {
        let geom: TileGeometry = point!(x: 5, y: 5).into();
        assert_eq!(simplify_geometry(&geom, 1.0), geom);

        let geom = TileGeometry::MultiPoint(MultiPoint::new(vec![point!(x: 1, y: 1), point!(x: 1, y: 1)]));
        assert_eq!(simplify_geometry(&geom, 1.0), geom);
    }

    #[test]
    fn test_tiny_hole_removed() {
        let geom: TileGeometry = polygon!(
            exterior: [(x: 0, y: 0), (x: 100, y: 0), (x: 100, y: 100), (x: 0, y: 100)],
            interiors: [
                [(x: 10, y: 10), (x: 11, y: 10), (x: 11, y: 11)],
                [(x: 50, y: 50), (x: 60, y: 50), (x: 60, y: 60), (x: 50, y: 60)],
            ],
        )
        .into();

        let TileGeometry::Polygon(poly) = simplify_geometry(&geom, 1.0) else {
            panic!("expected Polygon");
        };
        assert_eq!(poly.exterior().0.len(), 5);
        assert_eq!(poly.interiors().len(), 1);
        assert_eq!(poly.interiors()[0].0[0], coord! { x: 50, y: 50 });
    }

    #[test]
    fn test_tiny_multipolygon_member_removed() {
        let geom = TileGeometry::MultiPolygon(MultiPolygon::new(vec![
            polygon![(x: 0, y: 0), (x: 1, y: 0), (x: 1, y: 1)],
            polygon![(x: 10, y: 10), (x: 40, y: 10), (x: 40, y: 40)],
        ]));
        let TileGeometry::MultiPolygon(mp) = simplify_geometry(&geom, 1.0) else {
            panic!("expected MultiPolygon");
        };
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].exterior().0[0], coord! { x: 10, y: 10 });
    }

    #[test]
    fn test_simplify_features_keeps_metadata() {
        let features = vec![Feature::new(line_string![(x: 0, y: 0), (x: 5, y: 0), (x: 10, y: 0)])
            .with_id(9)
            .with_property("kind", "road")];
        let simplified = simplify_features(&features, 1.0);
        assert_eq!(simplified[0].id, Some(9));
        assert_eq!(simplified[0].properties, features[0].properties);
        assert_eq!(
            simplified[0].geometry,
            TileGeometry::LineString(line_string![(x: 0, y: 0), (x: 10, y: 0)])
        );
    }
}
