//! Geometry clipping to tile bounds.
//!
//! Clips projected geometries to the tile extent plus a buffer zone, so that
//! strokes and fills crossing a tile edge render without seams when adjacent
//! tiles are drawn side by side.
//!
//! The clip rectangle is `[-buffer, extent + buffer)` on both axes. Since tile
//! coordinates are integers this is the inclusive range
//! `[-buffer, extent + buffer - 1]`.
//!
//! - **Points** are kept iff inside.
//! - **Lines** are clipped segment by segment (Cohen–Sutherland). A line that
//!   leaves and re-enters the rectangle is split into several lines.
//! - **Polygons** are clipped ring by ring (Sutherland–Hodgman). Rings that
//!   collapse below 3 distinct points are dropped; losing the exterior drops
//!   the polygon.
//!
//! New vertices created on the clip edges are rounded to the integer grid.

use geo::{Coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Rect};

use crate::geometry::{Feature, TileGeometry};
use crate::validate::{has_unique_points, MIN_RING_UNIQUE_POINTS};

/// Default buffer in tile units
pub const DEFAULT_BUFFER: u32 = 8;

/// Inclusive integer clip rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipBounds {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl ClipBounds {
    pub fn new(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Bounds for a tile of `extent` units with `buffer` units on each side.
    pub fn from_extent(extent: u32, buffer: u32) -> Self {
        let min = -(buffer as i64);
        let max = extent as i64 + buffer as i64 - 1;
        Self::new(min, min, max, max)
    }

    pub fn contains(&self, c: Coord<i64>) -> bool {
        c.x >= self.min_x && c.x <= self.max_x && c.y >= self.min_y && c.y <= self.max_y
    }

    fn contains_rect(&self, rect: &Rect<i64>) -> bool {
        self.contains(rect.min()) && self.contains(rect.max())
    }

    fn intersects_rect(&self, rect: &Rect<i64>) -> bool {
        rect.max().x >= self.min_x
            && rect.min().x <= self.max_x
            && rect.max().y >= self.min_y
            && rect.min().y <= self.max_y
    }
}

/// Clip a geometry to bounds.
///
/// # Returns
///
/// The clipped geometry, or `None` if nothing of it lies inside the bounds.
/// A geometry whose bounding box is entirely inside is returned unchanged.
pub fn clip_geometry(geom: &TileGeometry, bounds: &ClipBounds) -> Option<TileGeometry> {
    let rect = geom.bounding_rect()?;
    if !bounds.intersects_rect(&rect) {
        return None;
    }
    // FAST PATH: nothing to cut
    if bounds.contains_rect(&rect) {
        return Some(geom.clone());
    }

    match geom {
        TileGeometry::Point(p) => clip_point(p, bounds).map(TileGeometry::Point),
        TileGeometry::MultiPoint(mp) => clip_multipoint(mp, bounds).map(TileGeometry::MultiPoint),
        TileGeometry::LineString(ls) => clip_linestring(ls, bounds),
        TileGeometry::MultiLineString(mls) => {
            clip_multilinestring(mls, bounds).map(TileGeometry::MultiLineString)
        }
        TileGeometry::Polygon(poly) => clip_polygon(poly, bounds).map(TileGeometry::Polygon),
        TileGeometry::MultiPolygon(mp) => {
            clip_multipolygon(mp, bounds).map(TileGeometry::MultiPolygon)
        }
    }
}

/// Clip every feature, removing those that end up empty. Order is preserved.
pub fn clip_features(features: &[Feature<i64>], bounds: &ClipBounds) -> Vec<Feature<i64>> {
    let clipped: Vec<Feature<i64>> = features
        .iter()
        .filter_map(|feature| {
            clip_geometry(&feature.geometry, bounds).map(|geometry| feature.with_geometry(geometry))
        })
        .collect();

    log::trace!(
        "Clipped {} features to {:?}, {} remain",
        features.len(),
        bounds,
        clipped.len()
    );
    clipped
}

fn clip_point(point: &Point<i64>, bounds: &ClipBounds) -> Option<Point<i64>> {
    bounds.contains(point.0).then_some(*point)
}

fn clip_multipoint(mp: &MultiPoint<i64>, bounds: &ClipBounds) -> Option<MultiPoint<i64>> {
    let points: Vec<Point<i64>> = mp.0.iter().filter(|p| bounds.contains(p.0)).copied().collect();
    (!points.is_empty()).then(|| MultiPoint::new(points))
}

// =============================================================================
// LINES (Cohen–Sutherland)
// =============================================================================

const LEFT: u8 = 1;
const RIGHT: u8 = 2;
const BELOW: u8 = 4;
const ABOVE: u8 = 8;

fn outcode(c: Coord<f64>, bounds: &ClipBounds) -> u8 {
    let mut code = 0;
    if c.x < bounds.min_x as f64 {
        code |= LEFT;
    } else if c.x > bounds.max_x as f64 {
        code |= RIGHT;
    }
    if c.y < bounds.min_y as f64 {
        code |= BELOW;
    } else if c.y > bounds.max_y as f64 {
        code |= ABOVE;
    }
    code
}

fn to_f64(c: Coord<i64>) -> Coord<f64> {
    Coord {
        x: c.x as f64,
        y: c.y as f64,
    }
}

fn round(c: Coord<f64>) -> Coord<i64> {
    Coord {
        x: c.x.round() as i64,
        y: c.y.round() as i64,
    }
}

/// Clip one segment. Endpoints that were inside come back unchanged.
fn clip_segment(
    a: Coord<i64>,
    b: Coord<i64>,
    bounds: &ClipBounds,
) -> Option<(Coord<i64>, Coord<i64>)> {
    let (mut p0, mut p1) = (to_f64(a), to_f64(b));
    let (mut code0, mut code1) = (outcode(p0, bounds), outcode(p1, bounds));

    loop {
        if code0 | code1 == 0 {
            return Some((round(p0), round(p1)));
        }
        if code0 & code1 != 0 {
            return None;
        }

        let out = if code0 != 0 { code0 } else { code1 };
        let p = if out & ABOVE != 0 {
            let y = bounds.max_y as f64;
            Coord { x: p0.x + (p1.x - p0.x) * (y - p0.y) / (p1.y - p0.y), y }
        } else if out & BELOW != 0 {
            let y = bounds.min_y as f64;
            Coord { x: p0.x + (p1.x - p0.x) * (y - p0.y) / (p1.y - p0.y), y }
        } else if out & RIGHT != 0 {
            let x = bounds.max_x as f64;
            Coord { x, y: p0.y + (p1.y - p0.y) * (x - p0.x) / (p1.x - p0.x) }
        } else {
            let x = bounds.min_x as f64;
            Coord { x, y: p0.y + (p1.y - p0.y) * (x - p0.x) / (p1.x - p0.x) }
        };

        if out == code0 {
            p0 = p;
            code0 = outcode(p0, bounds);
        } else {
            p1 = p;
            code1 = outcode(p1, bounds);
        }
    }
}

/// Split a line into the parts that lie inside the bounds, in input order.
fn clip_line_parts(ls: &LineString<i64>, bounds: &ClipBounds) -> Vec<LineString<i64>> {
    let mut parts = Vec::new();
    let mut current: Vec<Coord<i64>> = Vec::new();

    let mut flush = |current: &mut Vec<Coord<i64>>| {
        if current.len() >= 2 {
            parts.push(LineString::new(std::mem::take(current)));
        } else {
            current.clear();
        }
    };

    for segment in ls.0.windows(2) {
        let (a, b) = (segment[0], segment[1]);
        match clip_segment(a, b, bounds) {
            Some((start, end)) => {
                if current.last() != Some(&start) {
                    flush(&mut current);
                    current.push(start);
                }
                if current.last() != Some(&end) {
                    current.push(end);
                }
                // Left the bounds: this part is finished
                if end != b {
                    flush(&mut current);
                }
            }
            None => flush(&mut current),
        }
    }
    flush(&mut current);

    parts
}

fn clip_linestring(ls: &LineString<i64>, bounds: &ClipBounds) -> Option<TileGeometry> {
    let mut parts = clip_line_parts(ls, bounds);
    match parts.len() {
        0 => None,
        1 => parts.pop().map(TileGeometry::LineString),
        _ => Some(TileGeometry::MultiLineString(MultiLineString::new(parts))),
    }
}

fn clip_multilinestring(
    mls: &MultiLineString<i64>,
    bounds: &ClipBounds,
) -> Option<MultiLineString<i64>> {
    let parts: Vec<LineString<i64>> = mls
        .0
        .iter()
        .flat_map(|ls| clip_line_parts(ls, bounds))
        .collect();
    (!parts.is_empty()).then(|| MultiLineString::new(parts))
}

// =============================================================================
// POLYGONS (Sutherland–Hodgman)
// =============================================================================

fn clip_polygon(poly: &Polygon<i64>, bounds: &ClipBounds) -> Option<Polygon<i64>> {
    let exterior = clip_ring(poly.exterior(), bounds)?;
    let interiors: Vec<LineString<i64>> = poly
        .interiors()
        .iter()
        .filter_map(|ring| clip_ring(ring, bounds))
        .collect();

    if interiors.len() < poly.interiors().len() {
        log::trace!(
            "Dropped {} holes while clipping",
            poly.interiors().len() - interiors.len()
        );
    }
    Some(Polygon::new(exterior, interiors))
}

fn clip_multipolygon(mp: &MultiPolygon<i64>, bounds: &ClipBounds) -> Option<MultiPolygon<i64>> {
    let polygons: Vec<Polygon<i64>> = mp
        .0
        .iter()
        .filter_map(|poly| clip_polygon(poly, bounds))
        .collect();
    (!polygons.is_empty()).then(|| MultiPolygon::new(polygons))
}

/// Clip a closed ring. Returns `None` if fewer than 3 distinct points survive.
fn clip_ring(ring: &LineString<i64>, bounds: &ClipBounds) -> Option<LineString<i64>> {
    let mut vertices: Vec<Coord<f64>> = ring.0.iter().copied().map(to_f64).collect();
    // Work on the open ring; clip_against_edge wraps around on its own
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }

    let (min_x, max_x) = (bounds.min_x as f64, bounds.max_x as f64);
    let (min_y, max_y) = (bounds.min_y as f64, bounds.max_y as f64);

    // Left edge
    vertices = clip_against_edge(
        &vertices,
        |c| c.x >= min_x,
        |c1, c2| Coord {
            x: min_x,
            y: c1.y + (min_x - c1.x) / (c2.x - c1.x) * (c2.y - c1.y),
        },
    );

    // Right edge
    vertices = clip_against_edge(
        &vertices,
        |c| c.x <= max_x,
        |c1, c2| Coord {
            x: max_x,
            y: c1.y + (max_x - c1.x) / (c2.x - c1.x) * (c2.y - c1.y),
        },
    );

    // Top edge (smallest y)
    vertices = clip_against_edge(
        &vertices,
        |c| c.y >= min_y,
        |c1, c2| Coord {
            x: c1.x + (min_y - c1.y) / (c2.y - c1.y) * (c2.x - c1.x),
            y: min_y,
        },
    );

    // Bottom edge
    vertices = clip_against_edge(
        &vertices,
        |c| c.y <= max_y,
        |c1, c2| Coord {
            x: c1.x + (max_y - c1.y) / (c2.y - c1.y) * (c2.x - c1.x),
            y: max_y,
        },
    );

    let mut coords: Vec<Coord<i64>> = vertices.into_iter().map(round).collect();
    coords.dedup();
    while coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }

    if !has_unique_points(&coords, MIN_RING_UNIQUE_POINTS) {
        return None;
    }

    coords.push(coords[0]);
    Some(LineString::new(coords))
}

/// Clip polygon vertices against a single edge
fn clip_against_edge<F, I>(vertices: &[Coord<f64>], inside: F, intersect: I) -> Vec<Coord<f64>>
where
    F: Fn(&Coord<f64>) -> bool,
    I: Fn(&Coord<f64>, &Coord<f64>) -> Coord<f64>,
{
    if vertices.is_empty() {
        return Vec::new();
    }

    let mut output = Vec::with_capacity(vertices.len() + 4);

    for i in 0..vertices.len() {
        let current = &vertices[i];
        let next = &vertices[(i + 1) % vertices.len()];

        let current_inside = inside(current);
        let next_inside = inside(next);

        if current_inside {
            output.push(*current);
            if !next_inside {
                // Exiting: add intersection
                output.push(intersect(current, next));
            }
        } else if next_inside {
            // Entering: add intersection
            output.push(intersect(current, next));
        }
    }

    output
}
