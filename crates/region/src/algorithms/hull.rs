use std::collections::{HashMap, HashSet};

use geo::kernels::{Kernel, Orientation, RobustKernel};
use geo::{ConvexHull, Intersects};
use geo_types::{Coord, Line, MultiPoint};
use tracing::debug;

use crate::{
    error::{RegionError, Result},
    traits::PolygonExtractor,
    types::{CoordinateSpace, ModelSpace, Point, Polygon},
};

pub const DEFAULT_CONCAVITY: f64 = 10.0;

/// cos(90°): a carved vertex must see the edge under two acute angles.
const MAX_CONCAVE_ANGLE_COS: f64 = 0.0;

/// Search boxes stop growing at this fraction of the occupied area.
const MAX_SEARCH_BBOX_SIZE_PERCENT: f64 = 0.6;

/// Concave hull extractor
#[derive(Debug, Clone)]
pub struct ConcaveHullExtractor {
    /// Edges shorter than this are never carved; `f64::INFINITY` gives the convex hull
    pub concavity: f64,
}

impl Default for ConcaveHullExtractor {
    fn default() -> Self {
        Self {
            concavity: DEFAULT_CONCAVITY,
        }
    }
}

impl PolygonExtractor for ConcaveHullExtractor {
    fn extract(&self, points: &[Point<ModelSpace>]) -> Result<Polygon<ModelSpace>> {
        hull(points, self.concavity)
    }
}

/// Convex hull extractor using geo crate's implementation
#[derive(Debug, Clone, Default)]
pub struct ConvexHullExtractor;

impl PolygonExtractor for ConvexHullExtractor {
    fn extract(&self, points: &[Point<ModelSpace>]) -> Result<Polygon<ModelSpace>> {
        convex_hull(points)
    }
}

/// Convex hull of a point set, independent of input order.
pub fn convex_hull<S: CoordinateSpace>(points: &[Point<S>]) -> Result<Polygon<S>> {
    let prepared = PreparedPoints::new(points)?;
    Ok(to_polygon(prepared.convex))
}

/// Concave hull of a point set.
///
/// Starts from the convex hull and repeatedly splits every edge longer than
/// `concavity` with the inner point that sees it under the smallest angles,
/// as long as the new edges stay clear of the boundary. The result encloses
/// every input point and only depends on the set of points, not their order.
pub fn hull<S: CoordinateSpace>(points: &[Point<S>], concavity: f64) -> Result<Polygon<S>> {
    if concavity.is_nan() || concavity <= 0.0 {
        return Err(RegionError::InvalidParameter(format!(
            "concavity must be > 0, got {concavity}"
        )));
    }

    let prepared = PreparedPoints::new(points)?;
    if concavity.is_infinite() {
        return Ok(to_polygon(prepared.convex));
    }

    let hull_vertices: HashSet<(u64, u64)> = prepared.convex.iter().map(|&c| coord_key(c)).collect();
    let inner: Vec<Coord<f64>> = prepared
        .unique
        .iter()
        .copied()
        .filter(|&c| !hull_vertices.contains(&coord_key(c)))
        .collect();

    let convex_len = prepared.convex.len();
    let ring = carve(&prepared, inner, concavity);
    debug!(
        unique = prepared.unique.len(),
        convex = convex_len,
        concave = ring.len(),
        concavity,
        "computed hull"
    );

    Ok(to_polygon(ring))
}

struct PreparedPoints {
    /// Sorted by (x, y), duplicates removed
    unique: Vec<Coord<f64>>,
    /// Convex hull vertices as an open ring
    convex: Vec<Coord<f64>>,
    /// Extent of the point set
    occupied: (f64, f64),
}

impl PreparedPoints {
    fn new<S: CoordinateSpace>(points: &[Point<S>]) -> Result<Self> {
        if points.len() < 3 {
            return Err(RegionError::InsufficientPoints { found: points.len() });
        }
        if let Some(p) = points.iter().find(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(RegionError::InvalidParameter(format!(
                "non-finite point ({}, {})",
                p.x, p.y
            )));
        }

        // `+ 0.0` folds -0.0 into 0.0 so equal points dedup.
        let mut unique: Vec<Coord<f64>> = points
            .iter()
            .map(|p| Coord { x: p.x + 0.0, y: p.y + 0.0 })
            .collect();
        unique.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        unique.dedup();

        if is_collinear(&unique) {
            return Err(RegionError::DegeneratePointSet { count: unique.len() });
        }

        let multi_point: MultiPoint<f64> = unique.iter().copied().collect();
        let mut convex = multi_point.convex_hull().exterior().0.clone();
        // Drop the closing coordinate
        convex.pop();
        if convex.len() < 3 {
            return Err(RegionError::DegeneratePointSet { count: unique.len() });
        }

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for c in &unique {
            min_x = min_x.min(c.x);
            min_y = min_y.min(c.y);
            max_x = max_x.max(c.x);
            max_y = max_y.max(c.y);
        }

        Ok(Self {
            unique,
            convex,
            occupied: (max_x - min_x, max_y - min_y),
        })
    }
}

fn is_collinear(sorted_unique: &[Coord<f64>]) -> bool {
    if sorted_unique.len() < 3 {
        return true;
    }
    let first = sorted_unique[0];
    let last = sorted_unique[sorted_unique.len() - 1];
    sorted_unique
        .iter()
        .all(|&c| RobustKernel::orient2d(first, last, c) == Orientation::Collinear)
}

fn to_polygon<S: CoordinateSpace>(ring: Vec<Coord<f64>>) -> Polygon<S> {
    Polygon::from_ring(ring.into_iter().map(Point::from_coord).collect())
}

fn coord_key(c: Coord<f64>) -> (u64, u64) {
    (c.x.to_bits(), c.y.to_bits())
}

fn edge_key(a: Coord<f64>, b: Coord<f64>) -> [u64; 4] {
    [a.x.to_bits(), a.y.to_bits(), b.x.to_bits(), b.y.to_bits()]
}

fn squared_length(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let d = b - a;
    d.x * d.x + d.y * d.y
}

/// Cosine of the angle at `o` between `a` and `b`.
fn cos_angle(o: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let oa = a - o;
    let ob = b - o;
    let dot = oa.x * ob.x + oa.y * ob.y;
    dot / (squared_length(o, a) * squared_length(o, b)).sqrt()
}

/// Edge-carving pass over the convex ring until no edge changes.
fn carve(prepared: &PreparedPoints, inner: Vec<Coord<f64>>, concavity: f64) -> Vec<Coord<f64>> {
    let (occupied_w, occupied_h) = prepared.occupied;
    let max_search = (
        occupied_w * MAX_SEARCH_BBOX_SIZE_PERCENT,
        occupied_h * MAX_SEARCH_BBOX_SIZE_PERCENT,
    );
    let max_sq_edge_len = concavity * concavity;

    let cell_size = (occupied_w * occupied_h / prepared.unique.len() as f64).ceil();
    let cell_size = if cell_size.is_finite() && cell_size > 0.0 { cell_size } else { 1.0 };
    let mut grid = PointGrid::new(&inner, cell_size);

    // Closed ring while carving: the last vertex repeats the first
    let mut ring = prepared.convex.clone();
    ring.push(ring[0]);

    let mut skip_list: HashSet<[u64; 4]> = HashSet::new();

    loop {
        let mut inserted = false;
        let mut i = 0;

        while i + 1 < ring.len() {
            let (a, b) = (ring[i], ring[i + 1]);
            let key = edge_key(a, b);

            if squared_length(a, b) < max_sq_edge_len || skip_list.contains(&key) {
                i += 1;
                continue;
            }

            let mut bbox = [a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y)];
            let mut scale = 0.0;
            let (mut width, mut height);
            let mut mid;
            loop {
                bbox = grid.extend_bbox(bbox, scale);
                width = bbox[2] - bbox[0];
                height = bbox[3] - bbox[1];
                mid = mid_point(a, b, &grid.range_points(bbox), &ring);
                scale += 1.0;

                if mid.is_some() || (max_search.0 <= width && max_search.1 <= height) {
                    break;
                }
            }

            if width >= max_search.0 && height >= max_search.1 {
                skip_list.insert(key);
            }

            if let Some(m) = mid {
                ring.insert(i + 1, m);
                grid.remove(m);
                inserted = true;
            }
            i += 1;
        }

        if !inserted {
            break;
        }
    }

    ring.pop();
    ring
}

/// The candidate that improves both base angles of edge `a`-`b` while keeping
/// the new edges off the boundary.
fn mid_point(a: Coord<f64>, b: Coord<f64>, candidates: &[Coord<f64>], ring: &[Coord<f64>]) -> Option<Coord<f64>> {
    let mut best = None;
    let mut best_cos = (MAX_CONCAVE_ANGLE_COS, MAX_CONCAVE_ANGLE_COS);

    for &p in candidates {
        let cos_a = cos_angle(a, b, p);
        let cos_b = cos_angle(b, a, p);

        if cos_a > best_cos.0
            && cos_b > best_cos.1
            && !crosses_ring(a, p, ring)
            && !crosses_ring(b, p, ring)
        {
            best_cos = (cos_a, cos_b);
            best = Some(p);
        }
    }

    best
}

/// Whether segment `from`-`to` touches any ring edge not incident to `from`.
fn crosses_ring(from: Coord<f64>, to: Coord<f64>, ring: &[Coord<f64>]) -> bool {
    let segment = Line::new(from, to);
    ring.windows(2)
        .filter(|edge| edge[0] != from && edge[1] != from)
        .any(|edge| segment.intersects(&Line::new(edge[0], edge[1])))
}

/// Bucketed inner points for bounding-box range queries.
struct PointGrid {
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<Coord<f64>>>,
    min_cell: (i64, i64),
    max_cell: (i64, i64),
}

impl PointGrid {
    fn new(points: &[Coord<f64>], cell_size: f64) -> Self {
        let mut grid = Self {
            cell_size,
            cells: HashMap::new(),
            min_cell: (i64::MAX, i64::MAX),
            max_cell: (i64::MIN, i64::MIN),
        };
        for &p in points {
            let key = (grid.cell(p.x), grid.cell(p.y));
            grid.min_cell = (grid.min_cell.0.min(key.0), grid.min_cell.1.min(key.1));
            grid.max_cell = (grid.max_cell.0.max(key.0), grid.max_cell.1.max(key.1));
            grid.cells.entry(key).or_default().push(p);
        }
        grid
    }

    fn cell(&self, v: f64) -> i64 {
        (v / self.cell_size).floor() as i64
    }

    fn extend_bbox(&self, bbox: [f64; 4], scale: f64) -> [f64; 4] {
        let pad = scale * self.cell_size;
        [bbox[0] - pad, bbox[1] - pad, bbox[2] + pad, bbox[3] + pad]
    }

    /// Points of every cell overlapping `bbox`, column by column.
    fn range_points(&self, bbox: [f64; 4]) -> Vec<Coord<f64>> {
        let x0 = self.cell(bbox[0]).max(self.min_cell.0);
        let y0 = self.cell(bbox[1]).max(self.min_cell.1);
        let x1 = self.cell(bbox[2]).min(self.max_cell.0);
        let y1 = self.cell(bbox[3]).min(self.max_cell.1);

        let mut points = Vec::new();
        if x0 > x1 || y0 > y1 {
            return points;
        }
        for x in x0..=x1 {
            for y in y0..=y1 {
                if let Some(cell) = self.cells.get(&(x, y)) {
                    points.extend_from_slice(cell);
                }
            }
        }
        points
    }

    fn remove(&mut self, p: Coord<f64>) {
        let key = (self.cell(p.x), self.cell(p.y));
        if let Some(cell) = self.cells.get_mut(&key) {
            if let Some(pos) = cell.iter().position(|&c| c == p) {
                cell.remove(pos);
            }
        }
    }
}
