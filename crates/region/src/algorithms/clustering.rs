use std::collections::HashMap;

use tracing::debug;

use crate::{
    error::{RegionError, Result},
    traits::PointFilter,
    types::{CoordinateSpace, ModelSpace, Point},
};

pub const DEFAULT_EPS: f64 = 5.0;
pub const DEFAULT_MIN_POINTS: usize = 10;

/// DBSCAN-based noise filter that keeps only the largest cluster
#[derive(Debug, Clone)]
pub struct DensityNoiseFilter {
    /// Neighbourhood radius (exclusive) in model-space pixels
    pub eps: f64,
    /// Neighbourhood size, the point itself included, that makes a core point
    pub min_points: usize,
}

impl Default for DensityNoiseFilter {
    fn default() -> Self {
        Self {
            eps: DEFAULT_EPS,
            min_points: DEFAULT_MIN_POINTS,
        }
    }
}

impl DensityNoiseFilter {
    pub fn new(eps: f64, min_points: usize) -> Result<Self> {
        validate(eps, min_points)?;
        Ok(Self { eps, min_points })
    }
}

impl PointFilter for DensityNoiseFilter {
    fn filter(&self, points: Vec<Point<ModelSpace>>) -> Result<Vec<Point<ModelSpace>>> {
        filter_noise(points, true, self.eps, self.min_points)
    }
}

/// Pass-through filter
#[derive(Debug, Clone, Default)]
pub struct NoFilter;

impl PointFilter for NoFilter {
    fn filter(&self, points: Vec<Point<ModelSpace>>) -> Result<Vec<Point<ModelSpace>>> {
        Ok(points)
    }
}

fn validate(eps: f64, min_points: usize) -> Result<()> {
    if !eps.is_finite() || eps <= 0.0 {
        return Err(RegionError::InvalidParameter(format!("eps must be finite and > 0, got {eps}")));
    }
    if min_points == 0 {
        return Err(RegionError::InvalidParameter("min_points must be at least 1".to_string()));
    }
    Ok(())
}

/// Drop points outside the largest density cluster.
///
/// With `enabled == false` the input is returned untouched. Otherwise the
/// result may be empty when every point is noise.
pub fn filter_noise<S: CoordinateSpace>(
    points: Vec<Point<S>>,
    enabled: bool,
    eps: f64,
    min_points: usize,
) -> Result<Vec<Point<S>>> {
    if !enabled {
        return Ok(points);
    }
    validate(eps, min_points)?;

    let clusters = dbscan(&points, eps, min_points);
    let mut largest: Option<&Vec<usize>> = None;
    for cluster in &clusters {
        if largest.is_none_or(|l| cluster.len() > l.len()) {
            largest = Some(cluster);
        }
    }

    let Some(largest) = largest else {
        debug!(input = points.len(), "noise filter found no cluster");
        return Ok(Vec::new());
    };

    let mut keep = largest.clone();
    keep.sort_unstable();
    debug!(
        input = points.len(),
        clusters = clusters.len(),
        kept = keep.len(),
        "noise filter kept largest cluster"
    );
    Ok(keep.into_iter().map(|i| points[i]).collect())
}

/// Density-based clustering; returns clusters as lists of point indices in
/// discovery order. Points that belong to no cluster are noise.
pub fn dbscan<S: CoordinateSpace>(points: &[Point<S>], eps: f64, min_points: usize) -> Vec<Vec<usize>> {
    let index = GridIndex::build(points, eps);
    let n = points.len();
    let mut visited = vec![false; n];
    let mut assigned = vec![false; n];
    let mut queued = vec![false; n];
    let mut clusters = Vec::new();
    let mut neighbours = Vec::new();

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        index.neighbours(points, i, &mut neighbours);
        if neighbours.len() < min_points {
            continue;
        }

        let mut cluster = vec![i];
        assigned[i] = true;

        let mut queue: Vec<usize> = Vec::with_capacity(neighbours.len());
        for &j in &neighbours {
            if !queued[j] {
                queued[j] = true;
                queue.push(j);
            }
        }

        let mut k = 0;
        while k < queue.len() {
            let j = queue[k];
            k += 1;

            if !visited[j] {
                visited[j] = true;
                index.neighbours(points, j, &mut neighbours);
                if neighbours.len() >= min_points {
                    for &m in &neighbours {
                        if !queued[m] {
                            queued[m] = true;
                            queue.push(m);
                        }
                    }
                }
            }
            if !assigned[j] {
                assigned[j] = true;
                cluster.push(j);
            }
        }

        clusters.push(cluster);
    }

    clusters
}

/// Uniform grid over the point set with cells of size `eps`, so that every
/// neighbour of a point lies in the 3x3 block of cells around it.
struct GridIndex {
    cell_size: f64,
    eps_sq: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl GridIndex {
    fn build<S: CoordinateSpace>(points: &[Point<S>], eps: f64) -> Self {
        let mut index = Self {
            cell_size: eps,
            eps_sq: eps * eps,
            cells: HashMap::new(),
        };
        for (i, p) in points.iter().enumerate() {
            let key = index.key(p);
            index.cells.entry(key).or_default().push(i);
        }
        index
    }

    fn key<S: CoordinateSpace>(&self, p: &Point<S>) -> (i64, i64) {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
        )
    }

    /// Indices (ascending) of points strictly closer than eps, including `i`.
    fn neighbours<S: CoordinateSpace>(&self, points: &[Point<S>], i: usize, out: &mut Vec<usize>) {
        out.clear();
        let p = &points[i];
        let (cx, cy) = self.key(p);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) {
                    out.extend(
                        bucket
                            .iter()
                            .copied()
                            .filter(|&j| p.squared_distance_to(&points[j]) < self.eps_sq),
                    );
                }
            }
        }
        out.sort_unstable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(x0: f64, y0: f64, size: usize) -> Vec<Point<ModelSpace>> {
        let mut points = Vec::new();
        for y in 0..size {
            for x in 0..size {
                points.push(Point::new(x0 + x as f64, y0 + y as f64));
            }
        }
        points
    }

    #[test]
    fn test_disabled_filter_is_identity() {
        let mut points = blob(0.0, 0.0, 3);
        points.push(Point::new(500.0, 500.0));
        let filtered = filter_noise(points.clone(), false, 5.0, 10).unwrap();
        assert_eq!(filtered, points);

        let filtered = NoFilter.filter(points.clone()).unwrap();
        assert_eq!(filtered, points);
    }

    #[test]
    fn test_keeps_largest_cluster_and_drops_noise() {
        let mut points = blob(100.0, 100.0, 4);
        points.push(Point::new(50.0, 50.0));
        points.extend(blob(0.0, 0.0, 5));
        points.push(Point::new(60.0, 10.0));

        let filtered = DensityNoiseFilter::default().filter(points).unwrap();
        assert_eq!(filtered, blob(0.0, 0.0, 5));
    }

    #[test]
    fn test_equal_clusters_resolve_to_first_discovered() {
        let mut points = blob(200.0, 0.0, 4);
        points.extend(blob(0.0, 0.0, 4));

        let filtered = filter_noise(points, true, 5.0, 10).unwrap();
        assert_eq!(filtered, blob(200.0, 0.0, 4));
    }

    #[test]
    fn test_all_noise_yields_empty_set() {
        let points: Vec<Point<ModelSpace>> = (0..20).map(|i| Point::new(i as f64 * 50.0, 0.0)).collect();
        assert!(filter_noise(points, true, 5.0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_neighbourhood_radius_is_exclusive() {
        // Two points exactly eps apart are not neighbours.
        let points = vec![Point::<ModelSpace>::new(0.0, 0.0), Point::new(3.0, 4.0)];
        assert!(dbscan(&points, 5.0, 2).is_empty());
        assert_eq!(dbscan(&points, 5.01, 2), vec![vec![0, 1]]);
    }

    #[test]
    fn test_border_points_join_cluster() {
        // A dense core plus one point reachable only from the core.
        let mut points = blob(0.0, 0.0, 4);
        points.push(Point::new(7.0, 3.0));
        let clusters = dbscan(&points, 5.0, 10);
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].contains(&16));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(DensityNoiseFilter::new(0.0, 10).is_err());
        assert!(DensityNoiseFilter::new(f64::NAN, 10).is_err());
        assert!(DensityNoiseFilter::new(5.0, 0).is_err());
        assert!(filter_noise(blob(0.0, 0.0, 2), true, -1.0, 3).is_err());
    }
}
