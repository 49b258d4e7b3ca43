use geo_types::{Coord, LineString};
use tracing::debug;

use crate::{
    error::{RegionError, Result},
    traits::PolygonPostProcessor,
    types::{ModelSpace, Point, Polygon},
};

/// Douglas-Peucker simplifier using geo crate's implementation
#[derive(Debug, Clone)]
pub struct DouglasPeuckerSimplifier {
    pub tolerance: f64,
}

impl DouglasPeuckerSimplifier {
    pub fn new(tolerance: f64) -> Result<Self> {
        validate_tolerance(tolerance)?;
        Ok(Self { tolerance })
    }
}

impl PolygonPostProcessor for DouglasPeuckerSimplifier {
    fn process(&self, polygon: Polygon<ModelSpace>) -> Result<Polygon<ModelSpace>> {
        use geo::Simplify;
        simplify_ring(polygon, |ring| ring.simplify(&self.tolerance))
    }
}

/// Visvalingam-Whyatt simplifier using geo crate's implementation
#[derive(Debug, Clone)]
pub struct VisvalingamWhyattSimplifier {
    /// Minimum triangle area a vertex must span to survive
    pub tolerance: f64,
}

impl VisvalingamWhyattSimplifier {
    pub fn new(tolerance: f64) -> Result<Self> {
        validate_tolerance(tolerance)?;
        Ok(Self { tolerance })
    }
}

impl PolygonPostProcessor for VisvalingamWhyattSimplifier {
    fn process(&self, polygon: Polygon<ModelSpace>) -> Result<Polygon<ModelSpace>> {
        use geo::SimplifyVw;
        simplify_ring(polygon, |ring| ring.simplify_vw(&self.tolerance))
    }
}

fn validate_tolerance(tolerance: f64) -> Result<()> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(RegionError::InvalidParameter(format!(
            "simplification tolerance must be finite and >= 0, got {tolerance}"
        )));
    }
    Ok(())
}

/// Run a line simplification over the closed ring. A result that collapses
/// below a triangle leaves the polygon untouched.
fn simplify_ring<F>(polygon: Polygon<ModelSpace>, simplify: F) -> Result<Polygon<ModelSpace>>
where
    F: Fn(&LineString<f64>) -> LineString<f64>,
{
    let mut coords: Vec<Coord<f64>> = polygon.vertices().iter().map(|p| p.to_coord()).collect();
    if let Some(&first) = coords.first() {
        coords.push(first);
    }
    let simplified = simplify(&LineString::new(coords));

    let vertices: Vec<Point<ModelSpace>> = simplified.coords().map(|&c| Point::from_coord(c)).collect();
    match Polygon::new(vertices) {
        Ok(result) => {
            debug!(before = polygon.len(), after = result.len(), "simplified polygon");
            Ok(result)
        }
        Err(_) => {
            debug!(vertices = polygon.len(), "simplification collapsed the ring, keeping original");
            Ok(polygon)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(coords: &[(f64, f64)]) -> Polygon<ModelSpace> {
        Polygon::new(coords.iter().map(|&(x, y)| Point::new(x, y)).collect()).unwrap()
    }

    #[test]
    fn test_douglas_peucker_drops_near_collinear_vertices() {
        let polygon = ring(&[
            (0.0, 0.0),
            (5.0, 0.1),
            (10.0, 0.0),
            (10.0, 10.0),
            (5.0, 9.9),
            (0.0, 10.0),
        ]);
        let simplified = DouglasPeuckerSimplifier::new(0.5).unwrap().process(polygon).unwrap();
        assert_eq!(simplified.len(), 4);
        assert!((simplified.area() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_tolerance_keeps_shape() {
        let polygon = ring(&[(0.0, 0.0), (4.0, 0.0), (4.0, 3.0)]);
        let simplified = DouglasPeuckerSimplifier::new(0.0).unwrap().process(polygon.clone()).unwrap();
        assert_eq!(simplified, polygon);
    }

    #[test]
    fn test_collapse_keeps_original() {
        let polygon = ring(&[(0.0, 0.0), (4.0, 0.0), (4.0, 3.0)]);
        let simplified = VisvalingamWhyattSimplifier::new(1000.0)
            .unwrap()
            .process(polygon.clone())
            .unwrap();
        assert_eq!(simplified, polygon);
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        assert!(DouglasPeuckerSimplifier::new(-1.0).is_err());
        assert!(VisvalingamWhyattSimplifier::new(f64::NAN).is_err());
    }
}
