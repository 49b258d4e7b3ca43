use crate::{
    error::Result,
    types::{ModelSpace, Point, Polygon},
};

/// Trait for point-set noise filtering algorithms
pub trait PointFilter: Send + Sync {
    /// Keep the points that belong to the region, dropping noise
    fn filter(&self, points: Vec<Point<ModelSpace>>) -> Result<Vec<Point<ModelSpace>>>;
}

/// Trait for boundary extraction algorithms
pub trait PolygonExtractor: Send + Sync {
    /// Compute a simple polygon enclosing every input point
    fn extract(&self, points: &[Point<ModelSpace>]) -> Result<Polygon<ModelSpace>>;
}

/// Trait for polygon post-processing algorithms
pub trait PolygonPostProcessor: Send + Sync {
    /// Post-process an extracted polygon
    fn process(&self, polygon: Polygon<ModelSpace>) -> Result<Polygon<ModelSpace>>;
}
