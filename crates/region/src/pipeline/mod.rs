pub mod builder;

use tracing::debug;

use crate::{
    algorithms::MaskSelector,
    codec::LocationTokenCodec,
    error::Result,
    traits::{PointFilter, PolygonExtractor, PolygonPostProcessor},
    types::{Dimensions, Mask, ModelSpace, Point, Polygon},
};

/// Mask-to-polygon pipeline: channel selection, noise filtering, boundary
/// extraction, then any post-processors in order.
pub struct RegionPipeline {
    selector: MaskSelector,
    point_filter: Box<dyn PointFilter>,
    extractor: Box<dyn PolygonExtractor>,
    postprocessors: Vec<Box<dyn PolygonPostProcessor>>,
    codec: LocationTokenCodec,
}

impl RegionPipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::RegionPipelineBuilder {
        builder::RegionPipelineBuilder::new()
    }

    pub fn new(
        point_filter: Box<dyn PointFilter>,
        extractor: Box<dyn PolygonExtractor>,
        postprocessors: Vec<Box<dyn PolygonPostProcessor>>,
    ) -> Self {
        Self {
            selector: MaskSelector,
            point_filter,
            extractor,
            postprocessors,
            codec: LocationTokenCodec,
        }
    }

    /// Outline the best-scoring channel of a mask.
    pub fn process_mask(&self, mask: &Mask, scores: &[f32]) -> Result<Polygon<ModelSpace>> {
        let (_, points) = self.selector.select(mask, scores)?;
        self.process_points(points)
    }

    /// Outline a foreground point set.
    pub fn process_points(&self, points: Vec<Point<ModelSpace>>) -> Result<Polygon<ModelSpace>> {
        let found = points.len();
        let points = self.point_filter.filter(points)?;
        debug!(found, kept = points.len(), "filtered points");

        let polygon = self.extractor.extract(&points)?;
        self.postprocess(polygon)
    }

    /// Turn a location-token stream into a polygon of `model_size`.
    pub fn process_tokens(&self, tokens: &str, model_size: Dimensions) -> Result<Polygon<ModelSpace>> {
        let polygon = self.codec.decode(tokens, model_size)?;
        self.postprocess(polygon)
    }

    fn postprocess(&self, mut polygon: Polygon<ModelSpace>) -> Result<Polygon<ModelSpace>> {
        for postprocessor in &self.postprocessors {
            polygon = postprocessor.process(polygon)?;
        }
        debug!(vertices = polygon.len(), "pipeline produced polygon");
        Ok(polygon)
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!(
            "RegionPipeline: 1 point filter, 1 polygon extractor, {} postprocessors",
            self.postprocessors.len()
        )
    }
}

impl Default for RegionPipeline {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegionError;

    fn square_mask() -> Mask {
        let mut data = vec![0u8; 16];
        for (x, y) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
            data[y * 4 + x] = 1;
        }
        Mask::new(4, 4, 1, data).unwrap()
    }

    #[test]
    fn test_square_mask_outlines_to_square() {
        let pipeline = RegionPipeline::default();
        let polygon = pipeline.process_mask(&square_mask(), &[0.9]).unwrap();
        let mut coords: Vec<(f64, f64)> = polygon.vertices().iter().map(|p| (p.x, p.y)).collect();
        coords.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        assert_eq!(coords, vec![(1.0, 1.0), (1.0, 2.0), (2.0, 1.0), (2.0, 2.0)]);
    }

    #[test]
    fn test_empty_mask_is_insufficient() {
        let pipeline = RegionPipeline::default();
        let mask = Mask::new(4, 4, 1, vec![0; 16]).unwrap();
        assert!(matches!(
            pipeline.process_mask(&mask, &[0.5]),
            Err(RegionError::InsufficientPoints { found: 0 })
        ));
    }

    #[test]
    fn test_noise_only_mask_is_insufficient() {
        // Scattered cells never reach min_points neighbours.
        let mut data = vec![0u8; 64 * 64];
        for i in (0..64).step_by(16) {
            data[i * 64 + i] = 1;
        }
        let mask = Mask::new(64, 64, 1, data).unwrap();
        let pipeline = RegionPipeline::builder().with_noise_filter(5.0, 10).build();
        assert!(matches!(
            pipeline.process_mask(&mask, &[1.0]),
            Err(RegionError::InsufficientPoints { found: 0 })
        ));
    }

    #[test]
    fn test_tokens_become_polygon() {
        let pipeline = RegionPipeline::default();
        let polygon = pipeline
            .process_tokens("<loc_0><loc_0><loc_500><loc_500>", Dimensions::new(1024.0, 1024.0))
            .unwrap();
        assert_eq!(polygon.len(), 4);
        assert!((polygon.area() - 512.0 * 512.0).abs() < 1e-6);
    }
}
