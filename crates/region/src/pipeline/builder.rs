use tracing::warn;

use crate::{
    algorithms::{
        ConcaveHullExtractor, ConvexHullExtractor, DensityNoiseFilter, DouglasPeuckerSimplifier, NoFilter,
        VisvalingamWhyattSimplifier,
    },
    config::RegionConfig,
    error::Result,
    pipeline::RegionPipeline,
    traits::{PointFilter, PolygonExtractor, PolygonPostProcessor},
};

/// Builder for creating region pipelines with a fluent API
pub struct RegionPipelineBuilder {
    point_filter: Option<Box<dyn PointFilter>>,
    extractor: Option<Box<dyn PolygonExtractor>>,
    postprocessors: Vec<Box<dyn PolygonPostProcessor>>,
}

impl RegionPipelineBuilder {
    pub fn new() -> Self {
        Self {
            point_filter: None,
            extractor: None,
            postprocessors: Vec::new(),
        }
    }

    /// Build from a validated configuration
    pub fn from_config(config: &RegionConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = Self::new().with_concavity(config.concavity);
        if config.noise_filter.enabled {
            builder = builder.set_point_filter(DensityNoiseFilter::new(
                config.noise_filter.eps,
                config.noise_filter.min_points,
            )?);
        }
        if let Some(tolerance) = config.simplification {
            builder = builder.add_postprocessor(DouglasPeuckerSimplifier::new(tolerance)?);
        }
        Ok(builder)
    }

    /// Set the point filter (replaces any existing one)
    pub fn set_point_filter<F>(mut self, filter: F) -> Self
    where
        F: PointFilter + 'static,
    {
        self.point_filter = Some(Box::new(filter));
        self
    }

    /// Set the polygon extractor (replaces any existing one)
    pub fn set_polygon_extractor<E>(mut self, extractor: E) -> Self
    where
        E: PolygonExtractor + 'static,
    {
        self.extractor = Some(Box::new(extractor));
        self
    }

    /// Add a post-processor to the pipeline
    pub fn add_postprocessor<P>(mut self, postprocessor: P) -> Self
    where
        P: PolygonPostProcessor + 'static,
    {
        self.postprocessors.push(Box::new(postprocessor));
        self
    }

    /// Keep only the largest density cluster before extraction.
    ///
    /// Invalid parameters leave the filter disabled.
    pub fn with_noise_filter(self, eps: f64, min_points: usize) -> Self {
        match DensityNoiseFilter::new(eps, min_points) {
            Ok(filter) => self.set_point_filter(filter),
            Err(e) => {
                warn!("noise filter not enabled: {e}");
                self
            }
        }
    }

    /// Use a concave hull with the given concavity
    pub fn with_concavity(self, concavity: f64) -> Self {
        self.set_polygon_extractor(ConcaveHullExtractor { concavity })
    }

    /// Use the convex hull
    pub fn with_convex_hull(self) -> Self {
        self.set_polygon_extractor(ConvexHullExtractor)
    }

    /// Add Douglas-Peucker simplification as a post-processing step
    pub fn with_simplification(self, tolerance: f64) -> Self {
        match DouglasPeuckerSimplifier::new(tolerance) {
            Ok(simplifier) => self.add_postprocessor(simplifier),
            Err(e) => {
                warn!("simplification not enabled: {e}");
                self
            }
        }
    }

    /// Add Visvalingam-Whyatt simplification as a post-processing step
    pub fn with_vw_simplification(self, tolerance: f64) -> Self {
        match VisvalingamWhyattSimplifier::new(tolerance) {
            Ok(simplifier) => self.add_postprocessor(simplifier),
            Err(e) => {
                warn!("simplification not enabled: {e}");
                self
            }
        }
    }

    /// Build the pipeline with default components if not specified
    pub fn build(self) -> RegionPipeline {
        let point_filter = self.point_filter.unwrap_or_else(|| Box::new(NoFilter));
        let extractor = self
            .extractor
            .unwrap_or_else(|| Box::new(ConcaveHullExtractor::default()));

        RegionPipeline::new(point_filter, extractor, self.postprocessors)
    }
}

impl Default for RegionPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
