//! The boundary to whatever produces masks, tokens or segments for a region.
//!
//! Inference itself lives outside this crate; a provider only has to hand back
//! one of the output shapes below, already in model space.

use std::future::Future;

use crate::{
    error::Result,
    spaces::GridBox,
    types::{BoundingBox, Mask, ModelSpace, Point},
};

/// A box prompt for one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionRequest {
    /// The prompt box in model space
    pub bbox: BoundingBox<ModelSpace>,
    /// The same box on the normalized location grid
    pub grid: GridBox,
    /// The same box as location tokens, for text-prompted models
    pub location_tokens: String,
}

/// What a model returned for a region.
#[derive(Debug, Clone, PartialEq)]
pub enum Segmentation {
    /// Candidate masks with one confidence score per channel
    Mask { mask: Mask, scores: Vec<f32> },
    /// A `<loc_N>` token stream
    LocationTokens(String),
    /// A ready-made outline
    Segment(Vec<Point<ModelSpace>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutput {
    pub segmentation: Segmentation,
    /// Generated text for the region, possibly containing tags
    pub description: Option<String>,
}

impl InferenceOutput {
    pub fn new(segmentation: Segmentation) -> Self {
        Self {
            segmentation,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A region suggested by a "segment everything" pass.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionProposal {
    /// Needs a follow-up `segment` call
    Box {
        bbox: BoundingBox<ModelSpace>,
        label: Option<String>,
    },
    /// Already segmented
    Segmented(InferenceOutput),
}

/// Async source of segmentation results.
pub trait InferenceProvider: Send + Sync {
    fn segment(&self, request: &RegionRequest) -> impl Future<Output = Result<InferenceOutput>> + Send;

    fn propose_regions(&self) -> impl Future<Output = Result<Vec<RegionProposal>>> + Send;
}
