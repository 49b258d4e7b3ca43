use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::{
    annotation::Annotation,
    codec::{strip_tags, LocationTokenCodec},
    error::Result,
    inference::{InferenceOutput, InferenceProvider, RegionProposal, RegionRequest, Segmentation},
    pipeline::RegionPipeline,
    spaces::{to_display_space, to_model_space, to_normalized_grid},
    types::{BoundingBox, CoordinateSpace, Dimensions, DisplaySpace, ModelSpace, Polygon, SpaceKind},
};

/// Per-image state: the original image size and the size the model works at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSession {
    source_size: Dimensions,
    model_size: Dimensions,
}

impl ImageSession {
    pub fn new(source_size: Dimensions, model_size: Dimensions) -> Result<Self> {
        Ok(Self {
            source_size: source_size.validate(SpaceKind::Source)?,
            model_size: model_size.validate(SpaceKind::Model)?,
        })
    }

    pub fn source_size(&self) -> Dimensions {
        self.source_size
    }

    pub fn model_size(&self) -> Dimensions {
        self.model_size
    }

    /// Prompt for a box drawn in a space of size `space_size`.
    pub fn request_for<S: CoordinateSpace>(&self, bbox: &BoundingBox<S>, space_size: Dimensions) -> Result<RegionRequest> {
        let model_box = to_model_space(bbox, space_size, self.model_size)?;
        Ok(RegionRequest {
            grid: to_normalized_grid(&model_box, self.model_size)?,
            location_tokens: LocationTokenCodec.encode(&model_box, self.model_size)?,
            bbox: model_box,
        })
    }
}

/// Outcome counts of a [`SegmentationDriver::segment_all`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentAllSummary {
    pub produced: usize,
    /// Regions whose own data could not be outlined
    pub failed: usize,
    /// Regions lost to I/O, transport or serialization errors
    pub transport_failed: usize,
    pub cancelled: bool,
}

/// Runs one pipeline per region of an image session and hands out
/// `region-<n>` annotation ids.
pub struct SegmentationDriver {
    pipeline: RegionPipeline,
    session: ImageSession,
    next_id: AtomicU64,
}

impl SegmentationDriver {
    pub fn new(pipeline: RegionPipeline, session: ImageSession) -> Self {
        Self {
            pipeline,
            session,
            next_id: AtomicU64::new(0),
        }
    }

    pub fn session(&self) -> &ImageSession {
        &self.session
    }

    pub fn pipeline(&self) -> &RegionPipeline {
        &self.pipeline
    }

    fn next_id(&self) -> String {
        format!("region-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Turn any model output into a model-space polygon.
    pub fn resolve(&self, output: &InferenceOutput) -> Result<Polygon<ModelSpace>> {
        match &output.segmentation {
            Segmentation::Mask { mask, scores } => self.pipeline.process_mask(mask, scores),
            Segmentation::LocationTokens(tokens) => self.pipeline.process_tokens(tokens, self.session.model_size),
            Segmentation::Segment(points) => Polygon::new(points.clone()),
        }
    }

    fn annotate(
        &self,
        output: &InferenceOutput,
        fallback_label: Option<String>,
        display_size: Dimensions,
    ) -> Result<Annotation<DisplaySpace>> {
        let polygon = self.resolve(output)?;
        let display_polygon = to_display_space(&polygon, self.session.model_size, display_size)?;
        let label = output
            .description
            .as_deref()
            .map(strip_tags)
            .filter(|text| !text.is_empty())
            .or(fallback_label);

        let annotation = Annotation::new(self.next_id(), display_polygon, label);
        info!(
            id = %annotation.id,
            vertices = annotation.bounding_polygon.len(),
            label = annotation.label.as_deref().unwrap_or(""),
            "produced annotation"
        );
        Ok(annotation)
    }

    /// Segment the region inside a box the user drew on the viewer.
    pub async fn segment_box<P: InferenceProvider>(
        &self,
        provider: &P,
        bbox: &BoundingBox<DisplaySpace>,
        display_size: Dimensions,
    ) -> Result<Annotation<DisplaySpace>> {
        let request = self.session.request_for(bbox, display_size)?;
        debug!(tokens = %request.location_tokens, "requesting segmentation");
        let output = provider.segment(&request).await?;
        self.annotate(&output, None, display_size)
    }

    /// Segment every proposed region, one after the other.
    ///
    /// Each outcome goes to `on_region` as soon as it is known. A failing
    /// region is logged, counted by [`crate::RegionError::is_region_scoped`] and
    /// skipped; setting `cancel` stops the run before the next region starts.
    pub async fn segment_all<P, F>(
        &self,
        provider: &P,
        display_size: Dimensions,
        cancel: &AtomicBool,
        mut on_region: F,
    ) -> Result<SegmentAllSummary>
    where
        P: InferenceProvider,
        F: FnMut(usize, Result<Annotation<DisplaySpace>>),
    {
        let display_size = display_size.validate(SpaceKind::Display)?;
        let proposals = provider.propose_regions().await?;
        info!(regions = proposals.len(), "segmenting all proposed regions");

        let mut summary = SegmentAllSummary::default();
        for (index, proposal) in proposals.into_iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                info!(index, "segment-all cancelled");
                summary.cancelled = true;
                break;
            }

            let outcome = match proposal {
                RegionProposal::Box { bbox, label } => {
                    self.segment_proposed_box(provider, &bbox, label, display_size).await
                }
                RegionProposal::Segmented(output) => self.annotate(&output, None, display_size),
            };

            match &outcome {
                Ok(_) => summary.produced += 1,
                Err(e) if e.is_region_scoped() => {
                    warn!(index, error = %e, "skipping region");
                    summary.failed += 1;
                }
                Err(e) => {
                    warn!(index, error = %e, "skipping region after transport failure");
                    summary.transport_failed += 1;
                }
            }
            on_region(index, outcome);
        }

        Ok(summary)
    }

    async fn segment_proposed_box<P: InferenceProvider>(
        &self,
        provider: &P,
        bbox: &BoundingBox<ModelSpace>,
        label: Option<String>,
        display_size: Dimensions,
    ) -> Result<Annotation<DisplaySpace>> {
        let request = self.session.request_for(bbox, self.session.model_size)?;
        let output = provider.segment(&request).await?;
        self.annotate(&output, label, display_size)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        error::RegionError,
        types::{Mask, Point},
    };

    struct MockProvider {
        output: InferenceOutput,
        proposals: Vec<RegionProposal>,
        requests: Mutex<Vec<RegionRequest>>,
    }

    impl MockProvider {
        fn new(output: InferenceOutput, proposals: Vec<RegionProposal>) -> Self {
            Self {
                output,
                proposals,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl InferenceProvider for MockProvider {
        async fn segment(&self, request: &RegionRequest) -> Result<InferenceOutput> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.output.clone())
        }

        async fn propose_regions(&self) -> Result<Vec<RegionProposal>> {
            Ok(self.proposals.clone())
        }
    }

    fn square_mask_output() -> InferenceOutput {
        let mut data = vec![0u8; 16];
        for (x, y) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
            data[y * 4 + x] = 1;
        }
        InferenceOutput::new(Segmentation::Mask {
            mask: Mask::new(4, 4, 1, data).unwrap(),
            scores: vec![0.9],
        })
        .with_description("<s>a square</s>")
    }

    fn segment(points: &[(f64, f64)]) -> RegionProposal {
        RegionProposal::Segmented(InferenceOutput::new(Segmentation::Segment(
            points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        )))
    }

    #[tokio::test]
    async fn test_segment_box_maps_through_spaces() {
        let session = ImageSession::new(Dimensions::new(16.0, 16.0), Dimensions::new(4.0, 4.0)).unwrap();
        let driver = SegmentationDriver::new(RegionPipeline::default(), session);
        let provider = MockProvider::new(square_mask_output(), vec![]);

        let annotation = driver
            .segment_box(&provider, &BoundingBox::new(2.0, 2.0, 6.0, 6.0), Dimensions::new(8.0, 8.0))
            .await
            .unwrap();

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].bbox.to_array(), [1.0, 1.0, 3.0, 3.0]);
        assert_eq!(requests[0].location_tokens, "<loc_249><loc_249><loc_749><loc_749>");

        assert_eq!(annotation.id, "region-1");
        assert_eq!(annotation.label.as_deref(), Some("a square"));
        let bbox = annotation.bounding_polygon.bounding_box();
        assert_eq!(bbox.to_array(), [2.0, 2.0, 4.0, 4.0]);
    }

    #[tokio::test]
    async fn test_segment_all_reports_each_region_and_skips_failures() {
        let session = ImageSession::new(Dimensions::new(100.0, 100.0), Dimensions::new(100.0, 100.0)).unwrap();
        let driver = SegmentationDriver::new(RegionPipeline::default(), session);
        let tokens = InferenceOutput::new(Segmentation::LocationTokens(
            "<loc_100><loc_100><loc_500><loc_500>".to_string(),
        ));
        let provider = MockProvider::new(
            tokens,
            vec![
                segment(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]),
                segment(&[(0.0, 0.0), (10.0, 0.0)]),
                RegionProposal::Box {
                    bbox: BoundingBox::new(10.0, 10.0, 50.0, 50.0),
                    label: Some("dog".to_string()),
                },
            ],
        );

        let cancel = AtomicBool::new(false);
        let mut outcomes = Vec::new();
        let summary = driver
            .segment_all(&provider, Dimensions::new(200.0, 200.0), &cancel, |index, outcome| {
                outcomes.push((index, outcome));
            })
            .await
            .unwrap();

        assert_eq!(
            summary,
            SegmentAllSummary {
                produced: 2,
                failed: 1,
                transport_failed: 0,
                cancelled: false
            }
        );
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[1].1, Err(RegionError::InsufficientPoints { found: 2 })));

        let first = outcomes[0].1.as_ref().unwrap();
        assert_eq!(first.id, "region-1");

        let third = outcomes[2].1.as_ref().unwrap();
        assert_eq!(third.id, "region-2");
        assert_eq!(third.label.as_deref(), Some("dog"));
        assert_eq!(third.bounding_polygon.bounding_box().to_array(), [20.0, 20.0, 100.0, 100.0]);
    }

    /// Proposes regions but loses every segment request in transit.
    struct UnreachableProvider {
        proposals: Vec<RegionProposal>,
    }

    impl InferenceProvider for UnreachableProvider {
        async fn segment(&self, _request: &RegionRequest) -> Result<InferenceOutput> {
            Err(RegionError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )))
        }

        async fn propose_regions(&self) -> Result<Vec<RegionProposal>> {
            Ok(self.proposals.clone())
        }
    }

    #[tokio::test]
    async fn test_segment_all_counts_transport_failures_apart() {
        let session = ImageSession::new(Dimensions::new(100.0, 100.0), Dimensions::new(100.0, 100.0)).unwrap();
        let driver = SegmentationDriver::new(RegionPipeline::default(), session);
        let provider = UnreachableProvider {
            proposals: vec![
                RegionProposal::Box {
                    bbox: BoundingBox::new(10.0, 10.0, 50.0, 50.0),
                    label: None,
                },
                segment(&[(0.0, 0.0), (10.0, 0.0)]),
                segment(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]),
            ],
        };

        let cancel = AtomicBool::new(false);
        let mut outcomes = Vec::new();
        let summary = driver
            .segment_all(&provider, Dimensions::new(100.0, 100.0), &cancel, |index, outcome| {
                outcomes.push((index, outcome));
            })
            .await
            .unwrap();

        assert_eq!(
            summary,
            SegmentAllSummary {
                produced: 1,
                failed: 1,
                transport_failed: 1,
                cancelled: false
            }
        );
        assert!(matches!(outcomes[0].1, Err(RegionError::Io(_))));
        assert_eq!(outcomes[2].1.as_ref().unwrap().id, "region-1");
    }

    #[tokio::test]
    async fn test_segment_all_stops_when_cancelled() {
        let session = ImageSession::new(Dimensions::new(10.0, 10.0), Dimensions::new(10.0, 10.0)).unwrap();
        let driver = SegmentationDriver::new(RegionPipeline::default(), session);
        let triangle = [(0.0, 0.0), (5.0, 0.0), (0.0, 5.0)];
        let provider = MockProvider::new(square_mask_output(), vec![segment(&triangle); 3]);

        let cancel = AtomicBool::new(false);
        let mut seen = 0;
        let summary = driver
            .segment_all(&provider, Dimensions::new(10.0, 10.0), &cancel, |_, _| {
                seen += 1;
                cancel.store(true, Ordering::Relaxed);
            })
            .await
            .unwrap();

        assert_eq!(seen, 1);
        assert!(summary.cancelled);
        assert_eq!(summary.produced, 1);
    }

    #[tokio::test]
    async fn test_invalid_display_size() {
        let session = ImageSession::new(Dimensions::new(10.0, 10.0), Dimensions::new(10.0, 10.0)).unwrap();
        let driver = SegmentationDriver::new(RegionPipeline::default(), session);
        let provider = MockProvider::new(square_mask_output(), vec![]);

        let result = driver
            .segment_box(&provider, &BoundingBox::new(0.0, 0.0, 1.0, 1.0), Dimensions::new(0.0, 10.0))
            .await;
        assert!(matches!(result, Err(RegionError::InvalidDimension { .. })));

        assert!(ImageSession::new(Dimensions::new(-1.0, 10.0), Dimensions::new(1.0, 1.0)).is_err());
    }
}
