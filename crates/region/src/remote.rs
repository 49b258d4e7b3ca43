//! Client for a hosted segment-and-caption API, usable in place of local
//! inference. All coordinates on the wire are model space.

use serde::{Deserialize, Serialize};

use crate::{
    inference::{InferenceOutput, RegionProposal, RegionRequest, Segmentation},
    types::{ModelSpace, Point},
};

pub const SEGMENT_PATH: &str = "/flosam/seg-cap";
pub const SEGMENT_ALL_PATH: &str = "/flosam/seg-cap-all";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRequest {
    pub image_url: String,
    /// `[x1, y1, x2, y2]`, rounded to whole pixels
    #[serde(rename = "box")]
    pub bbox: [i64; 4],
}

impl SegmentRequest {
    pub fn new(image_url: impl Into<String>, request: &RegionRequest) -> Self {
        let b = &request.bbox;
        Self {
            image_url: image_url.into(),
            bbox: [b.x1, b.y1, b.x2, b.y2].map(|v| v.round() as i64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResponse {
    pub result: SegmentResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResult {
    pub segmentation: SegmentGeometry,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentGeometry {
    pub segment: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentAllRequest {
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentAllResponse {
    pub result: Vec<LabelledSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledSegment {
    pub segment: Vec<[f64; 2]>,
    #[serde(default)]
    pub label: Option<String>,
}

fn to_points(segment: Vec<[f64; 2]>) -> Vec<Point<ModelSpace>> {
    segment.into_iter().map(Point::from).collect()
}

impl From<SegmentResponse> for InferenceOutput {
    fn from(response: SegmentResponse) -> Self {
        let result = response.result;
        InferenceOutput {
            segmentation: Segmentation::Segment(to_points(result.segmentation.segment)),
            description: result.description,
        }
    }
}

impl From<LabelledSegment> for RegionProposal {
    fn from(item: LabelledSegment) -> Self {
        RegionProposal::Segmented(InferenceOutput {
            segmentation: Segmentation::Segment(to_points(item.segment)),
            description: item.label,
        })
    }
}

#[cfg(feature = "remote")]
pub use client::RemoteSegmenter;

#[cfg(feature = "remote")]
mod client {
    use tracing::debug;

    use super::*;
    use crate::{error::Result, inference::InferenceProvider};

    /// [`InferenceProvider`] backed by the hosted API, for one image.
    #[derive(Debug, Clone)]
    pub struct RemoteSegmenter {
        client: reqwest::Client,
        base_url: String,
        image_url: String,
    }

    impl RemoteSegmenter {
        pub fn new(base_url: impl Into<String>, image_url: impl Into<String>) -> Result<Self> {
            let client = reqwest::Client::builder()
                .user_agent(concat!("region/", env!("CARGO_PKG_VERSION")))
                .build()?;
            Ok(Self::with_client(client, base_url, image_url))
        }

        pub fn with_client(client: reqwest::Client, base_url: impl Into<String>, image_url: impl Into<String>) -> Self {
            Self {
                client,
                base_url: base_url.into().trim_end_matches('/').to_string(),
                image_url: image_url.into(),
            }
        }

        fn endpoint(&self, path: &str) -> String {
            format!("{}{}", self.base_url, path)
        }
    }

    impl InferenceProvider for RemoteSegmenter {
        async fn segment(&self, request: &RegionRequest) -> Result<InferenceOutput> {
            let body = SegmentRequest::new(self.image_url.clone(), request);
            debug!(bbox = ?body.bbox, "posting segment request");
            let response: SegmentResponse = self
                .client
                .post(self.endpoint(SEGMENT_PATH))
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(response.into())
        }

        async fn propose_regions(&self) -> Result<Vec<RegionProposal>> {
            let body = SegmentAllRequest {
                image_url: self.image_url.clone(),
            };
            let response: SegmentAllResponse = self
                .client
                .post(self.endpoint(SEGMENT_ALL_PATH))
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            debug!(regions = response.result.len(), "received region proposals");
            Ok(response.result.into_iter().map(RegionProposal::from).collect())
        }
    }
}
