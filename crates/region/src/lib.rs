//! # Region Outline Library
//!
//! Turns segmentation-model outputs into polygons a viewer can draw.
//!
//! ## Core Features
//!
//! - **Typed coordinate spaces**: display, source and model coordinates are
//!   distinct types, converted only through a [`SpaceMapper`]
//! - **Mask to polygon**: best-channel selection, optional density-based noise
//!   filtering and concave hull extraction, composed in a [`RegionPipeline`]
//! - **Location tokens**: encode boxes as `<loc_N>` tokens and decode token
//!   streams back into polygons
//! - **Sessions**: run one pipeline per user box, or per proposed region, against
//!   any async [`InferenceProvider`]
//! - **Annotations**: SVG selector, W3C annotation and GeoJSON export
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use region::{Mask, RegionPipeline};
//!
//! let image = image::open("mask.png")?.to_luma8();
//! let mask = Mask::from_gray(&image, 128);
//!
//! let pipeline = RegionPipeline::builder()
//!     .with_noise_filter(5.0, 10)
//!     .with_concavity(10.0)
//!     .build();
//! let polygon = pipeline.process_mask(&mask, &[1.0])?;
//! println!("{} vertices", polygon.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Location Tokens
//!
//! ```rust
//! use region::{BoundingBox, Dimensions, LocationTokenCodec, SourceSpace};
//!
//! let bbox = BoundingBox::<SourceSpace>::new(0.0, 0.0, 1024.0, 384.0);
//! let tokens = LocationTokenCodec.encode(&bbox, Dimensions::new(1024.0, 768.0))?;
//! assert_eq!(tokens, "<loc_0><loc_0><loc_999><loc_499>");
//! # Ok::<(), region::RegionError>(())
//! ```

pub mod error;
pub mod types;
pub mod spaces;
pub mod traits;
pub mod algorithms;
pub mod codec;
pub mod config;
pub mod pipeline;
pub mod inference;
pub mod session;
pub mod annotation;
pub mod io;
pub mod typed_geojson;
pub mod remote;
pub mod manager;
pub mod preview;

pub use error::{RegionError, Result};
pub use types::{
    BoundingBox, CoordinateSpace, Dimensions, DisplaySpace, Mask, ModelSpace, Point, Polygon, SourceSpace, SpaceKind,
};
pub use spaces::{to_display_space, to_model_space, to_normalized_grid, GridBox, SpaceMapper};
pub use traits::*;
pub use algorithms::*;
pub use codec::{strip_tags, LocationTokenCodec};
pub use config::{NoiseFilterConfig, RegionConfig};
pub use pipeline::{builder::RegionPipelineBuilder, RegionPipeline};
pub use inference::{InferenceOutput, InferenceProvider, RegionProposal, RegionRequest, Segmentation};
pub use session::{ImageSession, SegmentAllSummary, SegmentationDriver};
pub use annotation::{Annotation, AnnotationPayload, AnnotationSet, PayloadPoint};
pub use typed_geojson::{RegionGeoJson, RegionProperties};
pub use manager::{RegionCommand, RegionCommandOutput, RegionManager};
pub use preview::render_preview;

#[cfg(test)]
mod tests {
    use super::*;

    /// 4x4 mask whose foreground is the 2x2 block at (1..=2, 1..=2).
    fn square_mask() -> Mask {
        let mut data = vec![0u8; 16];
        for (x, y) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
            data[y * 4 + x] = 1;
        }
        Mask::new(4, 4, 1, data).unwrap()
    }

    #[test]
    fn test_square_mask_to_display_polygon() {
        let pipeline = RegionPipeline::builder().with_concavity(10.0).build();
        let polygon = pipeline.process_mask(&square_mask(), &[0.8]).unwrap();
        assert_eq!(polygon.len(), 4);

        let display = to_display_space(&polygon, Dimensions::new(4.0, 4.0), Dimensions::new(400.0, 200.0)).unwrap();
        assert_eq!(display.bounding_box().to_array(), [100.0, 50.0, 200.0, 100.0]);
    }

    #[test]
    fn test_noise_filter_on_real_mask_keeps_blob() {
        // A 20x20 blob plus scattered specks.
        let size = 64u32;
        let mut data = vec![0u8; (size * size) as usize];
        for y in 10..30 {
            for x in 10..30 {
                data[(y * size + x) as usize] = 1;
            }
        }
        for (x, y) in [(60, 2), (2, 60), (50, 50)] {
            data[(y * size + x) as usize] = 1;
        }
        let mask = Mask::new(size, size, 1, data).unwrap();

        let pipeline = RegionPipeline::builder().with_noise_filter(5.0, 10).build();
        let polygon = pipeline.process_mask(&mask, &[1.0]).unwrap();
        assert_eq!(polygon.bounding_box().to_array(), [10.0, 10.0, 29.0, 29.0]);

        let unfiltered = RegionPipeline::default().process_mask(&mask, &[1.0]).unwrap();
        assert_eq!(unfiltered.bounding_box().to_array(), [2.0, 2.0, 60.0, 60.0]);
    }

    #[test]
    fn test_region_scoped_errors() {
        assert!(RegionError::InsufficientPoints { found: 0 }.is_region_scoped());
        assert!(RegionError::MalformedTokenStream(String::new()).is_region_scoped());
        assert!(!RegionError::NoMaskLoaded.is_region_scoped());
    }
}
