use std::path::Path;

use region::{
    Annotation, AnnotationSet, Dimensions, DisplaySpace, Mask, ModelSpace, Polygon, RegionConfig, RegionError,
    RegionPipelineBuilder, SpaceKind, to_display_space,
};
use thiserror::Error;

/// Grayscale values above this are foreground in mask images
pub const MASK_THRESHOLD: u8 = 128;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Invalid box '{0}': expected x1,y1,x2,y2")]
    InvalidBox(String),
    #[error("No model size: pass --model or set model_size in the config")]
    MissingModelSize,
}

/// Parse `x1,y1,x2,y2`.
pub fn parse_box(s: &str) -> Result<[f64; 4], CliError> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| CliError::InvalidBox(s.to_string()))?;
    <[f64; 4]>::try_from(values).map_err(|_| CliError::InvalidBox(s.to_string()))
}

/// Parse `WIDTHxHEIGHT`, rejecting non-positive sizes.
pub fn parse_dimensions(s: &str) -> Result<Dimensions, String> {
    s.parse::<Dimensions>()
        .and_then(|d| d.validate(SpaceKind::Display))
        .map_err(|e| e.to_string())
}

/// Model input size from the command line, falling back to the config.
pub fn resolve_model_size(cli: Option<Dimensions>, config: &RegionConfig) -> Result<Dimensions, CliError> {
    cli.or(config.model_size).ok_or(CliError::MissingModelSize)
}

/// A mask image with its outline in model space.
pub struct OutlinedMask {
    pub mask: Mask,
    pub polygon: Polygon<ModelSpace>,
}

pub fn load_mask<P: AsRef<Path>>(path: P) -> Result<Mask, CliError> {
    let image = image::open(path)?.to_luma8();
    Ok(Mask::from_gray(&image, MASK_THRESHOLD))
}

/// Outline a single-channel mask with the configured pipeline.
pub fn outline_mask(mask: Mask, config: &RegionConfig) -> Result<OutlinedMask, CliError> {
    let pipeline = RegionPipelineBuilder::from_config(config)?.build();
    let polygon = pipeline.process_mask(&mask, &[1.0])?;
    Ok(OutlinedMask { mask, polygon })
}

/// Wrap a model-space outline as the single annotation of a display-space set.
///
/// Without an explicit display size the mask grid is the display.
pub fn to_annotation_set(
    outlined: &OutlinedMask,
    display: Option<Dimensions>,
) -> Result<AnnotationSet<DisplaySpace>, CliError> {
    let model_size = outlined.mask.dimensions();
    let display = display.unwrap_or(model_size);
    let polygon = to_display_space(&outlined.polygon, model_size, display)?;

    let mut set = AnnotationSet::new(display);
    set.push(Annotation::new("region-1", polygon, None));
    Ok(set)
}
