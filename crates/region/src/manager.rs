use std::path::Path;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::{
    codec::LocationTokenCodec,
    config::RegionConfig,
    error::{RegionError, Result},
    pipeline::{builder::RegionPipelineBuilder, RegionPipeline},
    types::{BoundingBox, Dimensions, Mask, ModelSpace, Polygon, SourceSpace},
};

/// Grayscale values above this count as foreground when loading mask images
pub const MASK_IMAGE_THRESHOLD: u8 = 128;

#[derive(
    Debug, Clone,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq
)]
#[serde(tag = "type", content = "params")]
#[strum(serialize_all = "snake_case")]
pub enum RegionCommand {
    /// Outline the best channel of the loaded mask
    #[serde(rename = "extract_polygon")]
    ExtractPolygon {
        /// Overrides the configured concavity for this call
        #[serde(default)]
        concavity: Option<f64>,
    },

    /// Encode a source-space box as location tokens
    #[serde(rename = "encode_box")]
    EncodeBox {
        /// `[x1, y1, x2, y2]`
        bbox: [f64; 4],
        source_size: Dimensions,
    },

    /// Decode a location-token stream into a polygon
    #[serde(rename = "decode_tokens")]
    DecodeTokens {
        #[schemars(length(min = 1))]
        tokens: String,
        target_size: Dimensions,
    },
}

impl RegionCommand {
    /// Get the JSON schema for all commands
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RegionCommand)
    }

    /// Get a list of all available command names
    pub fn command_names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ExtractPolygon { .. } => "Outline the highest-scoring channel of the loaded mask as a polygon",
            Self::EncodeBox { .. } => "Encode a bounding box as <loc_N> location tokens",
            Self::DecodeTokens { .. } => "Decode <loc_N> location tokens into a polygon",
        }
    }

    /// `(name, description, required)` for each parameter
    pub fn parameters_info(&self) -> Vec<(&'static str, &'static str, bool)> {
        match self {
            Self::ExtractPolygon { .. } => vec![("concavity", "Concave hull parameter, > 0", false)],
            Self::EncodeBox { .. } => vec![
                ("bbox", "Box corners [x1, y1, x2, y2] in source pixels", true),
                ("source_size", "Source image size {width, height}", true),
            ],
            Self::DecodeTokens { .. } => vec![
                ("tokens", "Token stream such as <loc_10><loc_20><loc_30><loc_40>", true),
                ("target_size", "Size of the space to decode into {width, height}", true),
            ],
        }
    }
}

/// Result of a [`RegionCommand`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RegionCommandOutput {
    Polygon(Vec<[f64; 2]>),
    Tokens(String),
}

impl From<Polygon<ModelSpace>> for RegionCommandOutput {
    fn from(polygon: Polygon<ModelSpace>) -> Self {
        Self::Polygon(polygon.into_vertices().into_iter().map(<[f64; 2]>::from).collect())
    }
}

#[derive(Debug, Clone)]
struct LoadedMask {
    mask: Mask,
    scores: Vec<f32>,
}

/// Holds a mask and a pipeline, and executes [`RegionCommand`]s against them.
#[derive(Clone)]
pub struct RegionManager {
    mask: Option<LoadedMask>,
    config: RegionConfig,
    pipeline: Arc<RegionPipeline>,
}

impl RegionManager {
    pub fn new() -> Self {
        Self {
            mask: None,
            config: RegionConfig::default(),
            pipeline: Arc::new(RegionPipeline::default()),
        }
    }

    pub fn with_config(config: RegionConfig) -> Result<Self> {
        let pipeline = RegionPipelineBuilder::from_config(&config)?.build();
        Ok(Self {
            mask: None,
            config,
            pipeline: Arc::new(pipeline),
        })
    }

    /// Load a single-channel mask from an image file
    pub fn load_mask_image<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let image = image::open(path)?.to_luma8();
        self.set_mask(Mask::from_gray(&image, MASK_IMAGE_THRESHOLD), vec![1.0])
    }

    /// Load a single-channel mask from encoded image bytes
    pub fn load_mask_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let image = image::load_from_memory(bytes)?.to_luma8();
        self.set_mask(Mask::from_gray(&image, MASK_IMAGE_THRESHOLD), vec![1.0])
    }

    /// Set the mask and its per-channel scores directly
    pub fn set_mask(&mut self, mask: Mask, scores: Vec<f32>) -> Result<()> {
        if scores.len() != mask.num_channels() {
            return Err(RegionError::InvalidMask(format!(
                "{} scores for a mask with {} channels",
                scores.len(),
                mask.num_channels()
            )));
        }
        self.mask = Some(LoadedMask { mask, scores });
        Ok(())
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref().map(|loaded| &loaded.mask)
    }

    pub fn execute(&self, command: RegionCommand) -> Result<RegionCommandOutput> {
        match command {
            RegionCommand::ExtractPolygon { concavity } => {
                let loaded = self.mask.as_ref().ok_or(RegionError::NoMaskLoaded)?;
                let polygon = match concavity {
                    Some(concavity) => {
                        let config = RegionConfig {
                            concavity,
                            ..self.config.clone()
                        };
                        RegionPipelineBuilder::from_config(&config)?
                            .build()
                            .process_mask(&loaded.mask, &loaded.scores)?
                    }
                    None => self.pipeline.process_mask(&loaded.mask, &loaded.scores)?,
                };
                Ok(polygon.into())
            }
            RegionCommand::EncodeBox { bbox, source_size } => {
                let bbox = BoundingBox::<SourceSpace>::from(bbox);
                Ok(RegionCommandOutput::Tokens(LocationTokenCodec.encode(&bbox, source_size)?))
            }
            RegionCommand::DecodeTokens { tokens, target_size } => {
                let polygon: Polygon<ModelSpace> = LocationTokenCodec.decode(&tokens, target_size)?;
                Ok(polygon.into())
            }
        }
    }
}

impl Default for RegionManager {
    fn default() -> Self {
        Self::new()
    }
}
