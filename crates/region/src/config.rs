use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    algorithms::{DEFAULT_CONCAVITY, DEFAULT_EPS, DEFAULT_MIN_POINTS},
    error::{RegionError, Result},
    types::{Dimensions, SpaceKind},
};

/// DBSCAN settings for the optional noise filter
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct NoiseFilterConfig {
    pub enabled: bool,
    /// Neighbourhood radius in model-space pixels
    #[schemars(range(min = 0.0))]
    pub eps: f64,
    #[schemars(range(min = 1))]
    pub min_points: usize,
}

impl Default for NoiseFilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            eps: DEFAULT_EPS,
            min_points: DEFAULT_MIN_POINTS,
        }
    }
}

/// Tunables of the mask-to-polygon pipeline
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct RegionConfig {
    /// Concave hull parameter; larger values give smoother outlines
    pub concavity: f64,
    /// Douglas-Peucker tolerance applied after the hull, if any
    pub simplification: Option<f64>,
    pub noise_filter: NoiseFilterConfig,
    /// Input size of the segmentation model, when known up front
    pub model_size: Option<Dimensions>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            concavity: DEFAULT_CONCAVITY,
            simplification: None,
            noise_filter: NoiseFilterConfig::default(),
            model_size: None,
        }
    }
}

impl RegionConfig {
    /// Reject values the pipeline would refuse later.
    pub fn validate(&self) -> Result<()> {
        let filter = &self.noise_filter;
        if !filter.eps.is_finite() || filter.eps <= 0.0 {
            return Err(RegionError::InvalidParameter(format!(
                "noise_filter.eps must be finite and > 0, got {}",
                filter.eps
            )));
        }
        if filter.min_points == 0 {
            return Err(RegionError::InvalidParameter(
                "noise_filter.min_points must be at least 1".to_string(),
            ));
        }
        if self.concavity.is_nan() || self.concavity <= 0.0 {
            return Err(RegionError::InvalidParameter(format!(
                "concavity must be > 0, got {}",
                self.concavity
            )));
        }
        if let Some(tolerance) = self.simplification {
            if !tolerance.is_finite() || tolerance < 0.0 {
                return Err(RegionError::InvalidParameter(format!(
                    "simplification must be finite and >= 0, got {tolerance}"
                )));
            }
        }
        if let Some(model_size) = self.model_size {
            model_size.validate(SpaceKind::Model)?;
        }
        Ok(())
    }

    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RegionConfig)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: RegionConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: RegionConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file, picked by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&fs::read_to_string(path)?),
            Some("json") => Self::from_json(&fs::read_to_string(path)?),
            _ => Err(RegionError::UnsupportedFileFormat),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save to a `.toml` or `.json` file, picked by extension
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => self.to_toml()?,
            Some("json") => self.to_json()?,
            _ => return Err(RegionError::UnsupportedFileFormat),
        };
        fs::write(path, content)?;
        Ok(())
    }
}
