use thiserror::Error;

use crate::types::SpaceKind;

#[derive(Error, Debug)]
pub enum RegionError {
    #[error("Invalid {space} dimensions: {width}x{height} (both must be finite and > 0)")]
    InvalidDimension {
        space: SpaceKind,
        width: f64,
        height: f64,
    },

    #[error("Insufficient points for a polygon: got {found}, need at least 3")]
    InsufficientPoints { found: usize },

    #[error("Degenerate point set: all {count} unique points are collinear")]
    DegeneratePointSet { count: usize },

    #[error("Malformed location token stream: {0}")]
    MalformedTokenStream(String),

    #[error("Invalid mask: {0}")]
    InvalidMask(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("No mask loaded")]
    NoMaskLoaded,

    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,

    #[error("Inference provider error: {0}")]
    Inference(String),

    #[error("Failed to load image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[cfg(feature = "remote")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RegionError {
    /// Whether the error only concerns the request that produced it.
    ///
    /// A driver reports these for the affected region and keeps going;
    /// everything else points at the environment (files, config, transport).
    pub fn is_region_scoped(&self) -> bool {
        matches!(
            self,
            Self::InvalidDimension { .. }
                | Self::InsufficientPoints { .. }
                | Self::DegeneratePointSet { .. }
                | Self::MalformedTokenStream(_)
                | Self::InvalidMask(_)
                | Self::Inference(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RegionError>;
