//! The `<loc_N>` location-token format used by region-description models.
//!
//! A box is written as four tokens `<loc_X1><loc_Y1><loc_X2><loc_Y2>` whose
//! values live on the normalized `0..=999` grid. Model output is a flat token
//! sequence read pairwise as `(x, y)` vertices.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::{
    error::{RegionError, Result},
    spaces::{to_normalized_grid, GRID_MAX_INDEX},
    types::{BoundingBox, CoordinateSpace, Dimensions, Point, Polygon},
};

static LOC_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<loc_(\d+)>").expect("location token pattern is valid"));

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Decoded values are scaled by `N * target / DECODE_DIVISOR`.
const DECODE_DIVISOR: f64 = 1000.0;

/// Encoder/decoder for location token streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationTokenCodec;

impl LocationTokenCodec {
    /// Encode a box of a `source_size` image as four location tokens.
    pub fn encode<S: CoordinateSpace>(&self, bbox: &BoundingBox<S>, source_size: Dimensions) -> Result<String> {
        let grid = to_normalized_grid(bbox, source_size)?;
        Ok(format!(
            "<loc_{}><loc_{}><loc_{}><loc_{}>",
            grid.x1, grid.y1, grid.x2, grid.y2
        ))
    }

    /// Decode a token stream into a polygon of `target_size`.
    ///
    /// Two vertices are read as opposite corners of a box and expanded into
    /// its four corners.
    pub fn decode<S: CoordinateSpace>(&self, tokens: &str, target_size: Dimensions) -> Result<Polygon<S>> {
        let points = self.decode_points(tokens, target_size)?;
        if let [a, b] = points.as_slice() {
            return Ok(Polygon::from_bounding_box(&BoundingBox::new(a.x, a.y, b.x, b.y)));
        }
        if points.len() == 1 {
            return Err(RegionError::MalformedTokenStream(
                "a single vertex cannot form a region".to_string(),
            ));
        }
        Polygon::new(points)
    }

    /// Decode the raw vertex list without any polygon interpretation.
    pub fn decode_points<S: CoordinateSpace>(&self, tokens: &str, target_size: Dimensions) -> Result<Vec<Point<S>>> {
        let target = target_size.validate(S::KIND)?;

        let values = LOC_TOKEN
            .captures_iter(tokens)
            .map(|caps| {
                let raw = &caps[1];
                let value: u32 = raw
                    .parse()
                    .map_err(|_| RegionError::MalformedTokenStream(format!("unparseable location value '{raw}'")))?;
                if value > GRID_MAX_INDEX {
                    return Err(RegionError::MalformedTokenStream(format!(
                        "location value {value} outside 0..={GRID_MAX_INDEX}"
                    )));
                }
                Ok(value as f64)
            })
            .collect::<Result<Vec<f64>>>()?;

        if values.is_empty() {
            return Err(RegionError::MalformedTokenStream("no location tokens".to_string()));
        }
        if values.len() % 2 != 0 {
            return Err(RegionError::MalformedTokenStream(format!(
                "odd number of location tokens ({})",
                values.len()
            )));
        }

        let points: Vec<Point<S>> = values
            .chunks_exact(2)
            .map(|pair| {
                Point::new(
                    pair[0] * target.width / DECODE_DIVISOR,
                    pair[1] * target.height / DECODE_DIVISOR,
                )
            })
            .collect();
        debug!(vertices = points.len(), "decoded location tokens");
        Ok(points)
    }
}

/// Remove every `<...>` tag, location tokens included, from generated text.
pub fn strip_tags(text: &str) -> String {
    ANY_TAG.replace_all(text, "").trim().to_string()
}
