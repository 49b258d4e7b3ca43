use std::fmt::Debug;
use std::marker::PhantomData;
use std::str::FromStr;

use geo_types::{Coord, LineString};
use image::GrayImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::error::{RegionError, Result};

/// The coordinate spaces a value can live in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SpaceKind {
    /// Rendered viewer coordinates (zoom/pan dependent)
    Display,
    /// Pixels of the original, full-resolution image
    Source,
    /// The fixed-size grid the model consumes
    Model,
}

/// Type-level label for a coordinate space.
///
/// Points, boxes and polygons carry their space as a zero-sized marker so that
/// values from two spaces cannot be combined without a [`crate::SpaceMapper`].
pub trait CoordinateSpace:
    Copy + Clone + Debug + Default + PartialEq + Send + Sync + 'static
{
    const KIND: SpaceKind;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DisplaySpace;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SourceSpace;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModelSpace;

impl CoordinateSpace for DisplaySpace {
    const KIND: SpaceKind = SpaceKind::Display;
}

impl CoordinateSpace for SourceSpace {
    const KIND: SpaceKind = SpaceKind::Source;
}

impl CoordinateSpace for ModelSpace {
    const KIND: SpaceKind = SpaceKind::Model;
}

/// Pixel size of a coordinate space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Check that both sides are finite and strictly positive.
    pub fn validate(self, space: SpaceKind) -> Result<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(self.width) && valid(self.height) {
            Ok(self)
        } else {
            Err(RegionError::InvalidDimension {
                space,
                width: self.width,
                height: self.height,
            })
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width as f64, height as f64)
    }
}

/// Parses `WIDTHxHEIGHT`, e.g. `1024x768`.
impl FromStr for Dimensions {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| RegionError::InvalidParameter(format!("expected WIDTHxHEIGHT, got '{s}'")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| RegionError::InvalidParameter(format!("invalid dimension '{v}' in '{s}'")))
        };
        Ok(Self::new(parse(w)?, parse(h)?))
    }
}

/// A point labeled with the space its coordinates belong to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Point<S> {
    pub x: f64,
    pub y: f64,
    #[serde(skip)]
    space: PhantomData<S>,
}

impl<S: CoordinateSpace> Point<S> {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, space: PhantomData }
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        self.squared_distance_to(other).sqrt()
    }

    pub fn squared_distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn to_coord(self) -> Coord<f64> {
        Coord { x: self.x, y: self.y }
    }

    pub fn from_coord(coord: Coord<f64>) -> Self {
        Self::new(coord.x, coord.y)
    }
}

impl<S: CoordinateSpace> From<[f64; 2]> for Point<S> {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

impl<S: CoordinateSpace> From<Point<S>> for [f64; 2] {
    fn from(point: Point<S>) -> Self {
        [point.x, point.y]
    }
}

/// Axis-aligned box with `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct BoundingBox<S> {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    #[serde(skip)]
    space: PhantomData<S>,
}

impl<S: CoordinateSpace> BoundingBox<S> {
    /// Create a box from two opposite corners, in any order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
            space: PhantomData,
        }
    }

    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Parse a media-fragment selector such as `xywh=pixel:10,20,100,50`,
    /// the format annotation overlays use for rectangular selections.
    pub fn from_media_fragment(fragment: &str) -> Result<Self> {
        let value = fragment
            .split_once('=')
            .map(|(_, v)| v)
            .unwrap_or(fragment);
        let value = value.rsplit(':').next().unwrap_or(value);
        let numbers: Vec<f64> = value
            .split(',')
            .map(|n| n.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| RegionError::InvalidParameter(format!("invalid xywh selector '{fragment}'")))?;

        match numbers.as_slice() {
            &[x, y, w, h] => Ok(Self::from_xywh(x, y, w, h)),
            _ => Err(RegionError::InvalidParameter(format!(
                "xywh selector needs 4 values, got {} in '{fragment}'",
                numbers.len()
            ))),
        }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn min(&self) -> Point<S> {
        Point::new(self.x1, self.y1)
    }

    pub fn max(&self) -> Point<S> {
        Point::new(self.x2, self.y2)
    }

    /// Corners in boundary order, starting at the top-left.
    pub fn corners(&self) -> [Point<S>; 4] {
        [
            Point::new(self.x1, self.y1),
            Point::new(self.x2, self.y1),
            Point::new(self.x2, self.y2),
            Point::new(self.x1, self.y2),
        ]
    }

    pub fn contains(&self, point: &Point<S>) -> bool {
        point.x >= self.x1 && point.x <= self.x2 && point.y >= self.y1 && point.y <= self.y2
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl<S: CoordinateSpace> From<[f64; 4]> for BoundingBox<S> {
    fn from([x1, y1, x2, y2]: [f64; 4]) -> Self {
        Self::new(x1, y1, x2, y2)
    }
}

/// Closed boundary stored as an open ring of at least three vertices.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct Polygon<S> {
    vertices: Vec<Point<S>>,
}

impl<S: CoordinateSpace> Polygon<S> {
    /// Build a polygon, dropping a repeated closing vertex if present.
    pub fn new(mut vertices: Vec<Point<S>>) -> Result<Self> {
        if vertices.len() > 3 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.len() < 3 {
            return Err(RegionError::InsufficientPoints { found: vertices.len() });
        }
        Ok(Self { vertices })
    }

    pub fn from_bounding_box(bbox: &BoundingBox<S>) -> Self {
        Self {
            vertices: bbox.corners().to_vec(),
        }
    }

    /// Rebuild from vertices that are already known to form a ring.
    pub(crate) fn from_ring(vertices: Vec<Point<S>>) -> Self {
        debug_assert!(vertices.len() >= 3);
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Point<S>] {
        &self.vertices
    }

    pub fn into_vertices(self) -> Vec<Point<S>> {
        self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Convert to a geo-types polygon (closed ring) for geometric operations
    pub fn to_geo_polygon(&self) -> geo_types::Polygon<f64> {
        let coords: Vec<Coord<f64>> = self.vertices.iter().map(|p| p.to_coord()).collect();
        geo_types::Polygon::new(LineString::new(coords), vec![])
    }

    pub fn area(&self) -> f64 {
        use geo::Area;
        self.to_geo_polygon().unsigned_area()
    }

    /// Perimeter including the closing edge.
    pub fn perimeter(&self) -> f64 {
        let n = self.vertices.len();
        (0..n)
            .map(|i| self.vertices[i].distance_to(&self.vertices[(i + 1) % n]))
            .sum()
    }

    pub fn bounding_box(&self) -> BoundingBox<S> {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for p in &self.vertices {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        BoundingBox::new(min_x, min_y, max_x, max_y)
    }

    pub fn centroid(&self) -> Point<S> {
        use geo::Centroid;
        match self.to_geo_polygon().centroid() {
            Some(c) => Point::new(c.x(), c.y()),
            None => {
                let bbox = self.bounding_box();
                Point::new((bbox.x1 + bbox.x2) / 2.0, (bbox.y1 + bbox.y2) / 2.0)
            }
        }
    }

    /// True when the point lies inside or on the boundary.
    pub fn covers(&self, point: &Point<S>) -> bool {
        use geo::Intersects;
        self.to_geo_polygon().intersects(&point.to_coord())
    }
}

/// Multi-channel membership mask as produced by a mask decoder.
///
/// Cells are stored interleaved: the value of channel `c` at `(x, y)` lives at
/// `data[num_channels * (y * width + x) + c]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mask {
    width: u32,
    height: u32,
    num_channels: usize,
    data: Vec<u8>,
}

impl Mask {
    pub fn new(width: u32, height: u32, num_channels: usize, data: Vec<u8>) -> Result<Self> {
        if num_channels == 0 {
            return Err(RegionError::InvalidMask("mask must have at least one channel".to_string()));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|cells| cells.checked_mul(num_channels))
            .ok_or_else(|| {
                RegionError::InvalidMask(format!("{width}x{height}x{num_channels} mask is too large"))
            })?;
        if data.len() != expected {
            return Err(RegionError::InvalidMask(format!(
                "buffer holds {} values, expected {width}x{height}x{num_channels} = {expected}",
                data.len()
            )));
        }
        Ok(Self { width, height, num_channels, data })
    }

    /// Single-channel mask from a grayscale image; pixels above `threshold` are foreground.
    pub fn from_gray(image: &GrayImage, threshold: u8) -> Self {
        let data = image
            .pixels()
            .map(|p| u8::from(p.0[0] > threshold))
            .collect();
        Self {
            width: image.width(),
            height: image.height(),
            num_channels: 1,
            data,
        }
    }

    /// Interleave per-channel planes (each `width * height`, row-major).
    pub fn from_planes(width: u32, height: u32, planes: &[Vec<u8>]) -> Result<Self> {
        let cells = width as usize * height as usize;
        if let Some((i, plane)) = planes.iter().enumerate().find(|(_, p)| p.len() != cells) {
            return Err(RegionError::InvalidMask(format!(
                "plane {i} holds {} values, expected {cells}",
                plane.len()
            )));
        }
        let num_channels = planes.len();
        let mut data = Vec::with_capacity(cells * num_channels);
        for cell in 0..cells {
            data.extend(planes.iter().map(|plane| plane[cell]));
        }
        Self::new(width, height, num_channels, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::from((self.width, self.height))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Value of `channel` at `(x, y)`, or `None` outside the grid.
    pub fn get(&self, x: u32, y: u32, channel: usize) -> Option<u8> {
        if x >= self.width || y >= self.height || channel >= self.num_channels {
            return None;
        }
        let offset = y as usize * self.width as usize + x as usize;
        self.data.get(self.num_channels * offset + channel).copied()
    }

    /// Number of foreground cells in a channel.
    pub fn foreground_count(&self, channel: usize) -> usize {
        if channel >= self.num_channels {
            return 0;
        }
        self.data
            .iter()
            .skip(channel)
            .step_by(self.num_channels)
            .filter(|&&v| v == 1)
            .count()
    }
}
