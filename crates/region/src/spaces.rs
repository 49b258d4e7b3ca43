//! Conversions between display, source and model coordinate spaces.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    types::{BoundingBox, CoordinateSpace, Dimensions, DisplaySpace, ModelSpace, Point, Polygon},
};

/// Largest index of the normalized location grid (`0..=999`).
pub const GRID_MAX_INDEX: u32 = 999;

/// Per-axis linear scaling from one space into another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceMapper<Src, Dst> {
    from: Dimensions,
    to: Dimensions,
    spaces: PhantomData<(Src, Dst)>,
}

impl<Src: CoordinateSpace, Dst: CoordinateSpace> SpaceMapper<Src, Dst> {
    /// Both sizes must be finite and strictly positive.
    pub fn new(from: Dimensions, to: Dimensions) -> Result<Self> {
        Ok(Self {
            from: from.validate(Src::KIND)?,
            to: to.validate(Dst::KIND)?,
            spaces: PhantomData,
        })
    }

    pub fn from_dimensions(&self) -> Dimensions {
        self.from
    }

    pub fn to_dimensions(&self) -> Dimensions {
        self.to
    }

    pub fn scale_x(&self) -> f64 {
        self.to.width / self.from.width
    }

    pub fn scale_y(&self) -> f64 {
        self.to.height / self.from.height
    }

    pub fn map_point(&self, point: Point<Src>) -> Point<Dst> {
        Point::new(point.x * self.scale_x(), point.y * self.scale_y())
    }

    pub fn map_box(&self, bbox: &BoundingBox<Src>) -> BoundingBox<Dst> {
        let min = self.map_point(bbox.min());
        let max = self.map_point(bbox.max());
        BoundingBox::new(min.x, min.y, max.x, max.y)
    }

    pub fn map_polygon(&self, polygon: &Polygon<Src>) -> Polygon<Dst> {
        Polygon::from_ring(polygon.vertices().iter().map(|&p| self.map_point(p)).collect())
    }

    pub fn map_points(&self, points: &[Point<Src>]) -> Vec<Point<Dst>> {
        points.iter().map(|&p| self.map_point(p)).collect()
    }

    /// The mapper going the other way.
    pub fn inverse(&self) -> SpaceMapper<Dst, Src> {
        SpaceMapper {
            from: self.to,
            to: self.from,
            spaces: PhantomData,
        }
    }
}

/// A box quantized onto the normalized `0..=999` model grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl GridBox {
    pub fn to_array(&self) -> [u32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// Quantize one coordinate: `floor(v / extent * 999)`, clamped to the grid.
pub fn to_grid_index(value: f64, extent: f64) -> u32 {
    let scaled = (value / extent * GRID_MAX_INDEX as f64).floor();
    scaled.clamp(0.0, GRID_MAX_INDEX as f64) as u32
}

/// Project a box onto the normalized location grid of `source` size.
pub fn to_normalized_grid<S: CoordinateSpace>(bbox: &BoundingBox<S>, source: Dimensions) -> Result<GridBox> {
    let source = source.validate(S::KIND)?;
    Ok(GridBox {
        x1: to_grid_index(bbox.x1, source.width),
        y1: to_grid_index(bbox.y1, source.height),
        x2: to_grid_index(bbox.x2, source.width),
        y2: to_grid_index(bbox.y2, source.height),
    })
}

/// Scale a user box into the space the model consumes.
pub fn to_model_space<S: CoordinateSpace>(
    bbox: &BoundingBox<S>,
    source_size: Dimensions,
    model_size: Dimensions,
) -> Result<BoundingBox<ModelSpace>> {
    Ok(SpaceMapper::<S, ModelSpace>::new(source_size, model_size)?.map_box(bbox))
}

/// Scale a model-space polygon onto the rendered viewer.
pub fn to_display_space(
    polygon: &Polygon<ModelSpace>,
    model_size: Dimensions,
    display_size: Dimensions,
) -> Result<Polygon<DisplaySpace>> {
    Ok(SpaceMapper::<ModelSpace, DisplaySpace>::new(model_size, display_size)?.map_polygon(polygon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::RegionError, types::SourceSpace};

    #[test]
    fn test_per_axis_scaling() {
        let mapper = SpaceMapper::<SourceSpace, ModelSpace>::new(
            Dimensions::new(2048.0, 1000.0),
            Dimensions::new(1024.0, 500.0),
        )
        .unwrap();

        let p = mapper.map_point(Point::new(100.0, 40.0));
        assert_eq!((p.x, p.y), (50.0, 20.0));

        let stretched = SpaceMapper::<SourceSpace, ModelSpace>::new(
            Dimensions::new(100.0, 100.0),
            Dimensions::new(200.0, 50.0),
        )
        .unwrap();
        let p = stretched.map_point(Point::new(10.0, 10.0));
        assert_eq!((p.x, p.y), (20.0, 5.0));
    }

    #[test]
    fn test_invalid_dimensions_are_rejected() {
        let result = SpaceMapper::<SourceSpace, ModelSpace>::new(
            Dimensions::new(0.0, 100.0),
            Dimensions::new(1024.0, 1024.0),
        );
        assert!(matches!(result, Err(RegionError::InvalidDimension { .. })));

        let result = to_model_space(
            &BoundingBox::<DisplaySpace>::new(0.0, 0.0, 1.0, 1.0),
            Dimensions::new(100.0, 100.0),
            Dimensions::new(1024.0, -1.0),
        );
        assert!(matches!(result, Err(RegionError::InvalidDimension { .. })));
    }

    #[test]
    fn test_display_model_display_round_trip() {
        let display = Dimensions::new(1373.0, 911.0);
        let model = Dimensions::new(1024.0, 683.0);
        let boxes = [
            BoundingBox::<DisplaySpace>::new(0.0, 0.0, 1373.0, 911.0),
            BoundingBox::new(12.5, 700.25, 400.0, 910.0),
            BoundingBox::new(1.0, 1.0, 2.0, 2.0),
        ];

        for bbox in boxes {
            let model_box = to_model_space(&bbox, display, model).unwrap();
            let back = to_display_space(&Polygon::from_bounding_box(&model_box), model, display).unwrap();
            let restored = back.bounding_box();
            for (a, b) in bbox.to_array().iter().zip(restored.to_array()) {
                assert!((a - b).abs() <= 1.0, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_inverse_mapper() {
        let mapper = SpaceMapper::<DisplaySpace, ModelSpace>::new(
            Dimensions::new(800.0, 600.0),
            Dimensions::new(1024.0, 768.0),
        )
        .unwrap();
        let p = Point::<DisplaySpace>::new(123.0, 456.0);
        let back = mapper.inverse().map_point(mapper.map_point(p));
        assert!((back.x - p.x).abs() < 1e-9);
        assert!((back.y - p.y).abs() < 1e-9);
    }

    #[test]
    fn test_normalized_grid_floors_and_clamps() {
        let source = Dimensions::new(1024.0, 768.0);
        let grid = to_normalized_grid(&BoundingBox::<SourceSpace>::new(0.0, 0.0, 1024.0, 384.0), source).unwrap();
        assert_eq!(grid.to_array(), [0, 0, 999, 499]);

        // 627 / 1024 * 999 = 611.68..
        assert_eq!(to_grid_index(627.0, 1024.0), 611);
        assert_eq!(to_grid_index(-5.0, 1024.0), 0);
        assert_eq!(to_grid_index(2000.0, 1024.0), 999);
    }
}
