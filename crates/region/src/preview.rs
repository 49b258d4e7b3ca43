use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;
use tracing::debug;

use crate::{
    error::{RegionError, Result},
    spaces::SpaceMapper,
    types::{Dimensions, Mask, ModelSpace, Polygon, SourceSpace},
};

pub const MASK_COLOR: Rgba<u8> = Rgba([0, 114, 189, 255]);
pub const OUTLINE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Paint one mask channel and a model-space outline over `base`.
///
/// The mask grid is stretched over the whole image, and the polygon goes
/// through the same model-to-image mapping.
pub fn render_preview(
    base: &RgbaImage,
    mask: &Mask,
    channel: usize,
    polygon: Option<&Polygon<ModelSpace>>,
) -> Result<RgbaImage> {
    if channel >= mask.num_channels() {
        return Err(RegionError::InvalidMask(format!(
            "channel {channel} out of range for a mask with {} channels",
            mask.num_channels()
        )));
    }

    let image_size = Dimensions::from(base.dimensions());
    let mapper = SpaceMapper::<ModelSpace, SourceSpace>::new(mask.dimensions(), image_size)?;
    let mut canvas = base.clone();

    let (mask_w, mask_h) = (mask.width() as u64, mask.height() as u64);
    let (image_w, image_h) = (base.width() as u64, base.height() as u64);
    let mut painted = 0usize;
    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        let mx = (x as u64 * mask_w / image_w) as u32;
        let my = (y as u64 * mask_h / image_h) as u32;
        if mask.get(mx, my, channel) == Some(1) {
            *pixel = MASK_COLOR;
            painted += 1;
        }
    }

    if let Some(polygon) = polygon {
        let vertices = mapper.map_polygon(polygon).into_vertices();
        for (i, start) in vertices.iter().enumerate() {
            let end = &vertices[(i + 1) % vertices.len()];
            draw_line_segment_mut(
                &mut canvas,
                (start.x as f32, start.y as f32),
                (end.x as f32, end.y as f32),
                OUTLINE_COLOR,
            );
        }
    }

    debug!(painted, outline = polygon.is_some(), "rendered preview");
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn square_mask() -> Mask {
        let mut data = vec![0u8; 16];
        for (x, y) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
            data[y * 4 + x] = 1;
        }
        Mask::new(4, 4, 1, data).unwrap()
    }

    #[test]
    fn test_mask_is_stretched_over_image() {
        let base = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
        let preview = render_preview(&base, &square_mask(), 0, None).unwrap();
        assert_eq!(*preview.get_pixel(2, 2), MASK_COLOR);
        assert_eq!(*preview.get_pixel(5, 5), MASK_COLOR);
        assert_eq!(*preview.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*preview.get_pixel(7, 7), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_outline_is_drawn_in_image_space() {
        let base = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));
        let polygon = Polygon::from_bounding_box(&BoundingBox::<ModelSpace>::new(0.0, 0.0, 3.0, 3.0));
        let preview = render_preview(&base, &square_mask(), 0, Some(&polygon)).unwrap();
        // Model (3, 0) lands on image (30, 0).
        assert_eq!(*preview.get_pixel(30, 0), OUTLINE_COLOR);
        assert_eq!(*preview.get_pixel(0, 20), OUTLINE_COLOR);
        assert_eq!(*preview.get_pixel(35, 35), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_channel_out_of_range() {
        let base = RgbaImage::new(4, 4);
        assert!(render_preview(&base, &square_mask(), 1, None).is_err());
    }
}
