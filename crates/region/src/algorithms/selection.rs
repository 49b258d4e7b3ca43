use tracing::debug;

use crate::{
    error::{RegionError, Result},
    types::{Mask, ModelSpace, Point},
};

/// Picks the most confident mask channel and lists its foreground cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskSelector;

impl MaskSelector {
    /// Validate the score vector against the mask, then extract the points of
    /// the best-scoring channel.
    pub fn select(&self, mask: &Mask, scores: &[f32]) -> Result<(usize, Vec<Point<ModelSpace>>)> {
        if scores.len() != mask.num_channels() {
            return Err(RegionError::InvalidMask(format!(
                "{} scores for a mask with {} channels",
                scores.len(),
                mask.num_channels()
            )));
        }
        let channel = select_best_channel(scores)?;
        let points = extract_foreground_points(mask, channel)?;
        debug!(
            channel,
            score = scores[channel],
            points = points.len(),
            "selected mask channel"
        );
        Ok((channel, points))
    }
}

/// Index of the highest score; the first one wins on ties.
pub fn select_best_channel(scores: &[f32]) -> Result<usize> {
    if scores.is_empty() {
        return Err(RegionError::InvalidMask("empty score vector".to_string()));
    }
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best] {
            best = i;
        }
    }
    Ok(best)
}

/// Every cell whose `channel` value is 1, in row-major order.
pub fn extract_foreground_points(mask: &Mask, channel: usize) -> Result<Vec<Point<ModelSpace>>> {
    let num_channels = mask.num_channels();
    if channel >= num_channels {
        return Err(RegionError::InvalidMask(format!(
            "channel {channel} out of range for a mask with {num_channels} channels"
        )));
    }

    let width = mask.width() as usize;
    let points = mask
        .data()
        .iter()
        .skip(channel)
        .step_by(num_channels)
        .enumerate()
        .filter(|&(_, &value)| value == 1)
        .map(|(cell, _)| Point::new((cell % width) as f64, (cell / width) as f64))
        .collect();

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mask() -> Mask {
        let mut data = vec![0u8; 16];
        for (x, y) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
            data[y * 4 + x] = 1;
        }
        Mask::new(4, 4, 1, data).unwrap()
    }

    #[test]
    fn test_first_maximum_wins() {
        assert_eq!(select_best_channel(&[0.5, 0.9, 0.9]).unwrap(), 1);
        assert_eq!(select_best_channel(&[0.7, 0.7, 0.7]).unwrap(), 0);
        assert_eq!(select_best_channel(&[0.1, 0.2, 0.95]).unwrap(), 2);
        assert!(select_best_channel(&[]).is_err());
    }

    #[test]
    fn test_foreground_points_are_row_major() {
        let points = extract_foreground_points(&square_mask(), 0).unwrap();
        let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(coords, vec![(1.0, 1.0), (2.0, 1.0), (1.0, 2.0), (2.0, 2.0)]);
    }

    #[test]
    fn test_empty_mask_yields_no_points() {
        let mask = Mask::new(8, 8, 3, vec![0; 8 * 8 * 3]).unwrap();
        assert!(extract_foreground_points(&mask, 2).unwrap().is_empty());
    }

    #[test]
    fn test_reads_only_the_selected_channel() {
        // Two channels on a 2x2 grid: channel 0 marks (0,0), channel 1 marks (1,1).
        let mask = Mask::from_planes(2, 2, &[vec![1, 0, 0, 0], vec![0, 0, 0, 1]]).unwrap();
        let (channel, points) = MaskSelector.select(&mask, &[0.2, 0.8]).unwrap();
        assert_eq!(channel, 1);
        assert_eq!(points.len(), 1);
        assert_eq!((points[0].x, points[0].y), (1.0, 1.0));
    }

    #[test]
    fn test_score_count_must_match_channels() {
        let mask = Mask::new(2, 2, 3, vec![0; 12]).unwrap();
        assert!(matches!(
            MaskSelector.select(&mask, &[0.1, 0.2]),
            Err(RegionError::InvalidMask(_))
        ));
        assert!(extract_foreground_points(&mask, 3).is_err());
    }
}
