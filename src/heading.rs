//! Steering heading derived from a segmentation mask.
//!
//! The mask is sampled along fixed horizontal scanlines. Each scanline that
//! crosses foreground contributes the midpoint of its foreground pixels; the
//! midpoints collapse to one target point whose angle from the bottom-center
//! of the frame is the heading. 90 degrees is straight ahead, angles above
//! 90 steer left, below 90 steer right.

use crate::segment::Mask;

/// Fractional scan heights, top of frame downward.
pub const SCAN_HEIGHTS: [f64; 7] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7];

/// Heading reported when no path is visible.
pub const STRAIGHT_AHEAD_DEGREES: f64 = 90.0;

/// One sampled scanline midpoint, in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Midpoint {
    pub x: u32,
    pub y: u32,
}

/// Heading estimate for one frame. The angle keeps full precision; rounding
/// happens at the wire boundary.
#[derive(Clone, Debug)]
pub struct HeadingEstimate {
    pub angle_degrees: f64,
    pub midpoints: Vec<Midpoint>,
}

impl HeadingEstimate {
    fn straight_ahead() -> Self {
        HeadingEstimate {
            angle_degrees: STRAIGHT_AHEAD_DEGREES,
            midpoints: Vec::new(),
        }
    }
}

/// Estimate the heading for a frame of `width x height` pixels.
///
/// Only the first mask is consulted; extra instances are ignored. The mask
/// is resampled to the frame resolution before sampling. No usable
/// midpoints means straight ahead.
pub fn estimate(masks: &[Mask], width: u32, height: u32) -> HeadingEstimate {
    let Some(mask) = masks.first() else {
        return HeadingEstimate::straight_ahead();
    };
    if width == 0 || height == 0 {
        return HeadingEstimate::straight_ahead();
    }

    let mask = mask.resample(width, height);
    let mut midpoints = Vec::with_capacity(SCAN_HEIGHTS.len());
    for ratio in SCAN_HEIGHTS {
        let y = (height as f64 * ratio).floor() as u32;
        if y >= height {
            continue;
        }
        if let Some(x) = row_midpoint(&mask, y) {
            midpoints.push(Midpoint { x, y });
        }
    }

    let Some(target_y) = midpoints.iter().map(|p| p.y).min() else {
        return HeadingEstimate::straight_ahead();
    };

    // Average the midpoint columns at full precision; the target point is
    // (average x, highest sampled row).
    let avg_x =
        midpoints.iter().map(|p| p.x as f64).sum::<f64>() / midpoints.len() as f64;
    let dx = avg_x - width as f64 / 2.0;
    let dy = (height - target_y) as f64;
    HeadingEstimate {
        angle_degrees: dy.atan2(dx).to_degrees(),
        midpoints,
    }
}

/// Midpoint of the foreground pixels on one row, rounded to the nearest
/// column. `None` when the row is all background.
fn row_midpoint(mask: &Mask, y: u32) -> Option<u32> {
    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for x in 0..mask.width() {
        if mask.is_foreground(x, y) {
            sum += x as u64;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some((sum as f64 / count as f64).round() as u32)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
