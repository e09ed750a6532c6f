use anyhow::Result;

use crate::frame::Frame;
use crate::segment::oracle::{Mask, SegmentationOracle};

/// Fixed score the synthetic detection reports. Thresholds above this
/// suppress the stub entirely, which makes confidence plumbing testable
/// without a model file.
pub const STUB_SCORE: f32 = 0.5;

/// Deterministic oracle for `stub://` model paths.
///
/// Synthesizes one path-shaped mask per frame: a band centered on the frame
/// that narrows toward the top, like a track seen in perspective. Pixel
/// content is ignored.
#[derive(Debug)]
pub struct StubOracle;

impl StubOracle {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StubOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentationOracle for StubOracle {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn segment(&mut self, frame: &Frame, confidence: f32) -> Result<Vec<Mask>> {
        if confidence > STUB_SCORE {
            return Ok(Vec::new());
        }

        let width = frame.width();
        let height = frame.height();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let mut mask = Mask::empty(width, height);
        let center = width / 2;
        let top_half = width / 16;
        let bottom_half = width / 4;
        for y in 0..height {
            // Half-width grows linearly from top_half to bottom_half.
            let half =
                top_half + ((bottom_half - top_half) as u64 * y as u64 / height as u64) as u32;
            let x0 = center.saturating_sub(half);
            let x1 = (center + half).min(width.saturating_sub(1));
            for x in x0..=x1 {
                mask.set_foreground(x, y);
            }
        }
        Ok(vec![mask])
    }
}
