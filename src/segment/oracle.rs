//! The segmentation seam: mask rasters and the oracle trait.

use anyhow::{anyhow, Result};

use crate::frame::Frame;

// ----------------------------------------------------------------------------
// Mask: binary membership raster
// ----------------------------------------------------------------------------

/// Per-pixel membership raster produced by an oracle.
///
/// Any nonzero byte is foreground. A mask need not match the frame it was
/// derived from; consumers resample to the resolution they sample at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Mask {
    /// Wrap a membership buffer. The length must match the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("mask dimensions overflow"))?;
        if data.len() != expected_len {
            return Err(anyhow!(
                "expected {} mask bytes for {}x{}, received {}",
                expected_len,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// All-background mask of the given size.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[y as usize * self.width as usize + x as usize] != 0
    }

    /// Mark one pixel as foreground. No-op outside the raster.
    pub fn set_foreground(&mut self, x: u32, y: u32) {
        if x < self.width && y < self.height {
            self.data[y as usize * self.width as usize + x as usize] = 255;
        }
    }

    /// Nearest-neighbor resample onto a `width x height` grid.
    ///
    /// Each destination pixel maps to `src = dst * src_dim / dst_dim`
    /// (integer floor), so the result is deterministic whichever direction
    /// the mask scales.
    pub fn resample(&self, width: u32, height: u32) -> Mask {
        if width == self.width && height == self.height {
            return self.clone();
        }
        if width == 0 || height == 0 {
            return Mask::empty(width, height);
        }
        let mut data = vec![0u8; width as usize * height as usize];
        for y in 0..height {
            let src_y = (y as u64 * self.height as u64 / height as u64) as u32;
            for x in 0..width {
                let src_x = (x as u64 * self.width as u64 / width as u64) as u32;
                if self.is_foreground(src_x, src_y) {
                    data[y as usize * width as usize + x as usize] = 255;
                }
            }
        }
        Mask {
            width,
            height,
            data,
        }
    }
}

// ----------------------------------------------------------------------------
// SegmentationOracle: backend trait
// ----------------------------------------------------------------------------

/// Segmentation backend behind a model path.
///
/// Implementations own whatever model state they need. The caller owns the
/// box and swaps the whole oracle on a model change; an oracle never
/// reconfigures itself mid-flight.
pub trait SegmentationOracle: Send + std::fmt::Debug {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Segment one frame.
    ///
    /// `confidence` is the live detection threshold in `0.0..=1.0`.
    /// Returns zero or more instance masks; an empty vec means nothing
    /// cleared the threshold.
    fn segment(&mut self, frame: &Frame, confidence: f32) -> Result<Vec<Mask>>;

    /// Optional warm-up hook, called once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
