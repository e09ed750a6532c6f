#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::frame::Frame;
use crate::segment::oracle::{Mask, SegmentationOracle};

/// Default model input resolution when none is configured.
pub const DEFAULT_INPUT_WIDTH: u32 = 640;
pub const DEFAULT_INPUT_HEIGHT: u32 = 480;

/// Tract-based oracle for ONNX segmentation models.
///
/// Loads a local model file and runs it on RGB frames. Frames are resampled
/// to the model input resolution; the output grid becomes the mask at model
/// resolution, which downstream consumers resample back.
#[derive(Debug)]
pub struct TractOracle {
    model: TypedSimplePlan<TypedModel>,
    width: u32,
    height: u32,
}

impl TractOracle {
    /// Load an ONNX model from disk with the default input resolution.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        Self::with_input_size(model_path, DEFAULT_INPUT_WIDTH, DEFAULT_INPUT_HEIGHT)
    }

    /// Load an ONNX model from disk and pin its input resolution.
    pub fn with_input_size<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    /// NCHW float input, frame resampled to the model resolution.
    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let pixels = frame.data();
        let src_width = frame.width() as usize;
        let src_height = frame.height() as usize;
        if src_width == 0 || src_height == 0 {
            return Err(anyhow!("cannot run inference on an empty frame"));
        }

        let width = self.width as usize;
        let height = self.height as usize;
        let input =
            tract_ndarray::Array4::from_shape_fn((1, 3, height, width), |(_, channel, y, x)| {
                let src_y = y * src_height / height;
                let src_x = x * src_width / width;
                let idx = (src_y * src_width + src_x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            });

        Ok(input.into_tensor())
    }

    /// Threshold the first output grid into a mask at model resolution.
    ///
    /// The last two output dimensions are taken as the mask grid; leading
    /// instance or batch dimensions select the first entry.
    fn extract_mask(&self, outputs: TVec<TValue>, confidence: f32) -> Result<Option<Mask>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let scores = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = scores.shape();
        if shape.len() < 2 {
            return Err(anyhow!(
                "model output rank {} has no mask grid",
                shape.len()
            ));
        }
        let grid_height = shape[shape.len() - 2];
        let grid_width = shape[shape.len() - 1];
        let grid_len = grid_height
            .checked_mul(grid_width)
            .ok_or_else(|| anyhow!("mask grid dimensions overflow"))?;

        let mut data = vec![0u8; grid_len];
        let mut any_foreground = false;
        for (i, score) in scores.iter().take(grid_len).enumerate() {
            if *score >= confidence {
                data[i] = 255;
                any_foreground = true;
            }
        }
        if !any_foreground {
            return Ok(None);
        }
        Ok(Some(Mask::new(grid_width as u32, grid_height as u32, data)?))
    }
}

impl SegmentationOracle for TractOracle {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn segment(&mut self, frame: &Frame, confidence: f32) -> Result<Vec<Mask>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        Ok(self
            .extract_mask(outputs, confidence)?
            .into_iter()
            .collect())
    }
}
