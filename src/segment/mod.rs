//! Segmentation oracle seam and its backends.
//!
//! A model path selects the backend: `stub://` paths get the synthetic
//! oracle, `.onnx` paths get the tract backend when it is compiled in.

mod backends;
mod oracle;

use anyhow::{anyhow, Result};

pub use backends::StubOracle;
pub use oracle::{Mask, SegmentationOracle};

#[cfg(feature = "backend-tract")]
pub use backends::TractOracle;

/// Build the oracle for a model path.
///
/// Called once at startup and again on every live model switch; the caller
/// replaces its box wholesale with the result.
pub fn load_oracle(model_path: &str) -> Result<Box<dyn SegmentationOracle>> {
    if model_path.trim().is_empty() {
        return Err(anyhow!("model path is empty"));
    }
    if model_path.starts_with("stub://") {
        return Ok(Box::new(StubOracle::new()));
    }
    if model_path.ends_with(".onnx") {
        #[cfg(feature = "backend-tract")]
        {
            return Ok(Box::new(TractOracle::new(model_path)?));
        }
        #[cfg(not(feature = "backend-tract"))]
        {
            return Err(anyhow!(
                "model '{}' requires the backend-tract feature",
                model_path
            ));
        }
    }
    Err(anyhow!(
        "unsupported model path '{}' (expected stub:// or an .onnx file)",
        model_path
    ))
}
