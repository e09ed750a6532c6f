//! Decoded frame rasters and payload decoding.
//!
//! Frames arrive either as raw JPEG bytes in a binary message or as a base64
//! JPEG under the `data` key of a JSON text message. Both paths normalize to
//! the same in-memory `Frame`: tightly packed RGB24, row-major.

use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::GenericImageView;

use crate::protocol::InboundMessage;

/// One decoded raster from the video stream.
pub struct Frame {
    /// Tightly packed RGB24, `width * height * 3` bytes.
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap an RGB24 buffer. The length must match the dimensions exactly.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected_len,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Re-encode as JPEG, for snapshot persistence.
    pub fn to_jpeg(&self) -> Result<Vec<u8>> {
        let image: image::RgbImage =
            image::ImageBuffer::from_raw(self.width, self.height, self.data.clone())
                .ok_or_else(|| anyhow!("frame buffer does not match dimensions"))?;
        let mut cursor = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut cursor, image::ImageFormat::Jpeg)
            .context("failed to encode frame as JPEG")?;
        Ok(cursor.into_inner())
    }
}

/// Decode one inbound message into a frame.
///
/// Binary messages carry raw JPEG bytes. Text messages must be a JSON object
/// with a base64 JPEG under `data`. Anything else is a decode error; callers
/// drop the message and move on.
pub fn decode_message(msg: &InboundMessage) -> Result<Frame> {
    match msg {
        InboundMessage::Binary(bytes) => decode_jpeg(bytes),
        InboundMessage::Text(raw) => {
            let value: serde_json::Value =
                serde_json::from_str(raw).context("frame payload is not valid JSON")?;
            let encoded = value
                .get("data")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| anyhow!("frame payload has no base64 string under 'data'"))?;
            decode_base64_jpeg(encoded)
        }
    }
}

/// Decode a base64 JPEG payload.
pub fn decode_base64_jpeg(encoded: &str) -> Result<Frame> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("invalid base64 frame data")?;
    decode_jpeg(&bytes)
}

/// Decode JPEG bytes into an RGB frame.
pub fn decode_jpeg(bytes: &[u8]) -> Result<Frame> {
    if bytes.is_empty() {
        return Err(anyhow!("empty frame payload"));
    }
    let image = image::load_from_memory(bytes).context("failed to decode JPEG frame")?;
    let (width, height) = image.dimensions();
    let rgb = image.into_rgb8();
    Frame::new(rgb.into_raw(), width, height)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
