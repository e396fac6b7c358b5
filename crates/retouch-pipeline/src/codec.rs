//! Image decoding and encoding at the edges of the pipeline.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the RGB8
//! [`OriginalImage`] every render starts from; encodes a
//! [`RenderedImage`] back to JPEG or PNG for the wire.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageReader};
use serde::{Deserialize, Serialize};

use crate::types::{OriginalImage, PipelineError, RenderedImage};

/// JPEG quality used when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Wire format for rendered images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum OutputFormat {
    /// Lossy JPEG at the given quality (1-100).
    Jpeg {
        /// Encoder quality; out-of-range values are clamped.
        quality: u8,
    },
    /// Lossless PNG.
    Png,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Jpeg {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl OutputFormat {
    /// MIME type for `Content-Type` headers.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Conventional file extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "jpg",
            Self::Png => "png",
        }
    }
}

/// Decode raw image bytes into an RGB8 original.
///
/// The header is inspected first so oversized images are rejected
/// before their pixels are allocated. Any alpha channel is dropped.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty or the
/// image has no pixels.
/// Returns [`PipelineError::ImageDecode`] if the format is unrecognized
/// or the data is corrupt.
/// Returns [`PipelineError::ImageTooLarge`] if `width * height` exceeds
/// `max_pixels`.
pub fn decode(bytes: &[u8], max_pixels: u64) -> Result<OriginalImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::ImageDecode(image::ImageError::IoError(e)))?
        .into_dimensions()
        .map_err(PipelineError::ImageDecode)?;
    if width == 0 || height == 0 {
        return Err(PipelineError::EmptyInput);
    }
    if u64::from(width) * u64::from(height) > max_pixels {
        return Err(PipelineError::ImageTooLarge {
            width,
            height,
            max_pixels,
        });
    }

    let img = image::load_from_memory(bytes).map_err(PipelineError::ImageDecode)?;
    Ok(OriginalImage::new(img.to_rgb8()))
}

/// Encode a rendered image in `format`.
///
/// # Errors
///
/// Returns [`PipelineError::Encode`] if the encoder rejects the buffer.
pub fn encode(image: &RenderedImage, format: OutputFormat) -> Result<Vec<u8>, PipelineError> {
    let pixels = image.pixels();
    let mut buf = Vec::new();
    let written = match format {
        OutputFormat::Jpeg { quality } => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
            encoder.write_image(
                pixels.as_raw(),
                pixels.width(),
                pixels.height(),
                ExtendedColorType::Rgb8,
            )
        }
        OutputFormat::Png => {
            let encoder = PngEncoder::new(&mut buf);
            encoder.write_image(
                pixels.as_raw(),
                pixels.width(),
                pixels.height(),
                ExtendedColorType::Rgb8,
            )
        }
    };
    written.map_err(PipelineError::Encode)?;
    Ok(buf)
}
