//! Shared types for the retouch adjustment pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Re-export `RgbImage` so downstream crates can reference pixel
/// buffers without depending on `image` directly.
pub use image::RgbImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// The decoded source image of an editing session.
///
/// Cloning is cheap (the pixel buffer is reference counted) and the
/// pixels can never be mutated after construction: every adjustment
/// reads from the original and writes a fresh buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalImage(Arc<RgbImage>);

impl OriginalImage {
    /// Wrap a decoded pixel buffer.
    #[must_use]
    pub fn new(pixels: RgbImage) -> Self {
        Self(Arc::new(pixels))
    }

    /// The source pixels.
    #[must_use]
    pub fn pixels(&self) -> &RgbImage {
        &self.0
    }

    /// Source dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.0.width(),
            height: self.0.height(),
        }
    }
}

/// A pixel buffer produced by one pipeline evaluation.
///
/// Rendered images are never edited in place; they are shared between
/// the session's current state, its history and any number of
/// in-flight responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage(Arc<RgbImage>);

impl RenderedImage {
    /// Wrap a freshly rendered pixel buffer.
    #[must_use]
    pub fn new(pixels: RgbImage) -> Self {
        Self(Arc::new(pixels))
    }

    /// The rendered pixels.
    #[must_use]
    pub fn pixels(&self) -> &RgbImage {
        &self.0
    }

    /// Rendered dimensions (always equal to the source dimensions).
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.0.width(),
            height: self.0.height(),
        }
    }

    /// Returns `true` if both handles point at the same buffer.
    ///
    /// Used to verify that cache hits and undo restore the stored
    /// render instead of recomputing it.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Errors that can occur while decoding, rendering or encoding.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[source] image::ImageError),

    /// The decoded image exceeds the configured pixel budget.
    #[error("image too large: {width}x{height} exceeds {max_pixels} pixels")]
    ImageTooLarge {
        /// Decoded width.
        width: u32,
        /// Decoded height.
        height: u32,
        /// Configured maximum pixel count.
        max_pixels: u64,
    },

    /// Failed to encode a rendered image.
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    /// An operator failed unexpectedly.
    #[error("render failed in {stage}: {reason}")]
    Render {
        /// Name of the failing stage.
        stage: &'static str,
        /// Human-readable failure description.
        reason: String,
    },
}
