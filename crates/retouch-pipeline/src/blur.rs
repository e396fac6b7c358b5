//! Gaussian smoothing.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`], which is separable
//! (one horizontal and one vertical pass), and applies it independently
//! to the R, G and B channels. The same blur backs both the user-facing
//! blur step and the unsharp masks in [`crate::sharpen`].
//!
//! The blur adjustment is expressed as a kernel size rather than a
//! sigma. [`kernel_sigma`] converts it with the usual rule for deriving
//! sigma from an odd kernel size, so a radius of 1 is a no-op and every
//! even size rounds up to the next odd one.

use image::GrayImage;

use crate::types::{PipelineError, RgbImage};

/// Sigma for a blur of the given kernel size, or `None` when the
/// kernel is a single pixel (no smoothing).
#[must_use]
pub fn kernel_sigma(radius: i32) -> Option<f32> {
    let size = if radius % 2 == 0 { radius + 1 } else { radius };
    if size <= 1 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let size = size as f32;
    Some(0.3f32.mul_add((size - 1.0).mul_add(0.5, -1.0), 0.8))
}

/// Apply Gaussian blur to an RGB image by blurring each channel
/// independently.
///
/// Gaussian blur is linear and per-channel, so splitting, blurring and
/// reassembling is equivalent to blurring in color space. Non-positive
/// sigma values return the image unchanged, since `imageproc` panics on
/// `sigma <= 0.0`. Zero-area images are also returned unchanged. Sigma
/// is never reduced for small images; `imageproc` clamps at the borders,
/// so a kernel wider than the image is fine.
///
/// # Errors
///
/// Returns [`PipelineError::Render`] if the blurred channels cannot be
/// reassembled into a buffer of the source dimensions.
pub fn gaussian_blur_rgb(image: &RgbImage, sigma: f32) -> Result<RgbImage, PipelineError> {
    let (w, h) = (image.width(), image.height());
    if sigma <= 0.0 || w == 0 || h == 0 {
        return Ok(image.clone());
    }

    let channels: [GrayImage; 3] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]))
    });

    let blurred: [GrayImage; 3] =
        std::array::from_fn(|c| imageproc::filter::gaussian_blur_f32(&channels[c], sigma));

    let mut interleaved = Vec::with_capacity(image.as_raw().len());
    for ((r, g), b) in blurred[0]
        .as_raw()
        .iter()
        .zip(blurred[1].as_raw())
        .zip(blurred[2].as_raw())
    {
        interleaved.extend_from_slice(&[*r, *g, *b]);
    }

    RgbImage::from_raw(w, h, interleaved).ok_or_else(|| PipelineError::Render {
        stage: "gaussian_blur",
        reason: format!("blurred channels do not form a {w}x{h} image"),
    })
}

/// Step 6: blur with a kernel of `radius` pixels.
///
/// # Errors
///
/// See [`gaussian_blur_rgb`].
pub fn blur(image: &RgbImage, radius: i32) -> Result<RgbImage, PipelineError> {
    match kernel_sigma(radius) {
        Some(sigma) => gaussian_blur_rgb(image, sigma),
        None => Ok(image.clone()),
    }
}
