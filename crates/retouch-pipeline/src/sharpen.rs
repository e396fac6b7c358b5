//! Unsharp-mask operators: local contrast and the two sharpening passes.
//!
//! All three share [`unsharp_mask`]: blur the input, then push every
//! sample away from its blurred value by `amount`. A wide blur boosts
//! local contrast; a narrow one sharpens edges.

use crate::blur::gaussian_blur_rgb;
use crate::types::{PipelineError, RgbImage};

/// Blur sigma for local contrast enhancement.
pub const LOCAL_CONTRAST_SIGMA: f32 = 8.0;

/// Local contrast strength that leaves the image unchanged.
pub const LOCAL_CONTRAST_NEUTRAL: i32 = 3;

/// Blur sigma for the first (fine detail) sharpening pass.
pub const SHARPEN1_SIGMA: f32 = 1.0;

/// Blur sigma for the second (coarser) sharpening pass.
pub const SHARPEN2_SIGMA: f32 = 2.5;

/// `out = v + amount * (v - blur(v))`, rounded and clamped per sample.
///
/// Negative amounts blend toward the blurred image. An amount of zero
/// returns the input unchanged without blurring.
///
/// # Errors
///
/// Propagates [`PipelineError::Render`] from the blur.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn unsharp_mask(image: &RgbImage, sigma: f32, amount: f32) -> Result<RgbImage, PipelineError> {
    if amount.abs() < f32::EPSILON {
        return Ok(image.clone());
    }
    let blurred = gaussian_blur_rgb(image, sigma)?;
    let mut out = image.clone();
    for (sample, smooth) in out.iter_mut().zip(blurred.iter()) {
        let v = f32::from(*sample);
        let detail = v - f32::from(*smooth);
        *sample = amount.mul_add(detail, v).round().clamp(0.0, 255.0) as u8;
    }
    Ok(out)
}

/// Step 5: local contrast enhancement.
///
/// Strength 3 is neutral; the amount is `(strength - 3) / 7`, so the
/// top of the range (10) doubles local detail and the bottom (1) softens
/// it slightly.
///
/// # Errors
///
/// Propagates [`PipelineError::Render`] from the blur.
pub fn local_contrast(image: &RgbImage, strength: i32) -> Result<RgbImage, PipelineError> {
    #[allow(clippy::cast_precision_loss)]
    let amount = (strength - LOCAL_CONTRAST_NEUTRAL) as f32 / 7.0;
    unsharp_mask(image, LOCAL_CONTRAST_SIGMA, amount)
}

/// Step 9: one sharpening pass with `percent / 100` as the amount.
///
/// # Errors
///
/// Propagates [`PipelineError::Render`] from the blur.
pub fn sharpen(image: &RgbImage, percent: i32, sigma: f32) -> Result<RgbImage, PipelineError> {
    #[allow(clippy::cast_precision_loss)]
    let amount = percent as f32 / 100.0;
    unsharp_mask(image, sigma, amount)
}
