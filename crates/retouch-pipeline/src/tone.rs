//! Per-channel tone operators implemented as 256-entry lookup tables.
//!
//! Brightness, contrast, gamma, black/white levels, the tone curve and
//! shadows/highlights are all pure functions of a single channel value,
//! so each one is compiled into a [`Lut`] once per render and applied
//! to every R, G and B sample. Every table entry is rounded and clamped
//! to `0..=255`, which makes every stage saturate instead of wrapping.
//!
//! Each `*_lut` builder produces the identity table at the adjustment's
//! neutral value, and each operator function returns an unmodified copy
//! at that value.

use std::f32::consts::TAU;

use crate::types::RgbImage;

/// A per-channel lookup table.
pub type Lut = [u8; 256];

/// Build a table from a mapping over channel values `0.0..=255.0`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn build_lut(f: impl Fn(f32) -> f32) -> Lut {
    let mut lut = [0u8; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        let v = f32::from(u8::try_from(i).unwrap_or(u8::MAX));
        *entry = f(v).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// The identity table.
#[must_use]
pub fn identity_lut() -> Lut {
    build_lut(|v| v)
}

/// Apply `lut` to every channel sample of `image`.
#[must_use = "returns the remapped image"]
pub fn apply_lut(image: &RgbImage, lut: &Lut) -> RgbImage {
    let mut out = image.clone();
    for sample in out.iter_mut() {
        *sample = lut[usize::from(*sample)];
    }
    out
}

/// Additive offset: `v + offset`.
#[must_use]
pub fn brightness_lut(offset: i32) -> Lut {
    #[allow(clippy::cast_precision_loss)]
    let offset = offset as f32;
    build_lut(|v| v + offset)
}

/// Multiplicative spread around mid-gray: `(v - 128) * percent / 100 + 128`.
#[must_use]
pub fn contrast_lut(percent: i32) -> Lut {
    #[allow(clippy::cast_precision_loss)]
    let alpha = percent as f32 / 100.0;
    build_lut(|v| (v - 128.0).mul_add(alpha, 128.0))
}

/// Power-law remap: `255 * (v / 255) ^ (100 / gamma)`.
///
/// Values above 100 brighten midtones, values below darken them.
#[must_use]
pub fn gamma_lut(gamma: i32) -> Lut {
    #[allow(clippy::cast_precision_loss)]
    let exponent = 100.0 / gamma.max(1) as f32;
    build_lut(|v| 255.0 * (v / 255.0).powf(exponent))
}

/// Linear stretch mapping `[black, white]` onto `[0, 255]`.
///
/// Inputs outside the range clamp. When `white <= black` the span is
/// floored at one level, which degrades into a hard threshold at
/// `black` instead of dividing by zero or inverting the image.
#[must_use]
pub fn levels_lut(black: i32, white: i32) -> Lut {
    #[allow(clippy::cast_precision_loss)]
    let (black, span) = (black as f32, (white - black).max(1) as f32);
    build_lut(|v| (v - black) * 255.0 / span)
}

/// S-curve `x - k * sin(2 pi x) / (2 pi)` on normalized values, with
/// `k = (strength - 10) / 15`.
///
/// Positive `k` steepens midtones and flattens the ends; negative `k`
/// does the opposite. The slope `1 - k cos(2 pi x)` stays non-negative
/// for the whole strength range, so the curve never inverts tones.
#[must_use]
pub fn tone_curve_lut(strength: i32) -> Lut {
    #[allow(clippy::cast_precision_loss)]
    let k = (strength - 10) as f32 / 15.0;
    build_lut(|v| {
        let x = v / 255.0;
        255.0 * (x - k * (TAU * x).sin() / TAU)
    })
}

/// Shadow lift and highlight compression on normalized values.
///
/// Below mid-gray: `x + s * (0.5 - x)`; at or above: `x - h * (x - 0.5)`,
/// where `s` and `h` are the percentages divided by 100. Positive
/// shadows brighten dark tones toward the middle, positive highlights
/// pull bright tones down toward the middle; negative values do the
/// reverse.
#[must_use]
pub fn shadows_highlights_lut(shadows: i32, highlights: i32) -> Lut {
    #[allow(clippy::cast_precision_loss)]
    let (s, h) = (shadows as f32 / 100.0, highlights as f32 / 100.0);
    build_lut(|v| {
        let x = v / 255.0;
        let y = if x < 0.5 {
            s.mul_add(0.5 - x, x)
        } else {
            (-h).mul_add(x - 0.5, x)
        };
        255.0 * y.clamp(0.0, 1.0)
    })
}

/// Step 1: brightness.
#[must_use = "returns the adjusted image"]
pub fn brightness(image: &RgbImage, offset: i32) -> RgbImage {
    if offset == 0 {
        return image.clone();
    }
    apply_lut(image, &brightness_lut(offset))
}

/// Step 2: contrast.
#[must_use = "returns the adjusted image"]
pub fn contrast(image: &RgbImage, percent: i32) -> RgbImage {
    if percent == 100 {
        return image.clone();
    }
    apply_lut(image, &contrast_lut(percent))
}

/// Step 3: gamma.
#[must_use = "returns the adjusted image"]
pub fn gamma(image: &RgbImage, gamma: i32) -> RgbImage {
    if gamma == 100 {
        return image.clone();
    }
    apply_lut(image, &gamma_lut(gamma))
}

/// Step 4: black/white levels.
#[must_use = "returns the adjusted image"]
pub fn levels(image: &RgbImage, black: i32, white: i32) -> RgbImage {
    if black == 0 && white == 255 {
        return image.clone();
    }
    apply_lut(image, &levels_lut(black, white))
}

/// Step 7: tone curve.
#[must_use = "returns the adjusted image"]
pub fn tone_curve(image: &RgbImage, strength: i32) -> RgbImage {
    if strength == 10 {
        return image.clone();
    }
    apply_lut(image, &tone_curve_lut(strength))
}

/// Step 8: shadows/highlights.
#[must_use = "returns the adjusted image"]
pub fn shadows_highlights(image: &RgbImage, shadows: i32, highlights: i32) -> RgbImage {
    if shadows == 0 && highlights == 0 {
        return image.clone();
    }
    apply_lut(image, &shadows_highlights_lut(shadows, highlights))
}
