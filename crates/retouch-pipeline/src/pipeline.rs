//! The ordered operator table and the render loop.
//!
//! The adjustments do not commute (brightening before a gamma curve is
//! not the same as brightening after it), so the order lives in exactly
//! one place: [`OPERATORS`]. Each entry names its [`Stage`], the
//! parameters it reads, and the transform it applies. [`render`] walks
//! the table front to back; an operator whose parameters are all at
//! their neutral defaults is skipped, so its output is bit-identical to
//! not running it.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Clock, NoClock, RenderDiagnostics, StageDiagnostics};
use crate::params::{Adjustment, ParameterVector};
use crate::sharpen::{SHARPEN1_SIGMA, SHARPEN2_SIGMA};
use crate::types::{OriginalImage, PipelineError, RenderedImage, RgbImage};

/// One step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Additive brightness offset.
    Brightness,
    /// Contrast around mid-gray.
    Contrast,
    /// Power-law gamma.
    Gamma,
    /// Black/white level stretch.
    Levels,
    /// Wide unsharp mask.
    LocalContrast,
    /// Gaussian blur.
    Blur,
    /// S-curve.
    ToneCurve,
    /// Shadow lift and highlight compression.
    ShadowsHighlights,
    /// Fine sharpening pass.
    Sharpen1,
    /// Coarse sharpening pass.
    Sharpen2,
}

impl Stage {
    /// Human-readable stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Brightness => "Brightness",
            Self::Contrast => "Contrast",
            Self::Gamma => "Gamma",
            Self::Levels => "Levels",
            Self::LocalContrast => "Local Contrast",
            Self::Blur => "Blur",
            Self::ToneCurve => "Tone Curve",
            Self::ShadowsHighlights => "Shadows/Highlights",
            Self::Sharpen1 => "Sharpen 1",
            Self::Sharpen2 => "Sharpen 2",
        }
    }
}

/// Signature shared by every operator transform.
pub type Transform = fn(&RgbImage, &ParameterVector) -> Result<RgbImage, PipelineError>;

/// A tagged operator descriptor.
#[derive(Clone, Copy)]
pub struct Operator {
    /// Which step this is.
    pub stage: Stage,
    /// Parameters the transform reads.
    pub inputs: &'static [Adjustment],
    /// The pixel transform.
    pub apply: Transform,
}

impl Operator {
    /// Whether every input is at its neutral default.
    #[must_use]
    pub fn is_neutral(&self, params: &ParameterVector) -> bool {
        self.inputs.iter().all(|adj| params.is_default(*adj))
    }
}

impl std::fmt::Debug for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operator")
            .field("stage", &self.stage)
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

/// The canonical operator order. Never reordered at runtime.
pub const OPERATORS: [Operator; 10] = [
    Operator {
        stage: Stage::Brightness,
        inputs: &[Adjustment::Brightness],
        apply: |img, p| Ok(crate::tone::brightness(img, p.get(Adjustment::Brightness))),
    },
    Operator {
        stage: Stage::Contrast,
        inputs: &[Adjustment::Contrast],
        apply: |img, p| Ok(crate::tone::contrast(img, p.get(Adjustment::Contrast))),
    },
    Operator {
        stage: Stage::Gamma,
        inputs: &[Adjustment::Gamma],
        apply: |img, p| Ok(crate::tone::gamma(img, p.get(Adjustment::Gamma))),
    },
    Operator {
        stage: Stage::Levels,
        inputs: &[Adjustment::BlackLevel, Adjustment::WhiteLevel],
        apply: |img, p| {
            Ok(crate::tone::levels(
                img,
                p.get(Adjustment::BlackLevel),
                p.get(Adjustment::WhiteLevel),
            ))
        },
    },
    Operator {
        stage: Stage::LocalContrast,
        inputs: &[Adjustment::LocalContrast],
        apply: |img, p| crate::sharpen::local_contrast(img, p.get(Adjustment::LocalContrast)),
    },
    Operator {
        stage: Stage::Blur,
        inputs: &[Adjustment::Blur],
        apply: |img, p| crate::blur::blur(img, p.get(Adjustment::Blur)),
    },
    Operator {
        stage: Stage::ToneCurve,
        inputs: &[Adjustment::ToneCurve],
        apply: |img, p| Ok(crate::tone::tone_curve(img, p.get(Adjustment::ToneCurve))),
    },
    Operator {
        stage: Stage::ShadowsHighlights,
        inputs: &[Adjustment::Shadows, Adjustment::Highlights],
        apply: |img, p| {
            Ok(crate::tone::shadows_highlights(
                img,
                p.get(Adjustment::Shadows),
                p.get(Adjustment::Highlights),
            ))
        },
    },
    Operator {
        stage: Stage::Sharpen1,
        inputs: &[Adjustment::Sharpen1],
        apply: |img, p| crate::sharpen::sharpen(img, p.get(Adjustment::Sharpen1), SHARPEN1_SIGMA),
    },
    Operator {
        stage: Stage::Sharpen2,
        inputs: &[Adjustment::Sharpen2],
        apply: |img, p| crate::sharpen::sharpen(img, p.get(Adjustment::Sharpen2), SHARPEN2_SIGMA),
    },
];

/// Render `original` with `params`.
///
/// Deterministic and side-effect free: identical inputs always produce
/// byte-identical output, and the original is never modified.
///
/// # Errors
///
/// Returns [`PipelineError::Render`] if an operator fails internally.
pub fn render(
    original: &OriginalImage,
    params: &ParameterVector,
) -> Result<RenderedImage, PipelineError> {
    render_with_diagnostics(original, params, &NoClock).map(|(image, _)| image)
}

/// Render `original` with `params`, timing each stage with `clock`.
///
/// The pipeline never reads a clock itself; native callers pass one
/// backed by `std::time::Instant`.
///
/// # Errors
///
/// Returns [`PipelineError::Render`] if an operator fails internally.
pub fn render_with_diagnostics<C: Clock>(
    original: &OriginalImage,
    params: &ParameterVector,
    clock: &C,
) -> Result<(RenderedImage, RenderDiagnostics), PipelineError> {
    let start = clock.now();
    let mut stages = Vec::with_capacity(OPERATORS.len());
    let mut current: Cow<'_, RgbImage> = Cow::Borrowed(original.pixels());

    for op in &OPERATORS {
        if op.is_neutral(params) {
            stages.push(StageDiagnostics::skipped(op.stage));
            continue;
        }
        let stage_start = clock.now();
        current = Cow::Owned((op.apply)(&current, params)?);
        stages.push(StageDiagnostics::ran(
            op.stage,
            clock.elapsed(&stage_start),
        ));
    }

    let diagnostics = RenderDiagnostics {
        dimensions: original.dimensions(),
        stages,
        total_duration: clock.elapsed(&start),
    };
    Ok((RenderedImage::new(current.into_owned()), diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// A deterministic gradient with some texture in every channel.
    fn test_image() -> OriginalImage {
        OriginalImage::new(RgbImage::from_fn(24, 16, |x, y| {
            image::Rgb([
                u8::try_from((x * 10) % 256).unwrap(),
                u8::try_from((y * 15) % 256).unwrap(),
                u8::try_from(((x + y) * 7) % 256).unwrap(),
            ])
        }))
    }

    fn params(entries: &[(Adjustment, i32)]) -> ParameterVector {
        entries
            .iter()
            .fold(ParameterVector::default(), |p, (adj, v)| p.with(*adj, *v))
    }

    #[test]
    fn stages_are_in_canonical_order() {
        let order: Vec<Stage> = OPERATORS.iter().map(|op| op.stage).collect();
        assert_eq!(
            order,
            vec![
                Stage::Brightness,
                Stage::Contrast,
                Stage::Gamma,
                Stage::Levels,
                Stage::LocalContrast,
                Stage::Blur,
                Stage::ToneCurve,
                Stage::ShadowsHighlights,
                Stage::Sharpen1,
                Stage::Sharpen2,
            ]
        );
    }

    #[test]
    fn every_adjustment_feeds_exactly_one_operator() {
        for adj in Adjustment::ALL {
            let count = OPERATORS
                .iter()
                .filter(|op| op.inputs.contains(&adj))
                .count();
            assert_eq!(count, 1, "{adj} feeds {count} operators");
        }
    }

    #[test]
    fn default_vector_reproduces_source() {
        let original = test_image();
        let rendered = render(&original, &ParameterVector::default()).unwrap();
        assert_eq!(rendered.pixels(), original.pixels());
    }

    #[test]
    fn render_is_deterministic() {
        let original = test_image();
        let p = params(&[
            (Adjustment::Brightness, 15),
            (Adjustment::Contrast, 140),
            (Adjustment::LocalContrast, 6),
            (Adjustment::Blur, 5),
            (Adjustment::ToneCurve, 14),
            (Adjustment::Sharpen1, 120),
            (Adjustment::Sharpen2, 60),
        ]);
        let a = render(&original, &p).unwrap();
        let b = render(&original, &p).unwrap();
        assert_eq!(a.pixels().as_raw(), b.pixels().as_raw());
    }

    #[test]
    fn render_does_not_touch_original() {
        let original = test_image();
        let before = original.pixels().clone();
        render(&original, &params(&[(Adjustment::Brightness, 80)])).unwrap();
        assert_eq!(original.pixels(), &before);
    }

    #[test]
    fn clamped_values_render_identically() {
        let original = test_image();
        let mut over = ParameterVector::default();
        over.set(Adjustment::Brightness, 500);
        let at_max = params(&[(Adjustment::Brightness, 100)]);
        assert_eq!(
            render(&original, &over).unwrap(),
            render(&original, &at_max).unwrap()
        );
    }

    #[test]
    fn brightness_then_contrast_matches_manual_composition() {
        let original = test_image();
        let p = params(&[(Adjustment::Brightness, 10), (Adjustment::Contrast, 120)]);
        let rendered = render(&original, &p).unwrap();

        let manual = crate::tone::contrast(&crate::tone::brightness(original.pixels(), 10), 120);
        assert_eq!(rendered.pixels(), &manual);
    }

    #[test]
    fn order_matters_for_brightness_and_gamma() {
        let original = test_image();
        let p = params(&[(Adjustment::Brightness, 60), (Adjustment::Gamma, 40)]);
        let rendered = render(&original, &p).unwrap();

        let swapped = crate::tone::brightness(&crate::tone::gamma(original.pixels(), 40), 60);
        assert_ne!(rendered.pixels(), &swapped);
    }

    #[test]
    fn diagnostics_report_skipped_and_applied_stages() {
        struct FixedClock;
        impl Clock for FixedClock {
            type Instant = ();
            fn now(&self) {}
            fn elapsed(&self, _since: &()) -> std::time::Duration {
                std::time::Duration::from_millis(2)
            }
        }

        let original = test_image();
        let p = params(&[(Adjustment::Blur, 3), (Adjustment::Sharpen2, 50)]);
        let (_, diag) = render_with_diagnostics(&original, &p, &FixedClock).unwrap();

        assert_eq!(diag.stages.len(), OPERATORS.len());
        let applied: Vec<Stage> = diag.applied_stages().collect();
        assert_eq!(applied, vec![Stage::Blur, Stage::Sharpen2]);
        assert_eq!(diag.total_duration, std::time::Duration::from_millis(2));
        assert_eq!(diag.dimensions.width, 24);
    }
}
