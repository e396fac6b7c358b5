//! retouch-pipeline: Pure image adjustment pipeline (sans-IO).
//!
//! Turns an original image and a [`ParameterVector`] into rendered
//! pixels through a fixed sequence of operators:
//! brightness -> contrast -> gamma -> levels -> local contrast -> blur ->
//! tone curve -> shadows/highlights -> sharpen 1 -> sharpen 2.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and pixel buffers. Session state and transport live in
//! `retouch-session` and `retouch-server`.

pub mod blur;
pub mod codec;
pub mod diagnostics;
pub mod params;
pub mod pipeline;
pub mod sharpen;
pub mod tone;
pub mod types;

pub use codec::{DEFAULT_JPEG_QUALITY, OutputFormat, decode, encode};
pub use diagnostics::{Clock, NoClock, RenderDiagnostics, StageDiagnostics};
pub use params::{Adjustment, ParameterVector};
pub use pipeline::{OPERATORS, Operator, Stage, render, render_with_diagnostics};
pub use types::{Dimensions, OriginalImage, PipelineError, RenderedImage, RgbImage};
