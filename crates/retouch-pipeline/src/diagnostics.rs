//! Render diagnostics: per-stage timing for one pipeline run.
//!
//! The pipeline itself never reads the system clock. Callers that want
//! timings pass a [`Clock`]; [`crate::render`] uses [`NoClock`], which
//! reports zero for everything.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::Stage;
use crate::types::Dimensions;

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Capture the current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock that never advances.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Timing for one stage of a render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Which stage this is.
    pub stage: Stage,
    /// `true` when every input was at its neutral default.
    pub skipped: bool,
    /// Wall-clock duration (zero when skipped).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl StageDiagnostics {
    pub(crate) const fn skipped(stage: Stage) -> Self {
        Self {
            stage,
            skipped: true,
            duration: Duration::ZERO,
        }
    }

    pub(crate) const fn ran(stage: Stage, duration: Duration) -> Self {
        Self {
            stage,
            skipped: false,
            duration,
        }
    }
}

/// Diagnostics collected from a single render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderDiagnostics {
    /// Source image size.
    pub dimensions: Dimensions,
    /// One entry per operator, in pipeline order.
    pub stages: Vec<StageDiagnostics>,
    /// Wall-clock duration of the whole render.
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

impl RenderDiagnostics {
    /// Stages that actually ran, in order.
    pub fn applied_stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.stages.iter().filter(|s| !s.skipped).map(|s| s.stage)
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Render Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.dimensions.width,
            self.dimensions.height,
            self.dimensions.pixel_count(),
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!("{:<24} {:>10} {:>10}", "Stage", "Duration", "% Total"));
        lines.push("-".repeat(48));

        let total_ms = duration_ms(self.total_duration);
        for diag in &self.stages {
            let name = diag.stage.name();
            if diag.skipped {
                lines.push(format!("{name:<24} {:>10} {:>10}", "skipped", "-"));
                continue;
            }
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
