//! The editing service: upload, preview, commit, undo and download
//! against the single active session.
//!
//! All session state lives behind one mutex. Previews render outside
//! the lock and only take it to stamp the request and to publish the
//! result, so many previews can render in parallel. The render cache is
//! synchronized on its own and is consulted outside the lock too. Commits render
//! while holding the lock (usually a cache hit, since the same vector
//! was just previewed), which keeps commit and undo strictly ordered
//! with respect to each other.
//!
//! State is only written after a render has completed, so a poisoned
//! lock never guards a half-updated session and is simply recovered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use retouch_pipeline::{
    Clock, OriginalImage, ParameterVector, PipelineError, RenderedImage, codec,
    render_with_diagnostics,
};
use serde::{Deserialize, Serialize};

use crate::cache::RenderCache;
use crate::history::Snapshot;
use crate::session::{Session, UndoOutcome};

/// Default maximum decoded image size in pixels.
pub const DEFAULT_MAX_PIXELS: u64 = 40_000_000;

/// Default number of committed snapshots kept for undo.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Default number of renders cached per session.
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Tunables for an [`Editor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Uploads larger than this many pixels are rejected.
    pub max_pixels: u64,
    /// Undo depth; `0` keeps every commit.
    pub history_limit: usize,
    /// Render cache entries per session; `0` disables the cache.
    pub cache_capacity: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_pixels: DEFAULT_MAX_PIXELS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Errors returned by [`Editor`] operations.
///
/// A failed operation leaves the session exactly as it was.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// The uploaded bytes are not a usable image.
    #[error("could not decode upload: {0}")]
    Decode(#[source] PipelineError),

    /// No image has been uploaded yet.
    #[error("no active image; upload one first")]
    NoActiveSession,

    /// The pipeline failed unexpectedly.
    #[error("render failed: {0}")]
    Render(#[source] PipelineError),
}

/// A preview render and whether it became current.
#[derive(Debug, Clone)]
pub struct Preview {
    /// The render for the requested parameters.
    pub image: RenderedImage,
    /// Sequence number the request was stamped with.
    pub sequence: u64,
    /// `false` when a newer request (or a commit/undo) won the race.
    pub accepted: bool,
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Run the pipeline, logging per-stage timing at debug level.
fn render_timed(
    original: &OriginalImage,
    params: &ParameterVector,
) -> Result<RenderedImage, EditorError> {
    let (image, diagnostics) =
        render_with_diagnostics(original, params, &StdClock).map_err(EditorError::Render)?;
    tracing::debug!(
        width = diagnostics.dimensions.width,
        height = diagnostics.dimensions.height,
        stages = ?diagnostics.applied_stages().collect::<Vec<_>>(),
        total_ms = diagnostics.total_duration.as_secs_f64() * 1000.0,
        "rendered",
    );
    Ok(image)
}

/// A preview stamped at intake, waiting for its render.
struct PendingPreview {
    epoch: u64,
    sequence: u64,
    original: OriginalImage,
    cache: RenderCache,
}

/// Thread-safe editing service over one active session.
#[derive(Debug, Default)]
pub struct Editor {
    config: EditorConfig,
    session: Mutex<Option<Session>>,
    epochs: AtomicU64,
}

impl Editor {
    /// Editor with no active session.
    #[must_use]
    pub const fn new(config: EditorConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
            epochs: AtomicU64::new(0),
        }
    }

    /// The configuration this editor was built with.
    #[must_use]
    pub const fn config(&self) -> &EditorConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decode `bytes` and start a new session, replacing any existing
    /// one (and its history). Returns the default-vector render.
    ///
    /// # Errors
    ///
    /// [`EditorError::Decode`] if the bytes are not a supported image
    /// within the pixel limit; the previous session stays active.
    pub fn upload(&self, bytes: &[u8]) -> Result<RenderedImage, EditorError> {
        let original = codec::decode(bytes, self.config.max_pixels).map_err(EditorError::Decode)?;
        let baseline = render_timed(&original, &ParameterVector::default())?;
        let dimensions = original.dimensions();

        let epoch = {
            let mut guard = self.lock();
            let epoch = self.epochs.fetch_add(1, Ordering::Relaxed) + 1;
            *guard = Some(Session::new(
                epoch,
                original,
                baseline.clone(),
                self.config.history_limit,
                self.config.cache_capacity,
            ));
            epoch
        };

        tracing::info!(
            epoch,
            width = dimensions.width,
            height = dimensions.height,
            bytes = bytes.len(),
            "image uploaded",
        );
        Ok(baseline)
    }

    /// Render `params` and, unless a newer request has already been
    /// accepted, make it current.
    ///
    /// `sequence` is the client's request number; when absent one is
    /// issued. The render is returned either way; [`Preview::accepted`]
    /// says whether it was published.
    ///
    /// # Errors
    ///
    /// [`EditorError::NoActiveSession`] before the first upload,
    /// [`EditorError::Render`] if the pipeline fails.
    pub fn preview(
        &self,
        params: ParameterVector,
        sequence: Option<u64>,
    ) -> Result<Preview, EditorError> {
        let pending = self.stamp(sequence)?;
        let n = pending.sequence;

        let image = match pending.cache.get(&params) {
            Some(image) => {
                tracing::debug!(sequence = n, "preview cache hit");
                image
            }
            None => {
                let image = render_timed(&pending.original, &params)?;
                pending.cache.insert(params, image.clone());
                image
            }
        };

        let accepted = self.publish(
            &pending,
            Snapshot {
                params,
                image: image.clone(),
            },
        );

        if accepted {
            tracing::debug!(sequence = n, "preview accepted");
        } else {
            tracing::debug!(sequence = n, "preview superseded");
        }
        Ok(Preview {
            image,
            sequence: n,
            accepted,
        })
    }

    /// Issue a sequence number against the active session.
    fn stamp(&self, sequence: Option<u64>) -> Result<PendingPreview, EditorError> {
        let mut guard = self.lock();
        let session = guard.as_mut().ok_or(EditorError::NoActiveSession)?;
        Ok(PendingPreview {
            epoch: session.epoch,
            sequence: session.sequencer.issue(sequence),
            original: session.original.clone(),
            cache: session.cache.clone(),
        })
    }

    /// Make a finished preview current, unless a newer request won or
    /// the session it was stamped against has since been replaced.
    fn publish(&self, pending: &PendingPreview, snapshot: Snapshot) -> bool {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(session) if session.epoch == pending.epoch => {
                session.finish_preview(pending.sequence, snapshot)
            }
            _ => false,
        }
    }

    /// Render `params`, push it onto the history and make it current.
    ///
    /// # Errors
    ///
    /// [`EditorError::NoActiveSession`] before the first upload,
    /// [`EditorError::Render`] if the pipeline fails (history is left
    /// untouched).
    pub fn commit(&self, params: ParameterVector) -> Result<RenderedImage, EditorError> {
        let mut guard = self.lock();
        let session = guard.as_mut().ok_or(EditorError::NoActiveSession)?;

        let image = match session.cache.get(&params) {
            Some(image) => image,
            None => render_timed(&session.original, &params)?,
        };
        session.commit(Snapshot {
            params,
            image: image.clone(),
        });

        tracing::info!(
            epoch = session.epoch,
            depth = session.history.len(),
            changed = ?params.changed().collect::<Vec<_>>(),
            "committed",
        );
        Ok(image)
    }

    /// Step back one commit.
    ///
    /// # Errors
    ///
    /// [`EditorError::NoActiveSession`] before the first upload.
    pub fn undo(&self) -> Result<UndoOutcome, EditorError> {
        let mut guard = self.lock();
        let session = guard.as_mut().ok_or(EditorError::NoActiveSession)?;
        let outcome = session.undo();
        match &outcome {
            UndoOutcome::Restored(_) => {
                tracing::info!(depth = session.history.len(), "undo restored snapshot");
            }
            UndoOutcome::Empty => tracing::info!("undo: history empty"),
        }
        Ok(outcome)
    }

    /// The current render (last accepted preview, commit or undo).
    ///
    /// # Errors
    ///
    /// [`EditorError::NoActiveSession`] before the first upload.
    pub fn download(&self) -> Result<RenderedImage, EditorError> {
        let guard = self.lock();
        let session = guard.as_ref().ok_or(EditorError::NoActiveSession)?;
        Ok(session.current.image.clone())
    }

    /// Parameters of the current render.
    ///
    /// # Errors
    ///
    /// [`EditorError::NoActiveSession`] before the first upload.
    pub fn current_params(&self) -> Result<ParameterVector, EditorError> {
        let guard = self.lock();
        let session = guard.as_ref().ok_or(EditorError::NoActiveSession)?;
        Ok(session.current.params)
    }

    /// Number of undoable commits.
    ///
    /// # Errors
    ///
    /// [`EditorError::NoActiveSession`] before the first upload.
    pub fn history_len(&self) -> Result<usize, EditorError> {
        let guard = self.lock();
        let session = guard.as_ref().ok_or(EditorError::NoActiveSession)?;
        Ok(session.history.len())
    }
}
