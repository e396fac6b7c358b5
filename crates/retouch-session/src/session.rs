//! The state of one uploaded image.

use retouch_pipeline::{OriginalImage, ParameterVector, RenderedImage};

use crate::cache::RenderCache;
use crate::history::{History, Snapshot};
use crate::sequencer::Sequencer;

/// Result of an undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The previous committed snapshot is current again.
    Restored(Snapshot),
    /// Nothing left to undo. Current is back at the baseline render.
    Empty,
}

/// Original pixels plus everything derived from them.
///
/// The epoch identifies the upload so a render that started against an
/// earlier session can tell it has been replaced.
#[derive(Debug)]
pub struct Session {
    pub epoch: u64,
    pub original: OriginalImage,
    pub baseline: Snapshot,
    pub current: Snapshot,
    pub history: History,
    pub cache: RenderCache,
    pub sequencer: Sequencer,
}

impl Session {
    /// Fresh session whose baseline (and current) is `baseline_image`,
    /// the render of the default vector.
    pub fn new(
        epoch: u64,
        original: OriginalImage,
        baseline_image: RenderedImage,
        history_limit: usize,
        cache_capacity: usize,
    ) -> Self {
        let baseline = Snapshot {
            params: ParameterVector::default(),
            image: baseline_image,
        };
        let cache = RenderCache::new(cache_capacity);
        cache.insert(baseline.params, baseline.image.clone());
        Self {
            epoch,
            original,
            current: baseline.clone(),
            baseline,
            history: History::new(history_limit),
            cache,
            sequencer: Sequencer::default(),
        }
    }

    /// Publish a finished preview render. Returns whether it became
    /// current.
    pub fn finish_preview(&mut self, sequence: u64, snapshot: Snapshot) -> bool {
        if self.sequencer.try_accept(sequence) {
            self.current = snapshot;
            true
        } else {
            false
        }
    }

    /// Push `snapshot` onto the history and make it current.
    pub fn commit(&mut self, snapshot: Snapshot) {
        self.cache.insert(snapshot.params, snapshot.image.clone());
        self.history.push(snapshot.clone());
        self.current = snapshot;
        self.sequencer.supersede();
    }

    /// Pop the newest history entry.
    pub fn undo(&mut self) -> UndoOutcome {
        if self.history.pop().is_none() {
            return UndoOutcome::Empty;
        }
        self.sequencer.supersede();
        if let Some(top) = self.history.top() {
            self.current = top.clone();
            UndoOutcome::Restored(top.clone())
        } else {
            self.current = self.baseline.clone();
            UndoOutcome::Empty
        }
    }
}
