//! Linear undo stack of committed snapshots.

use std::collections::VecDeque;

use retouch_pipeline::{ParameterVector, RenderedImage};

/// A parameter vector together with its render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// The (clamped) parameters.
    pub params: ParameterVector,
    /// The pipeline output for `params`.
    pub image: RenderedImage,
}

/// A committed history entry.
pub type HistoryEntry = Snapshot;

/// LIFO of committed snapshots, optionally bounded.
///
/// When a bounded history is full, pushing drops the oldest entry. There
/// is no redo: popped entries are gone.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl History {
    /// Empty history keeping at most `limit` entries (`0` = unbounded).
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    /// Push an entry, returning the evicted oldest entry if the history
    /// was full.
    pub fn push(&mut self, entry: HistoryEntry) -> Option<HistoryEntry> {
        self.entries.push_back(entry);
        if self.limit > 0 && self.entries.len() > self.limit {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Remove and return the newest entry.
    pub fn pop(&mut self) -> Option<HistoryEntry> {
        self.entries.pop_back()
    }

    /// The newest entry.
    #[must_use]
    pub fn top(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured bound (`0` = unbounded).
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }
}
