//! retouch-session: Edit session state for the retouch engine.
//!
//! Wraps the pure pipeline in a stateful [`Editor`] that owns the single
//! active image and tracks the current render, a linear undo history, a
//! per-session render cache, and sequence numbers that keep late
//! preview renders from overwriting newer ones.

pub mod cache;
pub mod editor;
pub mod history;
pub mod sequencer;
mod session;

pub use cache::RenderCache;
pub use editor::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_HISTORY_LIMIT, DEFAULT_MAX_PIXELS, Editor, EditorConfig,
    EditorError, Preview, StdClock,
};
pub use history::{History, HistoryEntry, Snapshot};
pub use sequencer::Sequencer;
pub use session::UndoOutcome;
