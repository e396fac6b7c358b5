//! Bounded render cache keyed by exact parameter vector.
//!
//! Backed by a [`moka::sync::Cache`], which is internally synchronized,
//! so lookups and inserts need no outer lock and a [`RenderCache`] can
//! be cloned cheaply into a render that runs outside the session lock.
//! When full, moka's TinyLFU policy decides which render to drop. A hit
//! returns the stored image without touching the pipeline. Renders of
//! the same vector are idempotent, so two concurrent misses both
//! rendering is harmless; the second insert just refreshes the entry.

use moka::sync::Cache;
use retouch_pipeline::{ParameterVector, RenderedImage};

/// Recently rendered vectors and their images.
///
/// Clones share the same underlying store.
#[derive(Debug, Clone)]
pub struct RenderCache {
    capacity: usize,
    entries: Option<Cache<ParameterVector, RenderedImage>>,
}

impl RenderCache {
    /// Empty cache holding at most `capacity` renders. A capacity of
    /// zero disables caching.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let entries = (capacity > 0).then(|| {
            Cache::builder()
                .max_capacity(u64::try_from(capacity).unwrap_or(u64::MAX))
                .build()
        });
        Self { capacity, entries }
    }

    /// The stored render for `params`, if any.
    #[must_use]
    pub fn get(&self, params: &ParameterVector) -> Option<RenderedImage> {
        self.entries.as_ref()?.get(params)
    }

    /// Store a render, evicting another entry when full.
    pub fn insert(&self, params: ParameterVector, image: RenderedImage) {
        if let Some(entries) = &self.entries {
            entries.insert(params, image);
        }
    }

    /// Number of cached renders, after any pending evictions have run.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.entries.as_ref().map_or(0, |entries| {
            entries.run_pending_tasks();
            entries.entry_count()
        })
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached renders.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
