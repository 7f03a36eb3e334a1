use std::sync::Arc;

use mandelpan_core::Viewport;

use crate::buffer::RasterBuffer;

/// A published view: the viewport and the raster rendered for it.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub viewport: Viewport,
    pub raster: Arc<RasterBuffer>,
}

/// Undo stack of published views.
///
/// The bottom entry is the base view. It is never popped and never evicted,
/// so there is always something to return to once the first render has
/// completed.
#[derive(Debug)]
pub struct History {
    entries: Vec<HistoryEntry>,
    limit: usize,
}

impl History {
    pub const DEFAULT_LIMIT: usize = 64;

    /// Smallest limit that still leaves room above the base entry.
    pub const MIN_LIMIT: usize = 2;

    /// Create an empty history holding at most `limit` entries
    /// (at least [`MIN_LIMIT`](Self::MIN_LIMIT)).
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit: limit.max(Self::MIN_LIMIT),
        }
    }

    /// Append a view. Past the limit the oldest entry above the base goes.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
        if self.entries.len() > self.limit {
            self.entries.remove(1);
        }
    }

    /// Put `entry` in place of the top view, or make it the base if the
    /// history is empty.
    pub fn replace_top(&mut self, entry: HistoryEntry) {
        match self.entries.last_mut() {
            Some(top) => *top = entry,
            None => self.entries.push(entry),
        }
    }

    /// Drop the top view and return the one below it for redisplay.
    ///
    /// With one entry or none this does nothing and returns `None`.
    pub fn undo(&mut self) -> Option<HistoryEntry> {
        if self.entries.len() <= 1 {
            return None;
        }
        self.entries.pop();
        self.entries.last().cloned()
    }

    /// Clear everything and start over from `base`.
    pub fn reset(&mut self, base: HistoryEntry) {
        self.entries.clear();
        self.entries.push(base);
    }

    /// The view currently on top.
    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT)
    }
}
