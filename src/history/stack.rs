//! Linear undo/redo history over full-state snapshots.

use crate::types::{HistoryView, Snapshot};

/// Ordered snapshots plus a current index.
///
/// Never empty: entry 0 is the state at store construction, and the index
/// always lies in `[0, len - 1]`. Only [`HistoryStack::push`] grows the
/// sequence; navigation just moves the index.
#[derive(Clone, Debug)]
pub struct HistoryStack {
    entries: Vec<Snapshot>,
    index: usize,
}

impl HistoryStack {
    /// Create a history seeded with the initial snapshot.
    pub fn new(initial: Snapshot) -> Self {
        Self {
            entries: vec![initial],
            index: 0,
        }
    }

    /// Record a new snapshot after the current index.
    ///
    /// Any redo tail is discarded first.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.entries.truncate(self.index + 1);
        self.entries.push(snapshot);
        self.index = self.entries.len() - 1;
    }

    /// Step back one snapshot. `None` at the start.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(&self.entries[self.index])
    }

    /// Step forward one snapshot. `None` at the tail.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(&self.entries[self.index])
    }

    /// Move to snapshot `index`. `None` if out of range.
    pub fn jump_to(&mut self, index: usize) -> Option<&Snapshot> {
        if index >= self.entries.len() {
            return None;
        }
        self.index = index;
        Some(&self.entries[index])
    }

    /// The snapshot at the current index.
    pub fn current(&self) -> &Snapshot {
        &self.entries[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn entries(&self) -> &[Snapshot] {
        &self.entries
    }

    /// Copy of the history for inspection.
    pub fn view(&self) -> HistoryView {
        HistoryView {
            entries: self.entries.iter().map(Snapshot::to_state).collect(),
            index: self.index,
        }
    }
}
