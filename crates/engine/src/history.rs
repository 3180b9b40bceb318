use std::collections::VecDeque;

use rowedit_core::record::Patch;

pub const DEFAULT_HISTORY_DEPTH: usize = 100;

/// Field-level undo/redo for one open draft.
/// Cleared with the draft; nothing survives a save or cancel.
#[derive(Debug, Clone)]
pub struct DraftHistory {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    max_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub patch: Patch,
    /// Restores the draft as it was before `patch`.
    pub inverse: Patch,
}

impl Default for DraftHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl DraftHistory {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth,
        }
    }

    /// Record a new user change. Invalidates redo.
    pub fn record(&mut self, patch: Patch, inverse: Patch) {
        self.push_undo(HistoryEntry { patch, inverse });
        self.redo_stack.clear();
    }

    pub fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo_stack.push_back(entry);
        // Enforce depth limit by dropping oldest entry
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }

    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.undo_stack.pop_back()
    }

    pub fn push_redo(&mut self, entry: HistoryEntry) {
        self.redo_stack.push_back(entry);
    }

    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo_stack.pop_back()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
}
