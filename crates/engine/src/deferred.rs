use std::collections::VecDeque;

use crate::session::FormHandle;

/// Work that runs after the current turn, once the host has laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deferred {
    /// Announce an opened form. Skipped if the form closed in the meantime.
    FormRendered(FormHandle),
    RestoreFocus { row_index: usize, col_index: usize },
}

#[derive(Debug, Clone, Default)]
pub struct DeferredQueue {
    tasks: VecDeque<Deferred>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: Deferred) {
        self.tasks.push_back(task);
    }

    pub fn pop(&mut self) -> Option<Deferred> {
        self.tasks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Deferred> {
        self.tasks.iter()
    }
}
