use std::collections::VecDeque;

use crate::config::DEFAULT_UNDO_DEPTH;

use super::snapshot::Snapshot;

/// Bounded in-memory checkpoints; the oldest is dropped when full.
#[derive(Debug, Clone)]
pub struct UndoHistory {
    entries: VecDeque<Snapshot>,
    depth: usize,
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_DEPTH)
    }
}

impl UndoHistory {
    pub fn new(depth: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            depth: depth.max(1),
        }
    }

    pub fn set_depth(&mut self, depth: usize) {
        self.depth = depth.max(1);
        while self.entries.len() > self.depth {
            self.entries.pop_front();
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        if self.entries.len() == self.depth {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    pub fn pop(&mut self) -> Option<Snapshot> {
        self.entries.pop_back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
