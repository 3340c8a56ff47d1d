//! Bounded linear undo/redo over cloned snapshots.
//!
//! Callers push the state *before* a mutation. Undo swaps the current state with the most
//! recent snapshot; a new push after an undo discards the redo branch.

use std::collections::VecDeque;

pub const DEFAULT_HISTORY_DEPTH: usize = 80;

#[derive(Debug, Clone)]
pub struct History<T> {
    past: VecDeque<T>,
    future: Vec<T>,
    limit: usize,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl<T> History<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Records `snapshot` as undoable and clears the redo stack. The oldest entry is dropped
    /// once the depth limit is reached.
    pub fn push(&mut self, snapshot: T) {
        if self.past.len() == self.limit {
            self.past.pop_front();
        }
        self.past.push_back(snapshot);
        self.future.clear();
    }

    /// Returns the state to restore, keeping `current` for redo.
    pub fn undo(&mut self, current: T) -> Option<T> {
        let previous = self.past.pop_back()?;
        self.future.push(current);
        Some(previous)
    }

    pub fn redo(&mut self, current: T) -> Option<T> {
        let next = self.future.pop()?;
        self.past.push_back(current);
        if self.past.len() > self.limit {
            self.past.pop_front();
        }
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}
