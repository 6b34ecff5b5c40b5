//! Bounded FIFO buffer of finished runs.

use std::collections::VecDeque;

use syncwatch_core::run::Run;
use syncwatch_core::types::RunId;

/// Default number of finished runs kept in memory.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Ring buffer of terminal runs, oldest first.
///
/// Once full, every insertion evicts exactly the oldest entry.
#[derive(Debug)]
pub struct RunHistory {
    runs: VecDeque<Run>,
    capacity: usize,
}

impl RunHistory {
    /// A zero capacity is bumped to one so the most recent run is always
    /// retrievable.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            runs: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `run`, returning the evicted entry if the buffer was full.
    pub fn push(&mut self, run: Run) -> Option<Run> {
        let evicted = if self.runs.len() == self.capacity {
            self.runs.pop_front()
        } else {
            None
        };
        self.runs.push_back(run);
        evicted
    }

    pub fn get(&self, run_id: &RunId) -> Option<&Run> {
        self.runs.iter().rev().find(|r| r.id == *run_id)
    }

    /// The most recent `limit` runs (all when `None`), most-recent-last.
    pub fn recent(&self, limit: Option<usize>) -> Vec<Run> {
        let limit = limit.unwrap_or(self.capacity).min(self.runs.len());
        self.runs
            .iter()
            .skip(self.runs.len() - limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RunHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
