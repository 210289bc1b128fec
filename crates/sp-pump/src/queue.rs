//! FIFO of pending fetch tasks.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use sp_core::SegmentIndex;

/// A not-yet-started fetch of one segment.
///
/// The index is captured when the task is queued, so later cursor movement
/// never changes what the task fetches. `epoch` records the seek generation
/// the task was queued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTask {
    pub index: SegmentIndex,
    pub epoch: u64,
}

impl FetchTask {
    pub fn new(index: SegmentIndex, epoch: u64) -> Self {
        Self { index, epoch }
    }
}

/// Ordered queue of fetch tasks. Tasks leave from the front.
#[derive(Debug, Clone, Default)]
pub struct TaskQueue {
    tasks: VecDeque<FetchTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: FetchTask) {
        self.tasks.push_back(task);
    }

    pub fn pop(&mut self) -> Option<FetchTask> {
        self.tasks.pop_front()
    }

    /// Discard every queued task, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let discarded = self.tasks.len();
        self.tasks.clear();
        discarded
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Queued indices, front first.
    pub fn indices(&self) -> Vec<SegmentIndex> {
        self.tasks.iter().map(|t| t.index).collect()
    }
}
