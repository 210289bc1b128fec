//! Pump state and status snapshots.

use serde::{Deserialize, Serialize};
use sp_core::{Error, SegmentIndex};

use crate::queue::FetchTask;

/// What the pump loop is doing.
///
/// `Halted` and an in-flight task are not mutually exclusive: a halt takes
/// effect once the current fetch and append finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpState {
    /// The loop is not running; it waits for `run`, `unhalt` or a seek.
    #[default]
    Idle,
    /// The loop is delivering segments.
    Running,
    /// Automatic advancement is suppressed until `unhalt` or a seek.
    Halted,
}

/// A task that failed and halted the pump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub index: SegmentIndex,
    pub code: String,
    pub error: String,
}

impl TaskFailure {
    pub fn new(index: SegmentIndex, error: &Error) -> Self {
        Self {
            index,
            code: error.code().to_string(),
            error: error.to_string(),
        }
    }
}

/// Point-in-time view of the pump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpStatus {
    pub state: PumpState,
    /// Index the next `enqueue_next` will queue.
    pub current_index: SegmentIndex,
    /// Queued indices, front first.
    pub queued: Vec<SegmentIndex>,
    /// Task currently being fetched or appended.
    pub in_flight: Option<FetchTask>,
    /// Seek generation; bumped by every seek.
    pub epoch: u64,
    /// Most recent failure, cleared by `unhalt` and seeks.
    pub last_failure: Option<TaskFailure>,
}

impl PumpStatus {
    pub fn is_halted(&self) -> bool {
        self.state == PumpState::Halted
    }
}
