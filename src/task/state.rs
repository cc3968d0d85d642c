// src/task/state.rs

//! Task state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a suspended task was suspended from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuspendedFrom {
    /// Not yet admitted; resuming re-enters the admission pool.
    Waiting,
    /// Admitted with a live, stopped process; resuming continues it.
    Running,
}

/// Lifecycle state of a task.
///
/// ```text
/// Waiting -> Running -> Succeeded | Failed
/// Waiting <-> Suspended(Waiting)
/// Running <-> Suspended(Running)
/// any non-terminal -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Waiting,
    Running,
    Suspended(SuspendedFrom),
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// Whether a task in this state must hold a device reservation
    /// (if it is device-bound at all).
    pub fn holds_reservation(self) -> bool {
        matches!(
            self,
            TaskState::Running | TaskState::Suspended(SuspendedFrom::Running)
        )
    }

    /// Whether an OS process is expected to be alive for this task.
    pub fn has_process(self) -> bool {
        self.holds_reservation()
    }

    /// Failed or cancelled: the state that makes dependents cascade.
    pub fn is_unsuccessful_end(self) -> bool {
        matches!(self, TaskState::Failed | TaskState::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Waiting => "waiting",
            TaskState::Running => "running",
            TaskState::Suspended(SuspendedFrom::Waiting) => "suspended (waiting)",
            TaskState::Suspended(SuspendedFrom::Running) => "suspended (running)",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
