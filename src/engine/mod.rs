// src/engine/mod.rs

//! Scheduling engine of the catin daemon.
//!
//! This module ties together:
//! - the task registry and state machine ([`scheduler`])
//! - the control operations clients can request ([`control`])
//! - the pure, synchronous core that turns events into commands ([`core`])
//! - the async IO shell that owns the event channel and the process
//!   supervisor ([`runtime`])
//!
//! All registry mutation happens inside the core, which is driven by exactly
//! one runtime loop. Client connections, process reapers and the periodic
//! fallback tick only ever *enqueue* [`RuntimeEvent`]s.

use std::path::PathBuf;

use tokio::sync::oneshot;

use crate::device::DeviceInfo;
use crate::exec::LaunchRequest;
use crate::ipc::protocol::{Request, Response};

pub use crate::task::TaskName;

/// Outcome of a task process for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(i32),
}

impl TaskOutcome {
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 {
            TaskOutcome::Success
        } else {
            TaskOutcome::Failed(code)
        }
    }
}

/// Immutable configuration handed to the scheduler at construction.
///
/// Nothing inside the control loop reads settings from anywhere else.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Cancel the dependents of a failed or cancelled task. When `false`
    /// those dependents stay blocked forever instead.
    pub cascade_cancel_on_failure: bool,
    /// Device table the allocator is built from.
    pub devices: Vec<DeviceInfo>,
    /// PID reported by `test()` without a task name.
    pub daemon_pid: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cascade_cancel_on_failure: true,
            devices: Vec::new(),
            daemon_pid: std::process::id(),
        }
    }
}

/// Per-task results of one client operation.
///
/// `no_op` is its own outcome: nothing needed to happen, and nothing went
/// wrong.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub success: Vec<TaskName>,
    pub failure: Vec<TaskName>,
    pub no_op: Vec<TaskName>,
    /// Human-readable explanations, one per failure or notable event.
    pub details: Vec<String>,
}

impl BatchReport {
    pub fn fail(&mut self, task: impl Into<TaskName>, reason: impl ToString) {
        self.failure.push(task.into());
        self.details.push(reason.to_string());
    }
}

/// Command produced by the pure core, to be executed by the IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Spawn the process of an admitted task.
    Start(LaunchRequest),
    /// Pause the process group of a running task.
    Suspend { task: TaskName },
    /// Continue the process group of a suspended task.
    Resume { task: TaskName },
    /// Terminate the process group of a task.
    Kill { task: TaskName, force: bool },
    /// Run a task or group hook command, detached.
    RunHook {
        owner: HookOwner,
        cmd: String,
        cwd: Option<PathBuf>,
    },
    /// Delete a removed task's log directory.
    DiscardLogs { task: TaskName },
}

/// Who a hook command belongs to; decides where its output is logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOwner {
    Task(TaskName),
    Group(String),
}

/// Events flowing into the runtime from clients, reapers and timers.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// A decoded client request and where to send its response.
    Request {
        request: Request,
        reply: oneshot::Sender<Response>,
    },
    /// A task process exited.
    ProcessExited {
        task: TaskName,
        pid: u32,
        code: i32,
    },
    /// Periodic fallback: poll live processes and re-run admission.
    Tick,
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod control;
pub mod core;
pub mod runtime;
pub mod scheduler;

pub use core::{CoreEvent, CoreRuntime, CoreStep};
pub use runtime::Runtime;
pub use scheduler::Scheduler;
