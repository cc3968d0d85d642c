// src/exec/backend.rs

//! Pluggable process supervisor abstraction.
//!
//! The runtime talks to a `ProcessSupervisor` instead of spawning and
//! signalling processes itself. This makes it easy to swap in a fake
//! supervisor in tests while keeping the production implementation in
//! [`supervisor`](super::supervisor).
//!
//! - `RealSupervisor` spawns `sh -c` processes in their own process group,
//!   redirects their output into the cache directory and reaps them in
//!   background Tokio tasks that emit `ProcessExited` events.
//! - Tests can provide their own `ProcessSupervisor` that, for example,
//!   records which tasks were started and lets the test decide when they
//!   exit.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::Result;

use crate::engine::HookOwner;
use crate::task::TaskName;

/// Everything needed to launch the process of an admitted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub task: TaskName,
    pub cmd: String,
    pub cwd: Option<PathBuf>,
    /// Reserved devices for device-bound tasks; `None` leaves the child's
    /// device visibility untouched.
    pub devices: Option<Vec<u32>>,
}

impl LaunchRequest {
    /// Value of the device visibility variable, e.g. `"0,2"`.
    pub fn device_list(&self) -> Option<String> {
        self.devices.as_ref().map(|ids| {
            ids.iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",")
        })
    }
}

/// A spawned task process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    /// PID of the group leader; equal to the process group ID.
    pub pid: u32,
}

/// Result of delivering a signal to a task's process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Delivered,
    /// The process is gone. The exit code is known when the supervisor
    /// already reaped it, which lets the caller reconcile immediately.
    AlreadyExited(Option<i32>),
    /// The platform cannot deliver this signal (no process groups).
    Unsupported,
}

/// Trait abstracting how task processes are run and controlled.
///
/// Production code uses [`RealSupervisor`](super::RealSupervisor); tests can
/// provide their own implementation that doesn't spawn real processes.
pub trait ProcessSupervisor: Send {
    /// Spawn the process of an admitted task.
    fn start(
        &mut self,
        request: LaunchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessHandle>> + Send + '_>>;

    /// Pause the task's whole process group.
    fn signal_suspend(&mut self, task: &str) -> Result<SignalOutcome>;

    /// Continue the task's whole process group.
    fn signal_resume(&mut self, task: &str) -> Result<SignalOutcome>;

    /// Terminate the task's process group: immediately with `force`,
    /// otherwise gracefully with escalation after a grace period.
    fn signal_kill(&mut self, task: &str, force: bool) -> Result<SignalOutcome>;

    /// Non-blocking exit check of the process `pid` launched for `task`.
    ///
    /// Reports nothing when the task's current process is a different one.
    fn poll(&mut self, task: &str, pid: u32) -> Option<i32>;

    /// Forget the bookkeeping of process `pid` once its exit has been
    /// processed. A newer process started under the same name is kept.
    fn release(&mut self, task: &str, pid: u32);

    /// Run a hook command, detached.
    fn run_hook(&mut self, owner: &HookOwner, cmd: &str, cwd: Option<&Path>) -> Result<()>;

    /// Delete the log directory of a removed task. Process bookkeeping is
    /// left to `release`.
    fn discard_logs(&mut self, task: &str) -> Result<()>;

    /// Whether suspend/resume signals can be delivered on this platform.
    fn supports_suspend(&self) -> bool;
}
