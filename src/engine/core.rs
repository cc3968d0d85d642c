// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`CoreEvent`]s and produces:
//! - an updated scheduler state
//! - an optional response for the client that sent a request
//! - a list of [`CoreCommand`]s describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels and the fallback timer
//! - executing commands through a `ProcessSupervisor`
//! - feeding spawn results and reconciled exits back in as events
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, filesystem, or processes.

use crate::engine::{CoreCommand, Scheduler, TaskName};
use crate::ipc::protocol::{Request, Response};
use crate::ipc::router::route_request;

/// Input of the pure core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// A decoded client request.
    Request(Request),
    /// The supervisor spawned an admitted task's process.
    ProcessStarted { task: TaskName, pid: u32 },
    /// The supervisor could not spawn an admitted task's process.
    SpawnFailed { task: TaskName, reason: String },
    /// A task process exited.
    ProcessExited { task: TaskName, pid: u32, code: i32 },
    /// Re-run admission without any other change.
    Tick,
    ShutdownRequested,
}

/// Decision returned by the core after handling a single [`CoreEvent`].
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Response for the client, set for `CoreEvent::Request` only.
    pub response: Option<Response>,
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Pure core runtime state.
///
/// This owns the scheduler. It has **no** channels, no Tokio types, and does
/// not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Handle a single event, then run a scheduling pass.
    ///
    /// Every event is a potential admission opportunity (a submission, an
    /// exit freeing devices, a resume), so `tick` always follows unless the
    /// core is shutting down.
    pub fn step(&mut self, event: CoreEvent) -> CoreStep {
        let mut response = None;
        let mut keep_running = true;

        match event {
            CoreEvent::Request(request) => {
                let routed = route_request(&mut self.scheduler, request);
                response = Some(routed.response);
                keep_running = !routed.exit;
            }
            CoreEvent::ProcessStarted { task, pid } => {
                self.scheduler.record_started(&task, pid);
            }
            CoreEvent::SpawnFailed { task, reason } => {
                self.scheduler.spawn_failed(&task, &reason);
            }
            CoreEvent::ProcessExited { task, pid, code } => {
                self.scheduler.process_exited(&task, pid, code);
            }
            CoreEvent::Tick => {}
            CoreEvent::ShutdownRequested => {
                keep_running = false;
            }
        }

        if keep_running {
            self.scheduler.tick();
        }

        CoreStep {
            response,
            commands: self.scheduler.drain_commands(),
            keep_running,
        }
    }
}
