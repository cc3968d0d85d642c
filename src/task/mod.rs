// src/task/mod.rs

//! Task model shared by the scheduler core, the supervisor and the wire
//! protocol.
//!
//! - [`spec`] is what clients submit (`TaskSpec`, `ResourceSpec`, `Hooks`).
//! - [`state`] is the per-task state machine.
//! - [`name`] generates and validates task names.
//!
//! A [`Task`] is the registry entry the scheduler owns. It is built from a
//! `TaskSpec` once the submission has been validated, and never depends on
//! the original description format afterwards.

pub mod name;
pub mod spec;
pub mod state;

use chrono::{DateTime, Utc};

pub use name::{DAEMON_NAME, generate_name, validate_name};
pub use spec::{GroupSpec, Hooks, ResourceSpec, TaskSpec, TaskSubmission};
pub use state::{SuspendedFrom, TaskState};

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Identifier of a live task group inside the scheduler.
pub type GroupId = u64;

/// Closed capability set of a registered task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Plain command; admitted as soon as it is eligible.
    ShellCommand,
    /// Command that needs a device reservation before it may start.
    DeviceRequired(ResourceSpec),
}

/// A task as held in the scheduler registry.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: TaskName,
    pub cmd: String,
    pub cwd: Option<std::path::PathBuf>,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
    /// Submission sequence number; last tie-break after priority and age.
    pub seq: u64,
    pub kind: TaskKind,
    /// Set when the task was submitted as part of a group.
    pub group: Option<GroupId>,
    pub hooks: Hooks,

    pub state: TaskState,
    /// Devices reserved for this task; empty unless the task holds a reservation.
    pub devices: Vec<u32>,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Build a WAITING registry entry from an accepted spec.
    pub fn from_spec(
        name: TaskName,
        spec: &TaskSpec,
        group: Option<GroupId>,
        seq: u64,
    ) -> Self {
        let kind = match &spec.resources {
            Some(res) => TaskKind::DeviceRequired(res.clone()),
            None => TaskKind::ShellCommand,
        };

        Self {
            name,
            cmd: spec.cmd.clone(),
            cwd: spec.cwd.clone(),
            priority: spec.priority,
            created_at: Utc::now(),
            seq,
            kind,
            group,
            hooks: spec.hooks.clone(),
            state: TaskState::Waiting,
            devices: Vec::new(),
            pid: None,
            exit_code: None,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn resources(&self) -> Option<&ResourceSpec> {
        match &self.kind {
            TaskKind::DeviceRequired(res) => Some(res),
            TaskKind::ShellCommand => None,
        }
    }

    pub fn is_device_bound(&self) -> bool {
        matches!(self.kind, TaskKind::DeviceRequired(_))
    }
}
