// src/task/spec.rs

//! Submission-side task description.
//!
//! This is the normalized form every client description (command line,
//! submission file, multirun expansion) is turned into before it crosses the
//! wire. The daemon validates it once in `create` and never looks at the
//! original description again.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{CatinError, Result};
use crate::types::StrategyKind;

/// A task as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Explicit name; generated by the daemon when absent.
    #[serde(default)]
    pub name: Option<String>,

    /// Shell command line, run through `sh -c`.
    pub cmd: String,

    /// Working directory for the command (the client's cwd by default).
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Higher runs first.
    #[serde(default)]
    pub priority: i64,

    /// Device requirements. `None` means a plain, device-free task.
    #[serde(default)]
    pub resources: Option<ResourceSpec>,

    #[serde(default)]
    pub hooks: Hooks,
}

impl TaskSpec {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            name: None,
            cmd: cmd.into(),
            cwd: None,
            priority: 0,
            resources: None,
            hooks: Hooks::default(),
        }
    }
}

/// Device requirements of a device-bound task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Devices the task may run on; `None` means every configured device.
    #[serde(default)]
    pub visible_devices: Option<Vec<u32>>,

    /// Memory needed on each assigned device, in MiB.
    #[serde(default)]
    pub requires_memory_per_device: u64,

    /// Number of devices to reserve.
    #[serde(default = "default_min_devices")]
    pub min_devices: u32,
}

fn default_min_devices() -> u32 {
    1
}

impl Default for ResourceSpec {
    fn default() -> Self {
        Self {
            visible_devices: None,
            requires_memory_per_device: 0,
            min_devices: default_min_devices(),
        }
    }
}

impl ResourceSpec {
    /// Structural checks that do not depend on the device table.
    pub fn validate(&self, task: &str) -> Result<()> {
        let invalid = |reason: String| CatinError::InvalidResourceSpec {
            task: task.to_string(),
            reason,
        };

        if self.min_devices == 0 {
            return Err(invalid("min_devices must be >= 1".to_string()));
        }

        if let Some(visible) = &self.visible_devices {
            if visible.is_empty() {
                return Err(invalid("visible_devices must not be empty".to_string()));
            }
            let unique: BTreeSet<u32> = visible.iter().copied().collect();
            if unique.len() != visible.len() {
                return Err(invalid(format!(
                    "visible_devices contains duplicates: {visible:?}"
                )));
            }
            if (self.min_devices as usize) > unique.len() {
                return Err(invalid(format!(
                    "min_devices ({}) exceeds the number of visible devices ({})",
                    self.min_devices,
                    unique.len()
                )));
            }
        }

        Ok(())
    }
}

/// Optional shell commands run around a task's or group's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hooks {
    #[serde(default)]
    pub on_start: Option<String>,
    #[serde(default)]
    pub on_end: Option<String>,
}

/// One unit of a `create` request: a standalone task or a whole group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskSubmission {
    Single(TaskSpec),
    Group(GroupSpec),
}

/// A group of tasks submitted together with an execution strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub strategy: StrategyKind,

    pub tasks: Vec<TaskSpec>,

    /// `(dependency, dependent)` pairs of indices into `tasks`. Only used by
    /// the `graph` strategy.
    #[serde(default)]
    pub edges: Vec<(usize, usize)>,

    #[serde(default)]
    pub hooks: Hooks,
}
