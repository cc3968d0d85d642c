// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheLayout;
use crate::device::DeviceInfo;
use crate::engine::SchedulerConfig;
use crate::exec::SupervisorOptions;
use crate::types::StrategyKind;

/// Daemon settings as read from `settings.toml`.
///
/// ```toml
/// cascade_cancel_on_failure = true
/// kill_grace_period_ms = 3000
/// tick_interval_ms = 1000
/// device_env_var = "CUDA_VISIBLE_DEVICES"
/// detect_devices = true
///
/// [[device]]
/// id = 0
/// memory = 24576
///
/// [[device]]
/// id = 1
/// memory = 24576
/// ```
///
/// Every key is optional. Convert into [`Settings`] with `TryFrom`, which
/// validates and resolves the paths.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSettings {
    /// Catin home: logs and the socket live here.
    #[serde(default)]
    pub home: Option<PathBuf>,

    /// Daemon socket; `<home>/catin.sock` when absent.
    #[serde(default)]
    pub socket_path: Option<PathBuf>,

    #[serde(default = "default_cascade")]
    pub cascade_cancel_on_failure: bool,

    #[serde(default = "default_kill_grace_period_ms")]
    pub kill_grace_period_ms: u64,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_device_env_var")]
    pub device_env_var: String,

    /// Query `nvidia-smi` for the device table when no `[[device]]` is given.
    #[serde(default = "default_detect_devices")]
    pub detect_devices: bool,

    /// Device table from `[[device]]` entries.
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceInfo>,
}

fn default_cascade() -> bool {
    true
}

fn default_kill_grace_period_ms() -> u64 {
    3000
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_device_env_var() -> String {
    "CUDA_VISIBLE_DEVICES".to_string()
}

fn default_detect_devices() -> bool {
    true
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            home: None,
            socket_path: None,
            cascade_cancel_on_failure: default_cascade(),
            kill_grace_period_ms: default_kill_grace_period_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            device_env_var: default_device_env_var(),
            detect_devices: default_detect_devices(),
            devices: Vec::new(),
        }
    }
}

/// Validated daemon settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub home: PathBuf,
    pub socket_path: PathBuf,
    pub cascade_cancel_on_failure: bool,
    pub kill_grace: Duration,
    pub tick_interval: Duration,
    pub device_env_var: String,
    pub detect_devices: bool,
    pub devices: Vec<DeviceInfo>,
}

impl Settings {
    /// Whether the device table has to come from detection.
    pub fn wants_device_detection(&self) -> bool {
        self.detect_devices && self.devices.is_empty()
    }

    /// The immutable configuration the scheduler is built with.
    pub fn scheduler_config(&self, daemon_pid: u32) -> SchedulerConfig {
        SchedulerConfig {
            cascade_cancel_on_failure: self.cascade_cancel_on_failure,
            devices: self.devices.clone(),
            daemon_pid,
        }
    }

    pub fn supervisor_options(&self, daemon_pid: u32) -> SupervisorOptions {
        SupervisorOptions {
            daemon_pid,
            device_env_var: self.device_env_var.clone(),
            kill_grace: self.kill_grace,
        }
    }

    pub fn cache(&self) -> CacheLayout {
        CacheLayout::new(self.home.clone())
    }
}

/// A submission file as read from TOML.
///
/// ```toml
/// [group]
/// name = "sweep"
/// strategy = "graph"
/// on_end = "notify-send done"
///
/// [[task]]
/// name = "prep"
/// cmd = "python prep.py"
///
/// [[task]]
/// name = "train"
/// cmd = "python train.py"
/// after = ["prep"]
/// requires_memory_per_device = 8000
/// ```
///
/// Without a `[group]` section every task is submitted on its own.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSubmissionFile {
    #[serde(default)]
    pub group: Option<GroupSection>,

    #[serde(default)]
    pub task: Vec<TaskEntry>,
}

/// `[group]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default)]
    pub on_start: Option<String>,
    #[serde(default)]
    pub on_end: Option<String>,
}

/// `[[task]]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskEntry {
    #[serde(default)]
    pub name: Option<String>,

    pub cmd: String,

    /// Working directory, relative to the submission file's directory.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    #[serde(default)]
    pub priority: i64,

    /// Any of the three resource keys makes the task device-bound.
    #[serde(default)]
    pub visible_devices: Option<Vec<u32>>,
    #[serde(default)]
    pub requires_memory_per_device: Option<u64>,
    #[serde(default)]
    pub min_devices: Option<u32>,

    /// Names of tasks in the same file that must succeed first.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub on_start: Option<String>,
    #[serde(default)]
    pub on_end: Option<String>,
}

impl TaskEntry {
    pub fn is_device_bound(&self) -> bool {
        self.visible_devices.is_some()
            || self.requires_memory_per_device.is_some()
            || self.min_devices.is_some()
    }
}

/// A validated submission file.
#[derive(Debug, Clone)]
pub struct SubmissionFile {
    pub group: Option<GroupSection>,
    pub tasks: Vec<TaskEntry>,
}
