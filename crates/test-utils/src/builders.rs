#![allow(dead_code)]

use catin::device::DeviceInfo;
use catin::engine::{Scheduler, SchedulerConfig};
use catin::task::{GroupSpec, Hooks, ResourceSpec, TaskSpec, TaskSubmission};
use catin::types::StrategyKind;

/// PID the test schedulers report for the daemon.
pub const TEST_DAEMON_PID: u32 = 4242;

/// Builder for `SchedulerConfig` to simplify test setup.
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig {
                cascade_cancel_on_failure: true,
                devices: Vec::new(),
                daemon_pid: TEST_DAEMON_PID,
            },
        }
    }

    pub fn device(mut self, id: u32, memory: u64) -> Self {
        self.config.devices.push(DeviceInfo { id, memory });
        self
    }

    pub fn cascade(mut self, val: bool) -> Self {
        self.config.cascade_cancel_on_failure = val;
        self
    }

    pub fn build(self) -> SchedulerConfig {
        self.config
    }

    /// Scheduler with a fixed name-generation seed.
    pub fn scheduler(self) -> Scheduler {
        Scheduler::with_seed(self.config, 7)
    }
}

impl Default for SchedulerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskSpec`.
pub struct TaskSpecBuilder {
    spec: TaskSpec,
}

impl TaskSpecBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            spec: TaskSpec::new(cmd),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.spec.name = Some(name.to_string());
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.spec.priority = priority;
        self
    }

    /// Make the task device-bound.
    pub fn devices(mut self, min_devices: u32, memory_per_device: u64) -> Self {
        let res = self.spec.resources.get_or_insert_with(ResourceSpec::default);
        res.min_devices = min_devices;
        res.requires_memory_per_device = memory_per_device;
        self
    }

    pub fn visible(mut self, ids: &[u32]) -> Self {
        let res = self.spec.resources.get_or_insert_with(ResourceSpec::default);
        res.visible_devices = Some(ids.to_vec());
        self
    }

    pub fn on_start(mut self, cmd: &str) -> Self {
        self.spec.hooks.on_start = Some(cmd.to_string());
        self
    }

    pub fn on_end(mut self, cmd: &str) -> Self {
        self.spec.hooks.on_end = Some(cmd.to_string());
        self
    }

    pub fn build(self) -> TaskSpec {
        self.spec
    }

    pub fn single(self) -> TaskSubmission {
        TaskSubmission::Single(self.spec)
    }
}

/// Plain named task.
pub fn named(name: &str) -> TaskSubmission {
    TaskSpecBuilder::new("true").name(name).single()
}

/// Sequential group of plain named tasks.
pub fn sequential(names: &[&str]) -> TaskSubmission {
    TaskSubmission::Group(GroupSpec {
        name: None,
        strategy: StrategyKind::Sequential,
        tasks: names
            .iter()
            .map(|n| TaskSpecBuilder::new("true").name(n).build())
            .collect(),
        edges: Vec::new(),
        hooks: Hooks::default(),
    })
}

/// Graph group of plain named tasks; `edges` are `(dependency, dependent)`
/// index pairs.
pub fn graph(names: &[&str], edges: &[(usize, usize)]) -> TaskSubmission {
    TaskSubmission::Group(GroupSpec {
        name: None,
        strategy: StrategyKind::Graph,
        tasks: names
            .iter()
            .map(|n| TaskSpecBuilder::new("true").name(n).build())
            .collect(),
        edges: edges.to_vec(),
        hooks: Hooks::default(),
    })
}
