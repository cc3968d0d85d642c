// src/config/validate.rs

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{RawSettings, RawSubmissionFile, Settings, SubmissionFile, TaskEntry};
use crate::errors::{CatinError, Result};
use crate::task::{GroupSpec, Hooks, ResourceSpec, TaskSpec, TaskSubmission};
use crate::types::StrategyKind;

/// Environment variable overriding the catin home directory.
pub const HOME_ENV: &str = "CATIN_HOME";

const SOCKET_FILE: &str = "catin.sock";

impl TryFrom<RawSettings> for Settings {
    type Error = CatinError;

    fn try_from(raw: RawSettings) -> std::result::Result<Self, Self::Error> {
        validate_settings(&raw)?;

        let home = match raw.home {
            Some(home) => home,
            None => default_home()?,
        };
        let socket_path = raw
            .socket_path
            .unwrap_or_else(|| home.join(SOCKET_FILE));

        Ok(Settings {
            home,
            socket_path,
            cascade_cancel_on_failure: raw.cascade_cancel_on_failure,
            kill_grace: Duration::from_millis(raw.kill_grace_period_ms),
            tick_interval: Duration::from_millis(raw.tick_interval_ms),
            device_env_var: raw.device_env_var,
            detect_devices: raw.detect_devices,
            devices: raw.devices,
        })
    }
}

/// `$CATIN_HOME`, or `~/.catin`.
pub fn default_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir()
        .map(|h| h.join(".catin"))
        .ok_or_else(|| {
            CatinError::ConfigError(format!(
                "cannot determine a home directory; set {HOME_ENV}"
            ))
        })
}

fn validate_settings(raw: &RawSettings) -> Result<()> {
    if raw.tick_interval_ms == 0 {
        return Err(CatinError::ConfigError(
            "tick_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if raw.device_env_var.trim().is_empty() || raw.device_env_var.contains('=') {
        return Err(CatinError::ConfigError(format!(
            "device_env_var is not a valid variable name: {:?}",
            raw.device_env_var
        )));
    }

    let mut seen = BTreeSet::new();
    for device in &raw.devices {
        if !seen.insert(device.id) {
            return Err(CatinError::ConfigError(format!(
                "device {} is listed more than once",
                device.id
            )));
        }
    }

    Ok(())
}

impl TryFrom<RawSubmissionFile> for SubmissionFile {
    type Error = CatinError;

    fn try_from(raw: RawSubmissionFile) -> std::result::Result<Self, Self::Error> {
        validate_submission(&raw)?;
        Ok(SubmissionFile {
            group: raw.group,
            tasks: raw.task,
        })
    }
}

fn validate_submission(raw: &RawSubmissionFile) -> Result<()> {
    ensure_has_tasks(raw)?;
    ensure_unique_names(raw)?;
    validate_task_dependencies(raw)?;
    validate_graph(raw)?;
    Ok(())
}

fn ensure_has_tasks(raw: &RawSubmissionFile) -> Result<()> {
    if raw.task.is_empty() {
        return Err(CatinError::ConfigError(
            "submission must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

fn ensure_unique_names(raw: &RawSubmissionFile) -> Result<()> {
    let mut seen = BTreeSet::new();
    for name in raw.task.iter().filter_map(|t| t.name.as_deref()) {
        if !seen.insert(name) {
            return Err(CatinError::NameConflict(name.to_string()));
        }
    }
    Ok(())
}

fn validate_task_dependencies(raw: &RawSubmissionFile) -> Result<()> {
    let names: BTreeSet<&str> = raw.task.iter().filter_map(|t| t.name.as_deref()).collect();
    let is_graph = raw
        .group
        .as_ref()
        .is_some_and(|g| g.strategy == StrategyKind::Graph);

    for (idx, task) in raw.task.iter().enumerate() {
        if task.after.is_empty() {
            continue;
        }
        let label = task.name.clone().unwrap_or_else(|| format!("#{idx}"));

        if !is_graph {
            return Err(CatinError::ConfigError(format!(
                "task '{label}' uses `after`, which requires a [group] with strategy = \"graph\""
            )));
        }

        for dep in &task.after {
            if task.name.as_deref() == Some(dep.as_str()) {
                return Err(CatinError::ConfigError(format!(
                    "task '{label}' cannot depend on itself in `after`"
                )));
            }
            if !names.contains(dep.as_str()) {
                return Err(CatinError::ConfigError(format!(
                    "task '{label}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_graph(raw: &RawSubmissionFile) -> Result<()> {
    // Edge direction: dep -> task. For
    //   [[task]]
    //   name = "B"
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in raw.task.iter().filter_map(|t| t.name.as_deref()) {
        graph.add_node(name);
    }
    for task in &raw.task {
        let Some(name) = task.name.as_deref() else {
            continue;
        };
        for dep in &task.after {
            graph.add_edge(dep.as_str(), name, ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(CatinError::GraphCycle(format!(
            "cycle detected in submission involving task '{}'",
            cycle.node_id()
        ))),
    }
}

impl SubmissionFile {
    /// Normalize into wire submissions.
    ///
    /// Relative `cwd` entries are resolved against `base_dir`, which is also
    /// the working directory of tasks without one.
    pub fn into_submissions(self, base_dir: &Path) -> Vec<TaskSubmission> {
        let Some(group) = self.group else {
            return self
                .tasks
                .iter()
                .map(|entry| TaskSubmission::Single(entry_to_spec(entry, base_dir)))
                .collect();
        };

        let index: HashMap<&str, usize> = self
            .tasks
            .iter()
            .enumerate()
            .filter_map(|(idx, t)| t.name.as_deref().map(|n| (n, idx)))
            .collect();

        let edges = match group.strategy {
            StrategyKind::Graph => self
                .tasks
                .iter()
                .enumerate()
                .flat_map(|(idx, t)| {
                    t.after
                        .iter()
                        .filter_map(|dep| index.get(dep.as_str()).map(|&d| (d, idx)))
                        .collect::<Vec<_>>()
                })
                .collect(),
            StrategyKind::Sequential => Vec::new(),
        };

        vec![TaskSubmission::Group(GroupSpec {
            name: group.name,
            strategy: group.strategy,
            tasks: self
                .tasks
                .iter()
                .map(|entry| entry_to_spec(entry, base_dir))
                .collect(),
            edges,
            hooks: Hooks {
                on_start: group.on_start,
                on_end: group.on_end,
            },
        })]
    }
}

fn entry_to_spec(entry: &TaskEntry, base_dir: &Path) -> TaskSpec {
    let resources = entry.is_device_bound().then(|| {
        let defaults = ResourceSpec::default();
        ResourceSpec {
            visible_devices: entry.visible_devices.clone(),
            requires_memory_per_device: entry
                .requires_memory_per_device
                .unwrap_or(defaults.requires_memory_per_device),
            min_devices: entry.min_devices.unwrap_or(defaults.min_devices),
        }
    });

    let cwd = match &entry.cwd {
        Some(cwd) => base_dir.join(cwd),
        None => base_dir.to_path_buf(),
    };

    TaskSpec {
        name: entry.name.clone(),
        cmd: entry.cmd.clone(),
        cwd: Some(cwd),
        priority: entry.priority,
        resources,
        hooks: Hooks {
            on_start: entry.on_start.clone(),
            on_end: entry.on_end.clone(),
        },
    }
}
