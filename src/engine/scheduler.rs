// src/engine/scheduler.rs

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info, warn};

use crate::dag::{ExecutionStrategy, TaskGraph, TaskGroup};
use crate::device::DeviceAllocator;
use crate::engine::{BatchReport, CoreCommand, HookOwner, SchedulerConfig, TaskOutcome};
use crate::errors::{CatinError, Result};
use crate::exec::LaunchRequest;
use crate::task::{
    DAEMON_NAME, GroupId, GroupSpec, Task, TaskName, TaskSpec, TaskState, TaskSubmission,
    generate_name, validate_name,
};
use crate::types::StrategyKind;

/// Scheduler owns the flat task registry, the live groups and the device
/// allocator.
///
/// It is responsible for:
/// - validating and registering submitted tasks (`create`)
/// - admitting eligible tasks in priority order (`tick`)
/// - reacting to process start / exit / spawn failure
/// - cascading failures through groups
/// - the client control operations (see `engine::control`)
///
/// It performs no IO. Everything the outside world has to do (spawn, signal,
/// run a hook, delete logs) is queued as a [`CoreCommand`] and collected with
/// [`Scheduler::drain_commands`].
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    pub(crate) tasks: HashMap<TaskName, Task>,
    pub(crate) groups: BTreeMap<GroupId, TaskGroup>,
    allocator: DeviceAllocator,
    next_seq: u64,
    next_group: GroupId,
    rng: StdRng,
    commands: Vec<CoreCommand>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic name generation, for tests.
    pub fn with_seed(config: SchedulerConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SchedulerConfig, rng: StdRng) -> Self {
        let allocator = DeviceAllocator::new(&config.devices);
        Self {
            config,
            tasks: HashMap::new(),
            groups: BTreeMap::new(),
            allocator,
            next_seq: 0,
            next_group: 0,
            rng,
            commands: Vec::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn allocator(&self) -> &DeviceAllocator {
        &self.allocator
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn state_of(&self, name: &str) -> Option<TaskState> {
        self.tasks.get(name).map(|t| t.state)
    }

    /// Registered task names in submission order.
    pub fn task_names(&self) -> Vec<TaskName> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        tasks.sort_by_key(|t| t.seq);
        tasks.into_iter().map(|t| t.name.clone()).collect()
    }

    /// Number of groups that still have non-terminal members.
    pub fn live_groups(&self) -> usize {
        self.groups.len()
    }

    /// Tasks for which an OS process is expected to be alive.
    pub fn live_processes(&self) -> Vec<TaskName> {
        let mut live: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.state.has_process())
            .collect();
        live.sort_by_key(|t| t.seq);
        live.into_iter().map(|t| t.name.clone()).collect()
    }

    /// Take the commands queued since the last call.
    pub fn drain_commands(&mut self) -> Vec<CoreCommand> {
        std::mem::take(&mut self.commands)
    }

    pub(crate) fn push_command(&mut self, command: CoreCommand) {
        self.commands.push(command);
    }

    // ---------------------------------------------------------------------
    // create
    // ---------------------------------------------------------------------

    /// Validate and register a batch of submissions as WAITING tasks.
    ///
    /// Each standalone task succeeds or fails on its own. A group is accepted
    /// or rejected as a whole; on rejection every member is reported in
    /// `failure`. Nothing is registered for a rejected submission.
    pub fn create(&mut self, submissions: Vec<TaskSubmission>) -> BatchReport {
        let mut report = BatchReport::default();

        for submission in submissions {
            match submission {
                TaskSubmission::Single(spec) => match self.accept_single(&spec) {
                    Ok(name) => {
                        info!(task = %name, "task created");
                        report.success.push(name);
                    }
                    Err((name, err)) => {
                        warn!(task = %name, error = %err, "task rejected");
                        report.fail(name, err);
                    }
                },
                TaskSubmission::Group(group) => match self.accept_group(group) {
                    Ok(names) => report.success.extend(names),
                    Err((names, errors)) => {
                        report.failure.extend(names);
                        report
                            .details
                            .extend(errors.into_iter().map(|e| e.to_string()));
                    }
                },
            }
        }

        report
    }

    /// Pick the name a spec will be registered under.
    ///
    /// Explicit names must be valid and unused; absent names are generated
    /// until they collide with nothing in the registry or in `pending`.
    fn resolve_name(
        &mut self,
        spec: &TaskSpec,
        pending: &HashSet<TaskName>,
    ) -> std::result::Result<TaskName, (TaskName, CatinError)> {
        match &spec.name {
            Some(name) => {
                if let Err(err) = validate_name(name) {
                    return Err((name.clone(), err));
                }
                if self.tasks.contains_key(name) || pending.contains(name) {
                    return Err((name.clone(), CatinError::NameConflict(name.clone())));
                }
                Ok(name.clone())
            }
            None => Ok(generate_name(&mut self.rng, |candidate| {
                candidate == DAEMON_NAME
                    || self.tasks.contains_key(candidate)
                    || pending.contains(candidate)
            })),
        }
    }

    /// Structural and capacity checks that depend on nothing but the `TaskSpec` and
    /// the static device table.
    fn validate_spec(&self, name: &str, spec: &TaskSpec) -> Result<()> {
        if spec.cmd.trim().is_empty() {
            return Err(CatinError::ConfigError(format!(
                "task {name} has an empty command"
            )));
        }
        if let Some(res) = &spec.resources {
            res.validate(name)?;
            self.allocator
                .check_feasible(res)
                .map_err(|reason| CatinError::AllocationInfeasible {
                    task: name.to_string(),
                    reason,
                })?;
        }
        Ok(())
    }

    fn accept_single(
        &mut self,
        spec: &TaskSpec,
    ) -> std::result::Result<TaskName, (TaskName, CatinError)> {
        let name = self.resolve_name(spec, &HashSet::new())?;
        self.validate_spec(&name, spec)
            .map_err(|err| (name.clone(), err))?;

        self.register(name.clone(), spec, None);
        Ok(name)
    }

    fn accept_group(
        &mut self,
        group: GroupSpec,
    ) -> std::result::Result<Vec<TaskName>, (Vec<TaskName>, Vec<CatinError>)> {
        let mut names = Vec::with_capacity(group.tasks.len());
        let mut pending = HashSet::new();
        let mut errors = Vec::new();

        for spec in &group.tasks {
            let name = match self.resolve_name(spec, &pending) {
                Ok(name) => name,
                Err((name, err)) => {
                    errors.push(err);
                    names.push(name);
                    continue;
                }
            };
            if let Err(err) = self.validate_spec(&name, spec) {
                errors.push(err);
            }
            pending.insert(name.clone());
            names.push(name);
        }

        let id = self.next_group;
        let group_name = group
            .name
            .clone()
            .unwrap_or_else(|| format!("group-{id}"));

        if group.tasks.is_empty() {
            errors.push(CatinError::ConfigError(format!(
                "group {group_name} has no tasks"
            )));
        }

        let strategy = match group.strategy {
            StrategyKind::Sequential => ExecutionStrategy::Sequential,
            StrategyKind::Graph => match TaskGraph::new(names.clone(), &group.edges) {
                Ok(graph) => ExecutionStrategy::Graph(graph),
                Err(err) => {
                    errors.push(err);
                    ExecutionStrategy::Sequential
                }
            },
        };

        if !errors.is_empty() {
            warn!(group = %group_name, errors = errors.len(), "group rejected");
            if names.is_empty() {
                names.push(group_name);
            }
            return Err((names, errors));
        }

        self.next_group += 1;
        for (name, spec) in names.iter().zip(&group.tasks) {
            self.register(name.clone(), spec, Some(id));
        }

        let mut task_group = TaskGroup::new(
            id,
            group_name.clone(),
            names.clone(),
            strategy,
            group.hooks,
        );
        task_group.cwd = group.tasks.first().and_then(|t| t.cwd.clone());
        self.groups.insert(id, task_group);

        info!(group = %group_name, tasks = ?names, "group created");
        Ok(names)
    }

    fn register(&mut self, name: TaskName, spec: &TaskSpec, group: Option<GroupId>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let task = Task::from_spec(name.clone(), spec, group, seq);
        self.tasks.insert(name, task);
    }

    // ---------------------------------------------------------------------
    // tick / admission
    // ---------------------------------------------------------------------

    /// One scheduling pass: cascade, admit, and retire finished groups.
    ///
    /// Admission never blocks on a task that cannot get its devices yet;
    /// the next candidate is tried instead. Only a sequential group keeps
    /// its later members back, because they are never eligible.
    pub fn tick(&mut self) {
        if self.config.cascade_cancel_on_failure {
            self.cascade();
        }

        let mut eligible: Vec<TaskName> = self
            .tasks
            .values()
            .filter(|t| t.group.is_none() && t.state == TaskState::Waiting)
            .map(|t| t.name.clone())
            .collect();
        for group in self.groups.values() {
            eligible.extend(group.eligible(&self.tasks));
        }

        eligible.sort_by_key(|name| {
            let task = &self.tasks[name];
            (Reverse(task.priority), task.created_at, task.seq)
        });

        for name in eligible {
            self.try_admit(&name);
        }

        self.finish_groups();
    }

    fn cascade(&mut self) {
        let targets: Vec<TaskName> = self
            .groups
            .values()
            .flat_map(|group| group.cascade_targets(&self.tasks))
            .collect();

        for name in targets {
            info!(task = %name, "cancelling task: a task it depends on did not succeed");
            self.cancel_task(&name, true);
        }
    }

    /// Admit a WAITING task if its devices can be reserved.
    fn try_admit(&mut self, name: &str) -> bool {
        let Some(task) = self.tasks.get(name) else {
            return false;
        };
        if task.state != TaskState::Waiting {
            return false;
        }

        let devices = match task.resources().cloned() {
            Some(spec) => match self.allocator.try_reserve_for(name, &spec) {
                Some(devices) => Some(devices),
                None => {
                    debug!(task = %name, "not enough free device memory; task stays waiting");
                    return false;
                }
            },
            None => None,
        };

        let group_id = task.group;
        if let Some(group) = group_id.and_then(|id| self.groups.get_mut(&id)) {
            if !group.started {
                group.started = true;
                if let Some(cmd) = group.hooks.on_start.clone() {
                    self.commands.push(CoreCommand::RunHook {
                        owner: HookOwner::Group(group.name.clone()),
                        cmd,
                        cwd: group.cwd.clone(),
                    });
                }
            }
        }

        let Some(task) = self.tasks.get_mut(name) else {
            return false;
        };
        task.state = TaskState::Running;
        task.started_at = Some(Utc::now());
        task.devices = devices.clone().unwrap_or_default();

        if let Some(cmd) = task.hooks.on_start.clone() {
            self.commands.push(CoreCommand::RunHook {
                owner: HookOwner::Task(task.name.clone()),
                cmd,
                cwd: task.cwd.clone(),
            });
        }

        info!(task = %name, devices = ?task.devices, "admitting task");
        self.commands.push(CoreCommand::Start(LaunchRequest {
            task: task.name.clone(),
            cmd: task.cmd.clone(),
            cwd: task.cwd.clone(),
            devices,
        }));
        true
    }

    /// Run the on-end hook of every group whose members are all terminal and
    /// drop the group.
    fn finish_groups(&mut self) {
        let done: Vec<GroupId> = self
            .groups
            .values()
            .filter(|g| g.all_terminal(&self.tasks))
            .map(|g| g.id)
            .collect();

        for id in done {
            let Some(group) = self.groups.remove(&id) else {
                continue;
            };
            info!(group = %group.name, "all group members finished");
            if let Some(cmd) = group.hooks.on_end {
                self.commands.push(CoreCommand::RunHook {
                    owner: HookOwner::Group(group.name),
                    cmd,
                    cwd: group.cwd,
                });
            }
        }
    }

    // ---------------------------------------------------------------------
    // process events
    // ---------------------------------------------------------------------

    /// The supervisor spawned the process of an admitted task.
    pub fn record_started(&mut self, name: &str, pid: u32) {
        let Some(task) = self.tasks.get_mut(name) else {
            warn!(task = %name, pid, "process started for an unknown task; killing it");
            self.commands.push(CoreCommand::Kill {
                task: name.to_string(),
                force: true,
            });
            return;
        };

        if !task.state.has_process() {
            warn!(task = %name, pid, state = %task.state, "process started for a task that no longer runs; killing it");
            self.commands.push(CoreCommand::Kill {
                task: name.to_string(),
                force: true,
            });
            return;
        }

        debug!(task = %name, pid, "process started");
        task.pid = Some(pid);
    }

    /// The supervisor could not spawn the process of an admitted task.
    pub fn spawn_failed(&mut self, name: &str, reason: &str) {
        let err = CatinError::ProcessSpawnFailure {
            task: name.to_string(),
            reason: reason.to_string(),
        };
        error!(task = %name, error = %err, "marking task as failed");

        if self
            .tasks
            .get(name)
            .is_some_and(|t| t.state.has_process())
        {
            self.finish(name, TaskState::Failed);
        }
    }

    /// A task's process exited with `code`.
    ///
    /// Exits of processes the scheduler no longer tracks as running (killed,
    /// removed, or a stale PID) only record the exit code.
    pub fn process_exited(&mut self, name: &str, pid: u32, code: i32) {
        let Some(task) = self.tasks.get_mut(name) else {
            debug!(task = %name, pid, code, "exit of a removed task ignored");
            return;
        };

        if task.pid.is_some_and(|known| known != pid) {
            debug!(task = %name, pid, "exit of a stale process ignored");
            return;
        }

        if !task.state.has_process() {
            if task.exit_code.is_none() {
                task.exit_code = Some(code);
            }
            debug!(task = %name, pid, code, state = %task.state, "process exit after state change");
            return;
        }

        task.exit_code = Some(code);
        let state = match TaskOutcome::from_exit_code(code) {
            TaskOutcome::Success => {
                info!(task = %name, "task succeeded");
                TaskState::Succeeded
            }
            TaskOutcome::Failed(code) => {
                warn!(task = %name, code, "task failed");
                TaskState::Failed
            }
        };

        let on_end = task.hooks.on_end.clone();
        let cwd = task.cwd.clone();
        self.finish(name, state);

        if let Some(cmd) = on_end {
            self.commands.push(CoreCommand::RunHook {
                owner: HookOwner::Task(name.to_string()),
                cmd,
                cwd,
            });
        }
    }

    // ---------------------------------------------------------------------
    // transitions shared with the control operations
    // ---------------------------------------------------------------------

    /// Move a task into a terminal state, releasing its reservation.
    pub(crate) fn finish(&mut self, name: &str, state: TaskState) {
        debug_assert!(state.is_terminal());
        if let Some(task) = self.tasks.get_mut(name) {
            task.state = state;
            task.ended_at = Some(Utc::now());
            task.devices.clear();
        }
        self.allocator.release(name);
    }

    /// Cancel a non-terminal task, killing its process if it has one.
    ///
    /// The task's on-end hook runs only for a graceful kill of a task that
    /// was actually started. Returns `false` for terminal or unknown tasks.
    pub(crate) fn cancel_task(&mut self, name: &str, force: bool) -> bool {
        let Some(task) = self.tasks.get(name) else {
            return false;
        };
        if task.state.is_terminal() {
            return false;
        }

        let had_process = task.state.has_process();
        let on_end = task.hooks.on_end.clone();
        let cwd = task.cwd.clone();

        if had_process {
            self.commands.push(CoreCommand::Kill {
                task: name.to_string(),
                force,
            });
        }
        self.finish(name, TaskState::Cancelled);

        if had_process && !force {
            if let Some(cmd) = on_end {
                self.commands.push(CoreCommand::RunHook {
                    owner: HookOwner::Task(name.to_string()),
                    cmd,
                    cwd,
                });
            }
        }
        true
    }

    /// Drop a task from the registry, remembering its final state in its
    /// group so ordering and cascade decisions stay stable.
    pub(crate) fn forget(&mut self, name: &str) -> Option<Task> {
        let task = self.tasks.remove(name)?;
        if let Some(group) = task.group.and_then(|id| self.groups.get_mut(&id)) {
            group.retire(name, task.state);
        }
        self.allocator.release(name);
        Some(task)
    }

    // ---------------------------------------------------------------------
    // invariants
    // ---------------------------------------------------------------------

    /// Check the reservation invariants; `Err` describes the first violation.
    ///
    /// - a task holds a reservation iff it is device-bound and RUNNING or
    ///   suspended from RUNNING
    /// - reserved memory never exceeds capacity on any device
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        for task in self.tasks.values() {
            let expected = task.is_device_bound() && task.state.holds_reservation();
            let holds = self.allocator.holds(&task.name);
            if expected != holds {
                return Err(format!(
                    "task {} in state {} {} a reservation",
                    task.name,
                    task.state,
                    if holds { "holds" } else { "does not hold" }
                ));
            }
            if holds && self.allocator.devices_of(&task.name) != Some(task.devices.as_slice()) {
                return Err(format!(
                    "task {} records devices {:?} that differ from its reservation",
                    task.name, task.devices
                ));
            }
        }

        for id in self.allocator.device_ids() {
            let reserved = self.allocator.reserved(id).unwrap_or(0);
            let capacity = self.allocator.capacity(id).unwrap_or(0);
            if reserved > capacity {
                return Err(format!(
                    "device {id} has {reserved} MiB reserved but only {capacity} MiB capacity"
                ));
            }
        }

        Ok(())
    }
}
