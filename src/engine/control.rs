// src/engine/control.rs

//! Client control operations on the scheduler.
//!
//! Every operation takes an optional list of names (`None` meaning every
//! registered task) and sorts each target into exactly one of `success`,
//! `failure` or `no_op`. Unknown names are failures; a state change that is
//! already in effect is a no-op.

use tracing::info;

use crate::engine::{BatchReport, CoreCommand, Scheduler};
use crate::errors::{CatinError, Result};
use crate::task::{SuspendedFrom, TaskName, TaskState};

impl Scheduler {
    /// Resolve the targets of a control operation, reporting unknown names.
    fn targets(&self, names: Option<Vec<TaskName>>, report: &mut BatchReport) -> Vec<TaskName> {
        match names {
            None => self.task_names(),
            Some(names) => names
                .into_iter()
                .filter(|name| {
                    let known = self.tasks.contains_key(name);
                    if !known {
                        report.fail(name.clone(), CatinError::TaskNotFound(name.clone()));
                    }
                    known
                })
                .collect(),
        }
    }

    /// Pause tasks. Waiting tasks just leave the admission pool; running
    /// tasks are stopped and keep their devices.
    pub fn suspend(&mut self, names: Option<Vec<TaskName>>) -> BatchReport {
        let mut report = BatchReport::default();

        for name in self.targets(names, &mut report) {
            let Some(task) = self.tasks.get_mut(&name) else {
                continue;
            };
            match task.state {
                TaskState::Waiting => {
                    task.state = TaskState::Suspended(SuspendedFrom::Waiting);
                }
                TaskState::Running => {
                    task.state = TaskState::Suspended(SuspendedFrom::Running);
                    self.push_command(CoreCommand::Suspend { task: name.clone() });
                }
                _ => {
                    report.no_op.push(name);
                    continue;
                }
            }
            info!(task = %name, "task suspended");
            report.success.push(name);
        }

        report
    }

    /// Undo [`suspend`](Self::suspend). A task suspended while running
    /// continues on the devices it never gave back.
    pub fn resume(&mut self, names: Option<Vec<TaskName>>) -> BatchReport {
        let mut report = BatchReport::default();

        for name in self.targets(names, &mut report) {
            let Some(task) = self.tasks.get_mut(&name) else {
                continue;
            };
            match task.state {
                TaskState::Suspended(SuspendedFrom::Waiting) => {
                    task.state = TaskState::Waiting;
                }
                TaskState::Suspended(SuspendedFrom::Running) => {
                    task.state = TaskState::Running;
                    self.push_command(CoreCommand::Resume { task: name.clone() });
                }
                _ => {
                    report.no_op.push(name);
                    continue;
                }
            }
            info!(task = %name, "task resumed");
            report.success.push(name);
        }

        report
    }

    /// Cancel tasks, terminating their processes.
    ///
    /// Dependents are cascaded on the following tick exactly as if the task
    /// had failed.
    pub fn kill(&mut self, names: Option<Vec<TaskName>>, force: bool) -> BatchReport {
        let mut report = BatchReport::default();

        for name in self.targets(names, &mut report) {
            if self.cancel_task(&name, force) {
                info!(task = %name, force, "task killed");
                report.success.push(name);
            } else {
                report.no_op.push(name);
            }
        }

        report
    }

    /// Force-kill tasks that are still alive and drop them from the registry
    /// together with their logs.
    pub fn remove(&mut self, names: Option<Vec<TaskName>>) -> BatchReport {
        let mut report = BatchReport::default();

        for name in self.targets(names, &mut report) {
            self.cancel_task(&name, true);
            if self.forget(&name).is_some() {
                self.push_command(CoreCommand::DiscardLogs { task: name.clone() });
                info!(task = %name, "task removed");
                report.success.push(name);
            }
        }

        report
    }

    /// Liveness check.
    ///
    /// Without a name this reports the daemon's own PID. With a name it
    /// reports the task's PID while its process is alive and `None`
    /// otherwise.
    pub fn test(&self, name: Option<&str>) -> Result<Option<u32>> {
        let Some(name) = name else {
            return Ok(Some(self.config().daemon_pid));
        };

        let task = self
            .tasks
            .get(name)
            .ok_or_else(|| CatinError::TaskNotFound(name.to_string()))?;

        Ok(if task.state.has_process() {
            task.pid
        } else {
            None
        })
    }
}
