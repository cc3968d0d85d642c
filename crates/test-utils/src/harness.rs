use catin::engine::{BatchReport, CoreCommand, Scheduler};
use catin::task::{TaskState, TaskSubmission};

/// Drives a `Scheduler` by hand: every `Start` it emits is "spawned" with a
/// fresh PID, and the test decides when processes exit.
pub struct Harness {
    pub sched: Scheduler,
    /// Every command drained so far, in order.
    pub commands: Vec<CoreCommand>,
    next_pid: u32,
}

impl Harness {
    pub fn new(sched: Scheduler) -> Self {
        Self {
            sched,
            commands: Vec::new(),
            next_pid: 100,
        }
    }

    pub fn create(&mut self, submissions: Vec<TaskSubmission>) -> BatchReport {
        let report = self.sched.create(submissions);
        self.drain();
        report
    }

    /// Run one scheduling pass; returns the tasks started by it.
    pub fn tick(&mut self) -> Vec<String> {
        self.sched.tick();
        self.drain()
    }

    /// Let the process of `task` exit with `code`, then tick.
    pub fn exit(&mut self, task: &str, code: i32) -> Vec<String> {
        let pid = self.pid(task);
        self.sched.process_exited(task, pid, code);
        self.tick()
    }

    pub fn pid(&self, task: &str) -> u32 {
        self.sched
            .task(task)
            .and_then(|t| t.pid)
            .unwrap_or_else(|| panic!("task {task} has no pid"))
    }

    pub fn state(&self, task: &str) -> TaskState {
        self.sched
            .state_of(task)
            .unwrap_or_else(|| panic!("task {task} is not registered"))
    }

    /// Take the scheduler's pending commands, recording starts.
    pub fn drain(&mut self) -> Vec<String> {
        let mut started = Vec::new();
        for command in self.sched.drain_commands() {
            if let CoreCommand::Start(request) = &command {
                self.next_pid += 1;
                self.sched.record_started(&request.task, self.next_pid);
                started.push(request.task.clone());
            }
            self.commands.push(command);
        }
        // record_started only queues commands for processes it rejects.
        self.commands.extend(self.sched.drain_commands());
        started
    }

    /// Hook commands issued so far.
    pub fn hooks(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::RunHook { cmd, .. } => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    /// Kill commands issued so far, as `(task, force)`.
    pub fn kills(&self) -> Vec<(String, bool)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::Kill { task, force } => Some((task.clone(), *force)),
                _ => None,
            })
            .collect()
    }
}
