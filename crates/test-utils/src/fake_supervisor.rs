use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use catin::engine::HookOwner;
use catin::exec::{LaunchRequest, ProcessHandle, ProcessSupervisor, SignalOutcome};

/// A signal the fake supervisor was asked to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeSignal {
    Suspend,
    Resume,
    Kill { force: bool },
}

/// Everything the fake supervisor observed, plus what the test scripted.
#[derive(Debug, Default)]
pub struct FakeState {
    pub started: Vec<LaunchRequest>,
    pub signals: Vec<(String, FakeSignal)>,
    pub hooks: Vec<(HookOwner, String)>,
    pub discarded: Vec<String>,
    /// `(task, pid)` of every released process.
    pub released: Vec<(String, u32)>,
    /// Tasks whose spawn should fail.
    pub fail_spawn: HashSet<String>,
    /// Pretend the platform has no stop/continue signals.
    pub suspend_unsupported: bool,
    /// `(pid, code)` reported by `poll` for processes the test finished.
    exits: HashMap<String, (u32, i32)>,
    live: HashMap<String, u32>,
    next_pid: u32,
}

/// Test-side handle onto the state of a [`FakeSupervisor`].
#[derive(Debug, Clone, Default)]
pub struct FakeHandle {
    state: Arc<Mutex<FakeState>>,
}

impl FakeHandle {
    pub fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Let the process of `task` exit with `code`; the runtime picks it up on
    /// its next tick.
    pub fn finish(&self, task: &str, code: i32) {
        let mut state = self.lock();
        if let Some(pid) = state.live.remove(task) {
            state.exits.insert(task.to_string(), (pid, code));
        }
    }

    pub fn fail_spawn_of(&self, task: &str) {
        self.lock().fail_spawn.insert(task.to_string());
    }

    pub fn disable_suspend(&self) {
        self.lock().suspend_unsupported = true;
    }

    pub fn was_released(&self, task: &str) -> bool {
        self.lock().released.iter().any(|(name, _)| name == task)
    }

    pub fn started_names(&self) -> Vec<String> {
        self.lock().started.iter().map(|r| r.task.clone()).collect()
    }

    pub fn is_live(&self, task: &str) -> bool {
        self.lock().live.contains_key(task)
    }

    pub fn pid_of(&self, task: &str) -> Option<u32> {
        self.lock().live.get(task).copied()
    }

    pub fn hook_commands(&self) -> Vec<String> {
        self.lock().hooks.iter().map(|(_, cmd)| cmd.clone()).collect()
    }
}

/// A fake supervisor that:
/// - records launches, signals, hooks and discarded logs
/// - hands out increasing PIDs without spawning anything
/// - reports exits only when the test finishes a process (or kills it).
#[derive(Debug, Default)]
pub struct FakeSupervisor {
    handle: FakeHandle,
}

impl FakeSupervisor {
    pub fn new() -> (Self, FakeHandle) {
        let handle = FakeHandle::default();
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }

    fn signal(&self, task: &str, signal: FakeSignal) -> SignalOutcome {
        let mut state = self.handle.lock();
        state.signals.push((task.to_string(), signal.clone()));

        if !state.live.contains_key(task) {
            return SignalOutcome::AlreadyExited(state.exits.get(task).map(|&(_, code)| code));
        }

        if let FakeSignal::Kill { force } = signal {
            if let Some(pid) = state.live.remove(task) {
                let code = if force { 128 + 9 } else { 128 + 15 };
                state.exits.insert(task.to_string(), (pid, code));
            }
        }
        SignalOutcome::Delivered
    }
}

impl ProcessSupervisor for FakeSupervisor {
    fn start(
        &mut self,
        request: LaunchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessHandle>> + Send + '_>> {
        let state = Arc::clone(&self.handle.state);

        Box::pin(async move {
            let mut state = state.lock().unwrap();
            if state.fail_spawn.contains(&request.task) {
                return Err(anyhow!("spawn of {} refused by test", request.task));
            }

            state.next_pid += 1;
            let pid = 1000 + state.next_pid;
            state.live.insert(request.task.clone(), pid);
            state.exits.remove(&request.task);
            state.started.push(request);
            Ok(ProcessHandle { pid })
        })
    }

    fn signal_suspend(&mut self, task: &str) -> Result<SignalOutcome> {
        Ok(self.signal(task, FakeSignal::Suspend))
    }

    fn signal_resume(&mut self, task: &str) -> Result<SignalOutcome> {
        Ok(self.signal(task, FakeSignal::Resume))
    }

    fn signal_kill(&mut self, task: &str, force: bool) -> Result<SignalOutcome> {
        Ok(self.signal(task, FakeSignal::Kill { force }))
    }

    fn poll(&mut self, task: &str, pid: u32) -> Option<i32> {
        match self.handle.lock().exits.get(task) {
            Some(&(exited, code)) if exited == pid => Some(code),
            _ => None,
        }
    }

    fn release(&mut self, task: &str, pid: u32) {
        let mut state = self.handle.lock();
        if state.exits.get(task).is_some_and(|&(exited, _)| exited == pid) {
            state.exits.remove(task);
        }
        state.released.push((task.to_string(), pid));
    }

    fn run_hook(&mut self, owner: &HookOwner, cmd: &str, _cwd: Option<&Path>) -> Result<()> {
        self.handle
            .lock()
            .hooks
            .push((owner.clone(), cmd.to_string()));
        Ok(())
    }

    fn discard_logs(&mut self, task: &str) -> Result<()> {
        self.handle.lock().discarded.push(task.to_string());
        Ok(())
    }

    fn supports_suspend(&self) -> bool {
        !self.handle.lock().suspend_unsupported
    }
}
