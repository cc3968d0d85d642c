// src/exec/supervisor.rs

//! Production process supervisor.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::cache::{CacheProvider, open_log_file};
use crate::engine::{HookOwner, RuntimeEvent};
use crate::exec::backend::{LaunchRequest, ProcessHandle, ProcessSupervisor, SignalOutcome};
use crate::exec::signal::{GROUP_SIGNALS_SUPPORTED, GroupSignal, exit_code, signal_group};
use crate::task::{DAEMON_NAME, TaskName};
use crate::types::LogStream;

/// Environment variable carrying the task name into the child.
pub const TASK_NAME_ENV: &str = "CATIN_TASK_NAME";

const HOOK_LOG: &str = "hooks.log";

/// Settings the supervisor needs from the daemon configuration.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub daemon_pid: u32,
    /// Variable the reserved device IDs are exposed through.
    pub device_env_var: String,
    /// Time between SIGTERM and SIGKILL on a graceful kill.
    pub kill_grace: Duration,
}

/// Internal handle for a supervised task process.
///
/// - `kill` asks the reaper to terminate the process group (`true` = force).
/// - `exit` is set by the reaper once the process has been waited on.
struct ActiveProcess {
    pid: u32,
    kill: mpsc::UnboundedSender<bool>,
    exit: watch::Receiver<Option<i32>>,
}

/// Supervisor spawning real OS processes.
///
/// Every task runs as `sh -c <cmd>` in its own process group, so signals
/// reach everything the command forks. One reaper Tokio task per process
/// waits for it and reports the exit as `RuntimeEvent::ProcessExited`.
pub struct RealSupervisor {
    cache: Arc<dyn CacheProvider>,
    options: SupervisorOptions,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    active: HashMap<TaskName, ActiveProcess>,
}

impl RealSupervisor {
    pub fn new(
        cache: Arc<dyn CacheProvider>,
        options: SupervisorOptions,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            cache,
            options,
            runtime_tx,
            active: HashMap::new(),
        }
    }

    fn spawn_process(&mut self, request: &LaunchRequest) -> Result<ProcessHandle> {
        let dir = self.cache.path_for(&request.task, self.options.daemon_pid);
        let stdout = open_log_file(&dir, LogStream::Stdout.file_name())?;
        let stderr = open_log_file(&dir, LogStream::Stderr.file_name())?;

        let mut cmd = shell_command(&request.cmd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .env(TASK_NAME_ENV, &request.task);

        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }
        if let Some(devices) = request.device_list() {
            cmd.env(&self.options.device_env_var, devices);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", request.task))?;
        let pid = child
            .id()
            .ok_or_else(|| anyhow!("process of task '{}' has no pid", request.task))?;

        info!(
            task = %request.task,
            pid,
            cmd = %request.cmd,
            devices = ?request.devices,
            "task process started"
        );

        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);

        tokio::spawn(reap(
            request.task.clone(),
            pid,
            child,
            kill_rx,
            exit_tx,
            self.runtime_tx.clone(),
            self.options.kill_grace,
        ));

        self.active.insert(
            request.task.clone(),
            ActiveProcess {
                pid,
                kill: kill_tx,
                exit: exit_rx,
            },
        );

        Ok(ProcessHandle { pid })
    }

    fn deliver(&mut self, task: &str, signal: GroupSignal) -> Result<SignalOutcome> {
        if !GROUP_SIGNALS_SUPPORTED {
            return Ok(SignalOutcome::Unsupported);
        }
        let Some(process) = self.active.get(task) else {
            return Ok(SignalOutcome::AlreadyExited(None));
        };
        if let Some(code) = *process.exit.borrow() {
            return Ok(SignalOutcome::AlreadyExited(Some(code)));
        }

        if signal_group(process.pid, signal)? {
            Ok(SignalOutcome::Delivered)
        } else {
            Ok(SignalOutcome::AlreadyExited(*process.exit.borrow()))
        }
    }

    fn hook_log_dir(&self, owner: &HookOwner) -> std::path::PathBuf {
        let dir_name = match owner {
            HookOwner::Task(task) => task.as_str(),
            HookOwner::Group(_) => DAEMON_NAME,
        };
        self.cache.path_for(dir_name, self.options.daemon_pid)
    }
}

impl ProcessSupervisor for RealSupervisor {
    fn start(
        &mut self,
        request: LaunchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessHandle>> + Send + '_>> {
        Box::pin(async move { self.spawn_process(&request) })
    }

    fn signal_suspend(&mut self, task: &str) -> Result<SignalOutcome> {
        self.deliver(task, GroupSignal::Stop)
    }

    fn signal_resume(&mut self, task: &str) -> Result<SignalOutcome> {
        self.deliver(task, GroupSignal::Continue)
    }

    fn signal_kill(&mut self, task: &str, force: bool) -> Result<SignalOutcome> {
        let Some(process) = self.active.get(task) else {
            return Ok(SignalOutcome::AlreadyExited(None));
        };
        if let Some(code) = *process.exit.borrow() {
            return Ok(SignalOutcome::AlreadyExited(Some(code)));
        }
        if process.kill.send(force).is_err() {
            return Ok(SignalOutcome::AlreadyExited(*process.exit.borrow()));
        }
        Ok(SignalOutcome::Delivered)
    }

    fn poll(&mut self, task: &str, pid: u32) -> Option<i32> {
        self.active
            .get(task)
            .filter(|p| p.pid == pid)
            .and_then(|p| *p.exit.borrow())
    }

    fn release(&mut self, task: &str, pid: u32) {
        match self.active.get(task) {
            Some(process) if process.pid == pid => {
                self.active.remove(task);
                debug!(task = %task, pid, "released process bookkeeping");
            }
            Some(process) => {
                debug!(task = %task, pid, current = process.pid, "stale release ignored");
            }
            None => {}
        }
    }

    fn run_hook(&mut self, owner: &HookOwner, cmd: &str, cwd: Option<&Path>) -> Result<()> {
        let dir = self.hook_log_dir(owner);
        let out = open_log_file(&dir, HOOK_LOG)?;
        let err = out.try_clone().context("duplicating hook log handle")?;

        let mut command = shell_command(cmd);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::from(err));
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }
        if let HookOwner::Task(task) = owner {
            command.env(TASK_NAME_ENV, task);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("spawning hook for {owner:?}"))?;

        let owner = owner.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => debug!(?owner, "hook finished"),
                Ok(status) => warn!(?owner, code = exit_code(status), "hook failed"),
                Err(e) => warn!(?owner, error = %e, "waiting for hook failed"),
            }
        });

        Ok(())
    }

    fn discard_logs(&mut self, task: &str) -> Result<()> {
        self.cache.remove(task, self.options.daemon_pid)
    }

    fn supports_suspend(&self) -> bool {
        GROUP_SIGNALS_SUPPORTED
    }
}

/// Build a shell command appropriate for the platform, in its own process
/// group.
fn shell_command(line: &str) -> Command {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(line);
        c
    };

    #[cfg(unix)]
    cmd.process_group(0);

    cmd
}

/// Wait for a task process and report its exit.
///
/// Kill requests arrive over `kill_rx`. A graceful kill sends SIGTERM (and
/// SIGCONT, so a stopped group can act on it) and escalates to SIGKILL once
/// `grace` has passed.
async fn reap(
    task: TaskName,
    pid: u32,
    mut child: Child,
    mut kill_rx: mpsc::UnboundedReceiver<bool>,
    exit_tx: watch::Sender<Option<i32>>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    grace: Duration,
) {
    let mut escalate_at: Option<Instant> = None;

    let code = loop {
        tokio::select! {
            status = child.wait() => {
                match status {
                    Ok(status) => break exit_code(status),
                    Err(e) => {
                        error!(task = %task, pid, error = %e, "waiting for task process failed");
                        break -1;
                    }
                }
            }

            Some(force) = kill_rx.recv() => {
                if force {
                    info!(task = %task, pid, "killing task process group");
                    send_or_warn(&task, pid, GroupSignal::Kill);
                    escalate_at = None;
                } else if escalate_at.is_none() {
                    info!(task = %task, pid, "terminating task process group");
                    send_or_warn(&task, pid, GroupSignal::Terminate);
                    send_or_warn(&task, pid, GroupSignal::Continue);
                    escalate_at = Some(Instant::now() + grace);
                }
            }

            _ = sleep_until(escalate_at.unwrap_or_else(Instant::now)), if escalate_at.is_some() => {
                warn!(task = %task, pid, "grace period elapsed; killing task process group");
                send_or_warn(&task, pid, GroupSignal::Kill);
                escalate_at = None;
            }
        }
    };

    info!(task = %task, pid, exit_code = code, "task process exited");
    exit_tx.send_replace(Some(code));

    if runtime_tx
        .send(RuntimeEvent::ProcessExited {
            task: task.clone(),
            pid,
            code,
        })
        .await
        .is_err()
    {
        debug!(task = %task, "runtime gone; exit not reported");
    }
}

fn send_or_warn(task: &str, pid: u32, signal: GroupSignal) {
    if let Err(e) = signal_group(pid, signal) {
        warn!(task = %task, pid, ?signal, error = %e, "failed to signal task process group");
    }
}
