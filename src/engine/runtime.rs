// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::{ProcessSupervisor, SignalOutcome};
use crate::ipc::protocol::{Request, Response};

use super::core::{CoreEvent, CoreRuntime};
use super::{CoreCommand, RuntimeEvent, TaskName};

/// Drives the scheduler core in response to `RuntimeEvent`s and delegates
/// process work to a `ProcessSupervisor`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// scheduling semantics. This struct handles async IO: reading events from
/// channels, the periodic fallback tick, and talking to the supervisor.
pub struct Runtime<S: ProcessSupervisor> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    supervisor: S,
    tick_interval: Duration,
}

impl<S: ProcessSupervisor> fmt::Debug for Runtime<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

impl<S: ProcessSupervisor> Runtime<S> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        supervisor: S,
        tick_interval: Duration,
    ) -> Self {
        Self {
            core,
            event_rx,
            supervisor,
            tick_interval,
        }
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`, plus a periodic tick.
    /// - Feeds them into the core runtime.
    /// - Executes commands returned by the core (spawn, signal, hooks).
    /// - Replies to client requests once their commands have run.
    pub async fn run(mut self) -> Result<()> {
        info!("catin runtime started");
        if !self.supervisor.supports_suspend() {
            warn!("process group signals are unavailable; suspend and resume will be refused");
        }

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                maybe = self.event_rx.recv() => match maybe {
                    Some(e) => e,
                    None => {
                        info!("runtime event channel closed; exiting");
                        break;
                    }
                },
                _ = ticker.tick() => RuntimeEvent::Tick,
            };

            if !matches!(event, RuntimeEvent::Tick) {
                debug!(?event, "runtime received event");
            }

            if !self.handle_event(event).await? {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(())
    }

    /// Handle one runtime event. Returns whether the loop should continue.
    async fn handle_event(&mut self, event: RuntimeEvent) -> Result<bool> {
        match event {
            RuntimeEvent::Request { request, reply } => {
                if self.refuses(&request) {
                    if reply
                        .send(Response::error("suspend and resume are not supported on this platform"))
                        .is_err()
                    {
                        debug!("client went away before the response was sent");
                    }
                    return Ok(true);
                }
                let (response, keep_running) = self.drive(CoreEvent::Request(request)).await?;
                let response =
                    response.unwrap_or_else(|| Response::error("request produced no response"));
                if reply.send(response).is_err() {
                    debug!("client went away before the response was sent");
                }
                Ok(keep_running)
            }
            RuntimeEvent::ProcessExited { task, pid, code } => {
                let (_, keep_running) = self
                    .drive(CoreEvent::ProcessExited {
                        task: task.clone(),
                        pid,
                        code,
                    })
                    .await?;
                self.supervisor.release(&task, pid);
                Ok(keep_running)
            }
            RuntimeEvent::Tick => {
                for (task, pid, code) in self.poll_exits() {
                    self.drive(CoreEvent::ProcessExited {
                        task: task.clone(),
                        pid,
                        code,
                    })
                    .await?;
                    self.supervisor.release(&task, pid);
                }
                let (_, keep_running) = self.drive(CoreEvent::Tick).await?;
                Ok(keep_running)
            }
            RuntimeEvent::ShutdownRequested => {
                let (_, keep_running) = self.drive(CoreEvent::ShutdownRequested).await?;
                Ok(keep_running)
            }
        }
    }

    /// Requests the supervisor cannot carry out. They are answered here so
    /// the core never records a suspension that did not happen.
    fn refuses(&self, request: &Request) -> bool {
        matches!(request, Request::Suspend { .. } | Request::Resume { .. })
            && !self.supervisor.supports_suspend()
    }

    /// Fallback for missed reaper events: exits the supervisor has observed
    /// for tasks the core still believes to be running.
    fn poll_exits(&mut self) -> Vec<(TaskName, u32, i32)> {
        let live = self.core.scheduler().live_processes();
        let mut exits = Vec::new();

        for task in live {
            let pid = self.known_pid(&task);
            if let Some(code) = self.supervisor.poll(&task, pid) {
                debug!(task = %task, pid, code, "exit picked up by poll");
                exits.push((task, pid, code));
            }
        }

        exits
    }

    fn known_pid(&self, task: &str) -> u32 {
        self.core
            .scheduler()
            .task(task)
            .and_then(|t| t.pid)
            .unwrap_or(0)
    }

    /// Feed an event into the core and execute the resulting commands,
    /// including the follow-up events they produce.
    async fn drive(&mut self, event: CoreEvent) -> Result<(Option<Response>, bool)> {
        let step = self.core.step(event);
        let response = step.response;
        let mut keep_running = step.keep_running;
        let mut pending: VecDeque<CoreCommand> = step.commands.into();

        while let Some(command) = pending.pop_front() {
            for follow_up in self.execute_command(command).await? {
                let step = self.core.step(follow_up);
                keep_running &= step.keep_running;
                pending.extend(step.commands);
            }
        }

        Ok((response, keep_running))
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<Vec<CoreEvent>> {
        let follow_ups = match command {
            CoreCommand::Start(request) => {
                let task = request.task.clone();
                match self.supervisor.start(request).await {
                    Ok(handle) => vec![CoreEvent::ProcessStarted {
                        task,
                        pid: handle.pid,
                    }],
                    Err(err) => vec![CoreEvent::SpawnFailed {
                        task,
                        reason: format!("{err:#}"),
                    }],
                }
            }
            CoreCommand::Suspend { task } => {
                let outcome = self.supervisor.signal_suspend(&task);
                self.reconcile(task, "suspend", outcome)
            }
            CoreCommand::Resume { task } => {
                let outcome = self.supervisor.signal_resume(&task);
                self.reconcile(task, "resume", outcome)
            }
            CoreCommand::Kill { task, force } => {
                let outcome = self.supervisor.signal_kill(&task, force);
                self.reconcile(task, "kill", outcome)
            }
            CoreCommand::RunHook { owner, cmd, cwd } => {
                if let Err(err) = self.supervisor.run_hook(&owner, &cmd, cwd.as_deref()) {
                    warn!(?owner, error = %err, "failed to run hook");
                }
                Vec::new()
            }
            CoreCommand::DiscardLogs { task } => {
                if let Err(err) = self.supervisor.discard_logs(&task) {
                    warn!(task = %task, error = %err, "failed to discard task logs");
                }
                Vec::new()
            }
        };
        Ok(follow_ups)
    }

    /// Turn a signal outcome into follow-up events.
    ///
    /// Signalling a process that has already been reaped reports its exit
    /// right away instead of waiting for the next poll.
    fn reconcile(
        &mut self,
        task: TaskName,
        action: &str,
        outcome: anyhow::Result<SignalOutcome>,
    ) -> Vec<CoreEvent> {
        match outcome {
            Ok(SignalOutcome::Delivered) => Vec::new(),
            Ok(SignalOutcome::AlreadyExited(Some(code))) => {
                debug!(task = %task, action, code, "process already exited; reconciling");
                let pid = self.known_pid(&task);
                vec![CoreEvent::ProcessExited { task, pid, code }]
            }
            Ok(SignalOutcome::AlreadyExited(None)) => {
                debug!(task = %task, action, "no live process to signal");
                Vec::new()
            }
            Ok(SignalOutcome::Unsupported) => {
                warn!(task = %task, action, "process group signals are not supported on this platform");
                Vec::new()
            }
            Err(err) => {
                warn!(task = %task, action, error = %err, "failed to signal task process");
                Vec::new()
            }
        }
    }
}
