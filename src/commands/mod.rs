// src/commands/mod.rs

//! Client-side implementations of the `meow` subcommands.
//!
//! Each command returns `Ok(true)` when the daemon reported full success;
//! `main` turns `Ok(false)` into a non-zero exit status. `set` and `clean`
//! work on local files and do not start a daemon.

pub mod clean;
pub mod control;
pub mod create;
pub mod magic;
pub mod multirun;
pub mod settings;
pub mod watch;

use std::path::PathBuf;
use std::time::Duration;

use crate::config::Settings;
use crate::errors::Result;
use crate::ipc::{Client, Response, ensure_daemon};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DAEMON_STARTUP_WAIT: Duration = Duration::from_secs(10);

/// What every client command needs.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub settings: Settings,
    /// Explicit `--settings` path, forwarded to an auto-started daemon.
    pub settings_path: Option<PathBuf>,
    pub client: Client,
}

impl ClientContext {
    pub fn new(settings: Settings, settings_path: Option<PathBuf>) -> Self {
        let client = Client::new(settings.socket_path.clone(), REQUEST_TIMEOUT);
        Self {
            settings,
            settings_path,
            client,
        }
    }

    /// Daemon PID, starting the daemon first if none answers.
    pub async fn ensure_daemon(&self) -> Result<u32> {
        ensure_daemon(
            &self.client,
            self.settings_path.as_deref(),
            DAEMON_STARTUP_WAIT,
        )
        .await
    }
}

/// How to describe each outcome of a batch response.
#[derive(Debug, Clone, Copy)]
pub struct Messages {
    /// Past tense, e.g. "suspended".
    pub done: &'static str,
    /// Base form, e.g. "suspend".
    pub action: &'static str,
    /// Explanation for no-op names, e.g. "are not running".
    pub no_op: Option<&'static str>,
}

/// Print a batch response. Returns `response.ok`.
pub fn print_response(response: &Response, messages: Messages) -> bool {
    if response.error {
        if let Some(detail) = &response.detail {
            println!("{detail}");
        }
        return false;
    }

    if response.ok {
        println!(
            "{} tasks {} successfully.",
            response.success.len(),
            messages.done
        );
        if let (Some(no_op), false) = (messages.no_op, response.no_op.is_empty()) {
            println!("{} {no_op}.", response.no_op.join(", "));
        }
        return true;
    }

    if !response.success.is_empty() {
        println!("{} {} successfully.", response.success.join(", "), messages.done);
    }
    if let (Some(no_op), false) = (messages.no_op, response.no_op.is_empty()) {
        println!("{} {no_op}.", response.no_op.join(", "));
    }
    if !response.failure.is_empty() {
        println!(
            "{} failed to {}.",
            response.failure.join(", "),
            messages.action
        );
    }
    if let Some(detail) = &response.detail {
        println!("{detail}");
    }
    false
}
