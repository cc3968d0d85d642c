// src/commands/control.rs

//! `test`, `suspend`, `resume`, `kill`, `remove` and `exit`.

use anyhow::Result;

use crate::cli::Targets;
use crate::commands::{ClientContext, Messages, print_response};
use crate::errors::CatinError;
use crate::ipc::{Request, Response};
use crate::task::DAEMON_NAME;

/// Send `request`, turning an unreachable daemon into a message instead of an
/// error.
async fn send_or_report(ctx: &ClientContext, request: &Request) -> Result<Option<Response>> {
    match ctx.client.send(request).await {
        Ok(response) => Ok(Some(response)),
        Err(CatinError::DaemonUnavailable(reason)) => {
            tracing::debug!(%reason, "daemon unavailable");
            println!("daemon is not running");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn selection(targets: &Targets) -> Option<Option<Vec<String>>> {
    match targets.selection() {
        Ok(names) => Some(names),
        Err(message) => {
            println!("{message}");
            None
        }
    }
}

/// `meow test [name]`.
pub async fn test(ctx: &ClientContext, name: Option<&str>) -> Result<bool> {
    let request = Request::Test {
        name: name.map(str::to_string),
    };
    let Some(response) = send_or_report(ctx, &request).await? else {
        return Ok(false);
    };

    let label = name.unwrap_or(DAEMON_NAME);
    match response.pid {
        Some(pid) if response.ok => {
            println!("{label} is running with PID {pid}.");
            Ok(true)
        }
        _ => {
            println!("{label} does not exist, has not started yet, or has already ended.");
            Ok(false)
        }
    }
}

/// `meow suspend`.
pub async fn suspend(ctx: &ClientContext, targets: &Targets) -> Result<bool> {
    let Some(names) = selection(targets) else {
        return Ok(false);
    };
    batch(
        ctx,
        Request::Suspend { names },
        Messages {
            done: "suspended",
            action: "suspend",
            no_op: Some("are not in waiting or running status"),
        },
    )
    .await
}

/// `meow resume`.
pub async fn resume(ctx: &ClientContext, targets: &Targets) -> Result<bool> {
    let Some(names) = selection(targets) else {
        return Ok(false);
    };
    batch(
        ctx,
        Request::Resume { names },
        Messages {
            done: "resumed",
            action: "resume",
            no_op: Some("are not in suspended status"),
        },
    )
    .await
}

/// `meow kill [-f]`.
pub async fn kill(ctx: &ClientContext, targets: &Targets, force: bool) -> Result<bool> {
    let Some(names) = selection(targets) else {
        return Ok(false);
    };
    if reject_daemon(names.as_deref(), "meow exit") {
        return Ok(false);
    }
    batch(
        ctx,
        Request::Kill { names, force },
        Messages {
            done: "killed",
            action: "kill",
            no_op: Some("have already ended"),
        },
    )
    .await
}

/// `meow remove`.
pub async fn remove(ctx: &ClientContext, targets: &Targets) -> Result<bool> {
    let Some(names) = selection(targets) else {
        return Ok(false);
    };
    if reject_daemon(names.as_deref(), "meow exit") {
        return Ok(false);
    }
    batch(
        ctx,
        Request::Remove { names },
        Messages {
            done: "removed",
            action: "remove",
            no_op: None,
        },
    )
    .await
}

/// `meow exit`.
pub async fn exit(ctx: &ClientContext) -> Result<bool> {
    let Some(response) = send_or_report(ctx, &Request::Exit).await? else {
        return Ok(false);
    };
    if response.ok {
        println!("Daemon exiting...");
    } else if let Some(detail) = &response.detail {
        println!("{detail}");
    }
    Ok(response.ok)
}

async fn batch(ctx: &ClientContext, request: Request, messages: Messages) -> Result<bool> {
    match send_or_report(ctx, &request).await? {
        Some(response) => Ok(print_response(&response, messages)),
        None => Ok(false),
    }
}

fn reject_daemon(names: Option<&[String]>, hint: &str) -> bool {
    let targets_daemon = names.is_some_and(|names| names.iter().any(|n| n == DAEMON_NAME));
    if targets_daemon {
        println!("The daemon cannot be targeted here; use `{hint}` to stop it.");
    }
    targets_daemon
}
