// src/commands/watch.rs

use std::io;

use anyhow::Result;

use crate::commands::ClientContext;
use crate::ipc::Request;
use crate::task::DAEMON_NAME;
use crate::types::LogStream;
use crate::watch::{FollowOptions, follow_log};

/// `meow watch [name] [-s stream]`.
///
/// Follows the log until the task (or the daemon) stops running.
pub async fn watch(ctx: &ClientContext, name: Option<&str>, stream: Option<LogStream>) -> Result<bool> {
    let Some(daemon_pid) = ctx.client.test_running().await else {
        println!("daemon is not running");
        return Ok(false);
    };

    let target = name.unwrap_or(DAEMON_NAME);
    let stream = stream.unwrap_or(if name.is_some() {
        LogStream::Stdout
    } else {
        LogStream::Stderr
    });

    let path = ctx.settings.cache().log_path(target, daemon_pid, stream);
    if !path.is_file() {
        println!("{target} does not exist or has not started yet.");
        return Ok(false);
    }

    let client = ctx.client.clone();
    let watched_name = name.map(str::to_string);
    let still_running = move || {
        let client = client.clone();
        let request = Request::Test {
            name: watched_name.clone(),
        };
        async move {
            match client.send(&request).await {
                Ok(response) => response.ok,
                Err(_) => false,
            }
        }
    };

    let mut out = io::stdout();
    follow_log(&path, &mut out, FollowOptions::default(), still_running).await?;
    Ok(true)
}
