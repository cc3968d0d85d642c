// src/logging.rs

//! Logging setup for `catin` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `CATIN_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Logs go to STDERR, except for a detached daemon, which appends them to
//! `daemon/stderr.log` in its cache directory so `meow watch` can follow
//! them. The detached daemon's own stdout and stderr are pointed at the same
//! directory, so stray prints and panics land there too.

use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use tracing_subscriber::fmt;

use crate::cache::open_log_file;
use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV: &str = "CATIN_LOG";

/// Initialise global logging subscriber writing to stderr.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    fmt()
        .with_max_level(resolve_level(cli_level))
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Initialise global logging subscriber appending to `dir/file_name`.
pub fn init_file_logging(cli_level: Option<LogLevel>, dir: &Path, file_name: &str) -> Result<()> {
    let file = open_log_file(dir, file_name)?;

    fmt()
        .with_max_level(resolve_level(cli_level))
        .with_target(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();

    Ok(())
}

/// Point this process's stdout and stderr at `dir/stdout.log` and
/// `dir/stderr.log`, appending.
#[cfg(unix)]
pub fn redirect_std_streams(dir: &Path) -> Result<()> {
    use std::os::fd::AsRawFd;

    use anyhow::Context;
    use nix::libc::{STDERR_FILENO, STDOUT_FILENO};

    use crate::types::LogStream;

    for (stream, fd) in [
        (LogStream::Stdout, STDOUT_FILENO),
        (LogStream::Stderr, STDERR_FILENO),
    ] {
        let file = open_log_file(dir, stream.file_name())?;
        nix::unistd::dup2(file.as_raw_fd(), fd).with_context(|| {
            format!("redirecting output into {}", dir.join(stream.file_name()).display())
        })?;
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn redirect_std_streams(_dir: &Path) -> Result<()> {
    Ok(())
}

fn resolve_level(cli_level: Option<LogLevel>) -> tracing::Level {
    match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var(LOG_ENV)
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(tracing::Level::INFO),
    }
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
