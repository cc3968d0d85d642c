// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::commands::clean::{Moment, parse_moment};
use crate::types::LogStream;

/// Command-line arguments for `meow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "meow",
    version,
    about = "Queue and run GPU jobs on this machine, one daemon at a time.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the settings file (TOML).
    ///
    /// Default: `$CATIN_SETTINGS`, or `settings.toml` in the catin home.
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CATIN_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start the daemon in the foreground.
    Run {
        /// Write daemon logs into the cache directory instead of stderr.
        #[arg(long)]
        detach: bool,
    },

    /// Test whether the daemon or a specific task is running.
    Test {
        /// Task to check; the daemon itself when omitted.
        name: Option<String>,
    },

    /// Create tasks from a command string or a `.toml` submission file.
    Create(CreateArgs),

    /// Suspend tasks. Running tasks are stopped but keep their devices.
    Suspend(Targets),

    /// Resume suspended tasks.
    Resume(Targets),

    /// Kill tasks. Use `meow exit` to stop the daemon itself.
    Kill {
        #[command(flatten)]
        targets: Targets,

        /// Kill immediately, without the grace period and end hooks.
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Remove tasks, killing them forcefully if they still run.
    Remove(Targets),

    /// Stop the daemon without stopping running tasks.
    ///
    /// Use `meow kill --all` first to end tasks with their end hooks.
    Exit,

    /// Stream the output of a task, or of the daemon.
    Watch {
        /// Task to watch; the daemon when omitted.
        name: Option<String>,

        /// Stream to follow (stdout or stderr).
        ///
        /// Defaults to stdout for tasks and stderr for the daemon.
        #[arg(long, short = 's', value_name = "STREAM")]
        stream: Option<LogStream>,
    },

    /// Show, change or reset settings. Takes effect at the next daemon start.
    Set(SetArgs),

    /// Delete the cache directories of past daemon instances.
    Clean(CleanArgs),
}

/// Task selection shared by the control commands.
#[derive(Debug, Clone, Args)]
pub struct Targets {
    /// Apply to every task.
    #[arg(long, short = 'A')]
    pub all: bool,

    /// Task names.
    pub names: Vec<String>,
}

impl Targets {
    /// `None` means every task.
    pub fn selection(&self) -> Result<Option<Vec<String>>, String> {
        if self.all {
            return Ok(None);
        }
        if self.names.is_empty() {
            return Err("No task name provided.".to_string());
        }
        Ok(Some(self.names.clone()))
    }
}

/// Arguments of `meow set`.
#[derive(Debug, Clone, Args)]
pub struct SetArgs {
    /// Print every setting.
    #[arg(long, short = 's')]
    pub show: bool,

    /// Reset SETTING to its default, or every setting when none is given.
    #[arg(long, short = 'r', conflicts_with = "value")]
    pub reset: bool,

    /// Setting name, e.g. `kill-grace-period-ms`.
    pub setting: Option<String>,

    /// New value.
    pub value: Option<String>,
}

/// Arguments of `meow clean`.
#[derive(Debug, Clone, Args)]
pub struct CleanArgs {
    /// Delete directories created on or before this date (`YYYY-MM-DD [HH:MM[:SS]]`).
    #[arg(long, short = 'b', value_parser = parse_moment, value_name = "DATE")]
    pub before: Option<Moment>,

    /// Delete directories created on or after this date.
    #[arg(long, short = 'a', value_parser = parse_moment, value_name = "DATE")]
    pub after: Option<Moment>,

    /// Delete every directory except the running daemon's.
    #[arg(long, short = 'A')]
    pub all: bool,

    /// Print each directory as it is deleted.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

/// Arguments of `meow create`.
#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    /// Command string, or path to a `.toml` submission file.
    pub input: String,

    /// Task name; a random 5-character name when omitted.
    #[arg(long, short = 'n')]
    pub task_name: Option<String>,

    /// Priority; higher runs first.
    #[arg(long, short = 'p', allow_hyphen_values = true)]
    pub priority: Option<i64>,

    /// Devices the task may use (comma separated); all devices by default.
    #[arg(long, short = 'd', value_delimiter = ',')]
    pub visible_devices: Vec<u32>,

    /// Memory needed on each device, in MiB.
    #[arg(long, short = 'M')]
    pub requires_memory_per_device: Option<u64>,

    /// Number of devices to reserve.
    #[arg(long, short = 'c')]
    pub min_devices: Option<u32>,

    /// Expand list arguments after `--` into independent commands.
    ///
    /// `meow create train.sh -m -- -s [1,2] lr=[a,b]` creates four tasks.
    #[arg(long, short = 'm')]
    pub multirun: bool,

    /// Extra arguments appended to the command.
    #[arg(last = true)]
    pub args: Vec<String>,
}

impl CreateArgs {
    pub fn has_resource_overrides(&self) -> bool {
        !self.visible_devices.is_empty()
            || self.requires_memory_per_device.is_some()
            || self.min_devices.is_some()
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
