// src/cache.rs

//! Cache-directory provider.
//!
//! Every daemon instance gets its own directory under the catin home, keyed
//! by its PID, and every task gets a sub-directory holding its redirected
//! output:
//!
//! ```text
//! <home>/<daemon_pid>/<task_name>/stdout.log
//! <home>/<daemon_pid>/<task_name>/stderr.log
//! <home>/<daemon_pid>/<task_name>/hooks.log
//! <home>/<daemon_pid>/daemon/stderr.log
//! ```

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use crate::types::LogStream;

/// Where per-task log directories live.
pub trait CacheProvider: Send + Sync + Debug {
    /// Directory holding the logs of `task` for the daemon with `daemon_pid`.
    fn path_for(&self, task: &str, daemon_pid: u32) -> PathBuf;

    /// Delete the directory of `task`. Missing directories are not an error.
    fn remove(&self, task: &str, daemon_pid: u32) -> Result<()> {
        let dir = self.path_for(task, daemon_pid);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing cache dir {:?}", dir)),
        }
    }
}

/// The cache directory of one daemon instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonDir {
    pub pid: u32,
    pub path: PathBuf,
    /// Creation time where the filesystem records it, else last modification.
    pub created: DateTime<Local>,
}

/// Default on-disk layout rooted at the catin home directory.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Per-daemon directory.
    pub fn daemon_dir(&self, daemon_pid: u32) -> PathBuf {
        self.root.join(daemon_pid.to_string())
    }

    /// Every `<home>/<pid>` directory, oldest first. Other entries of the
    /// home (settings, socket) are not daemon directories.
    pub fn daemon_dirs(&self) -> Result<Vec<DaemonDir>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("listing {:?}", self.root)),
        };

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("listing {:?}", self.root))?;
            let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };
            let metadata = entry.metadata()?;
            if !metadata.is_dir() {
                continue;
            }
            let created = metadata.created().or_else(|_| metadata.modified())?;
            dirs.push(DaemonDir {
                pid,
                path: entry.path(),
                created: DateTime::from(created),
            });
        }

        dirs.sort_by_key(|d| (d.created, d.pid));
        Ok(dirs)
    }

    /// Path of one redirected stream of `task`.
    pub fn log_path(&self, task: &str, daemon_pid: u32, stream: LogStream) -> PathBuf {
        self.path_for(task, daemon_pid).join(stream.file_name())
    }
}

impl CacheProvider for CacheLayout {
    fn path_for(&self, task: &str, daemon_pid: u32) -> PathBuf {
        self.daemon_dir(daemon_pid).join(task)
    }
}

/// Create `dir` (and parents) and open `file_name` inside it for appending.
pub fn open_log_file(dir: &Path, file_name: &str) -> Result<fs::File> {
    fs::create_dir_all(dir).with_context(|| format!("creating log dir {:?}", dir))?;
    let path = dir.join(file_name);
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {:?}", path))
}
