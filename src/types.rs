// src/types.rs

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Execution strategy of a submitted group, as named in submission files and
/// on the wire.
///
/// - `Sequential`: members run one at a time in submission order.
/// - `Graph`: members run as soon as the members they depend on (`after`)
///   have succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Sequential,
    Graph,
}

impl Default for StrategyKind {
    fn default() -> Self {
        StrategyKind::Sequential
    }
}

/// Which redirected output stream of a task (or the daemon) to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    pub fn file_name(self) -> &'static str {
        match self {
            LogStream::Stdout => "stdout.log",
            LogStream::Stderr => "stderr.log",
        }
    }
}

impl FromStr for LogStream {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stdout" => Ok(LogStream::Stdout),
            "stderr" => Ok(LogStream::Stderr),
            other => Err(format!(
                "invalid stream: {other} (expected \"stdout\" or \"stderr\")"
            )),
        }
    }
}
