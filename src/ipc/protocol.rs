// src/ipc/protocol.rs

//! Wire protocol between `meow` clients and the daemon.
//!
//! One JSON object per line in each direction:
//!
//! ```text
//! {"op":"kill","names":["train-a"],"force":false}
//! {"ok":true,"error":false,"success":["train-a"],"failure":[],"no_op":[]}
//! ```
//!
//! Omitting `names` targets every task.

use serde::{Deserialize, Serialize};

use crate::engine::BatchReport;
use crate::task::{TaskName, TaskSubmission};

/// A client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request {
    Test {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<TaskName>,
    },
    Create {
        submissions: Vec<TaskSubmission>,
    },
    Suspend {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        names: Option<Vec<TaskName>>,
    },
    Resume {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        names: Option<Vec<TaskName>>,
    },
    Kill {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        names: Option<Vec<TaskName>>,
        #[serde(default)]
        force: bool,
    },
    Remove {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        names: Option<Vec<TaskName>>,
    },
    Exit,
}

impl Request {
    /// Short operation name, for logs and messages.
    pub fn op(&self) -> &'static str {
        match self {
            Request::Test { .. } => "test",
            Request::Create { .. } => "create",
            Request::Suspend { .. } => "suspend",
            Request::Resume { .. } => "resume",
            Request::Kill { .. } => "kill",
            Request::Remove { .. } => "remove",
            Request::Exit => "exit",
        }
    }
}

/// The daemon's answer to one request.
///
/// `ok` is true iff the whole request succeeded. `error` marks a failure of
/// the request itself (malformed line, daemon-side protocol problem) rather
/// than of individual tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub success: Vec<TaskName>,
    #[serde(default)]
    pub failure: Vec<TaskName>,
    #[serde(default)]
    pub no_op: Vec<TaskName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl Response {
    pub fn from_report(report: BatchReport) -> Self {
        let detail = if report.details.is_empty() {
            None
        } else {
            Some(report.details.join("\n"))
        };

        Self {
            ok: report.failure.is_empty(),
            error: false,
            success: report.success,
            failure: report.failure,
            no_op: report.no_op,
            detail,
            pid: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: true,
            detail: Some(detail.into()),
            ..Self::default()
        }
    }

    /// Positive liveness answer.
    pub fn alive(pid: u32) -> Self {
        Self {
            ok: true,
            pid: Some(pid),
            ..Self::default()
        }
    }
}
