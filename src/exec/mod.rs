// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running task commands, using
//! `tokio::process::Command`, and reporting their exits back to the
//! scheduling runtime via `RuntimeEvent`s.
//!
//! - [`backend`] provides the `ProcessSupervisor` trait the runtime talks to,
//!   which tests can replace with a fake implementation.
//! - [`supervisor`] is the production implementation: process groups, log
//!   redirection, reapers, graceful kill escalation and hooks.
//! - [`signal`] wraps process-group signal delivery.

pub mod backend;
pub mod signal;
pub mod supervisor;

pub use backend::{LaunchRequest, ProcessHandle, ProcessSupervisor, SignalOutcome};
pub use supervisor::{RealSupervisor, SupervisorOptions, TASK_NAME_ENV};
