// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatinError {
    #[error("Task name already in use: {0}")]
    NameConflict(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid task name: {0:?}")]
    InvalidName(String),

    #[error("Invalid resource spec for task {task}: {reason}")]
    InvalidResourceSpec { task: String, reason: String },

    #[error("Cycle detected in task graph: {0}")]
    GraphCycle(String),

    #[error("Allocation infeasible for task {task}: {reason}")]
    AllocationInfeasible { task: String, reason: String },

    #[error("Failed to spawn process for task {task}: {reason}")]
    ProcessSpawnFailure { task: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Daemon unavailable: {0}")]
    DaemonUnavailable(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CatinError>;
