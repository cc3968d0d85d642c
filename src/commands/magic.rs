// src/commands/magic.rs

//! `${...}` magic strings in submitted commands.
//!
//! Resolved on the client before submission. Known variables:
//! - `${task_name}`: the task's explicit name
//! - `${run_dir}`: the daemon's cache directory
//!
//! Unknown variables, and known ones without a value, are left untouched.

use std::path::PathBuf;

use anyhow::Result;
use regex::{Captures, Regex};

/// Values available to magic strings.
#[derive(Debug, Clone, Default)]
pub struct MagicVars {
    pub task_name: Option<String>,
    pub run_dir: Option<PathBuf>,
}

impl MagicVars {
    fn lookup(&self, var: &str) -> Option<String> {
        match var.trim() {
            "task_name" => self.task_name.clone(),
            "run_dir" => self
                .run_dir
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            _ => None,
        }
    }
}

/// Compiled resolver.
#[derive(Debug, Clone)]
pub struct MagicResolver {
    pattern: Regex,
}

impl MagicResolver {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(r"\$\{([^}]+)\}")?,
        })
    }

    pub fn resolve(&self, input: &str, vars: &MagicVars) -> String {
        self.pattern
            .replace_all(input.trim(), |caps: &Captures<'_>| {
                vars.lookup(&caps[1])
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}
