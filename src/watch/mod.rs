// src/watch/mod.rs

//! Log streaming for `meow watch`.
//!
//! This module is responsible for:
//! - Replaying a task's (or the daemon's) redirected output with progress
//!   bars collapsed to their last state.
//! - Following the file as it grows, driven by `notify` change events with a
//!   polling fallback, until the writer stops running.
//!
//! It does **not** talk to the daemon itself; the caller decides what
//! "still running" means.

pub mod follower;
pub mod progress;

pub use follower::{FollowOptions, follow_log};
pub use progress::ProgressFilter;
