// src/dag/mod.rs

//! Task groups and dependency ordering.
//!
//! - [`graph`] holds the arena-backed DAG used by the `graph` strategy.
//! - [`group`] holds task groups, their execution strategy and the
//!   eligibility / cascade rules the scheduler applies every tick.

pub mod graph;
pub mod group;

pub use graph::TaskGraph;
pub use group::{ExecutionStrategy, TaskGroup};
