// src/device/mod.rs

//! Device table and memory reservations.
//!
//! - [`allocator`] owns per-device capacity and the reservations held by
//!   running tasks.
//! - [`discover`] fills the table from `nvidia-smi` when none is configured.

pub mod allocator;
pub mod discover;

use serde::{Deserialize, Serialize};

pub use allocator::DeviceAllocator;

/// One schedulable device (e.g. a GPU) and its total memory in MiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: u32,
    pub memory: u64,
}
