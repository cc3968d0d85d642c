// src/config/mod.rs

//! Configuration loading and validation for catin.
//!
//! Responsibilities:
//! - Define the TOML-backed data models for daemon settings and submission
//!   files (`model.rs`).
//! - Load them from disk (`loader.rs`).
//! - Validate basic invariants like unique devices and acyclic `after`
//!   references, and normalize submission files into wire submissions
//!   (`validate.rs`).
//! - Edit the settings file key by key for `meow set` (`edit.rs`).

pub mod edit;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_settings_path, load_settings, load_submission};
pub use model::{GroupSection, RawSettings, RawSubmissionFile, Settings, SubmissionFile, TaskEntry};
pub use validate::default_home;
