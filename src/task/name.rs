// src/task/name.rs

//! Task name generation and validation.
//!
//! Task names double as log directory names, so they must be valid single
//! path components on every platform we write logs on.

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::errors::{CatinError, Result};

/// Reserved name for the daemon's own log directory and `test` target.
pub const DAEMON_NAME: &str = "daemon";

const GENERATED_NAME_LEN: usize = 5;
const MAX_NAME_BYTES: usize = 255;

/// Generate a random 5-character alphanumeric name that `taken` rejects.
pub fn generate_name<R: Rng>(rng: &mut R, taken: impl Fn(&str) -> bool) -> String {
    loop {
        let candidate: String = (0..GENERATED_NAME_LEN)
            .map(|_| char::from(rng.sample(Alphanumeric)))
            .collect();
        if !taken(&candidate) {
            return candidate;
        }
    }
}

/// Check that `name` is usable as a task name.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = || CatinError::InvalidName(name.to_string());

    if name.trim().is_empty() || name.len() >= MAX_NAME_BYTES {
        return Err(invalid());
    }
    if name == DAEMON_NAME || name == "." || name == ".." || name == ":" {
        return Err(invalid());
    }
    if name
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(invalid());
    }

    Ok(())
}
