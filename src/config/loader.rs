// src/config/loader.rs

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{RawSettings, RawSubmissionFile, Settings, SubmissionFile};
use crate::config::validate::default_home;
use crate::errors::Result;

/// Environment variable overriding the settings file location.
pub const SETTINGS_ENV: &str = "CATIN_SETTINGS";

const SETTINGS_FILE: &str = "settings.toml";

/// Load raw settings; a missing file yields the defaults.
pub fn load_raw_settings(path: impl AsRef<Path>) -> Result<RawSettings> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file; using defaults");
            return Ok(RawSettings::default());
        }
        Err(e) => return Err(e.into()),
    };

    let raw: RawSettings = toml::from_str(&contents)?;
    Ok(raw)
}

/// Load settings and run validation.
///
/// `path` wins over `$CATIN_SETTINGS`, which wins over
/// `<catin home>/settings.toml`.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_settings_path()?,
    };
    let raw = load_raw_settings(&path)?;
    Settings::try_from(raw)
}

/// Resolve the settings path without an explicit override.
pub fn default_settings_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(SETTINGS_ENV) {
        return Ok(PathBuf::from(path));
    }
    Ok(default_home()?.join(SETTINGS_FILE))
}

/// Load a submission file from a given path and return the raw form.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_submission`] for that.
pub fn load_submission_raw(path: impl AsRef<Path>) -> Result<RawSubmissionFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawSubmissionFile = toml::from_str(&contents)?;
    Ok(raw)
}

/// Load a submission file and validate names and dependencies.
pub fn load_submission(path: impl AsRef<Path>) -> Result<SubmissionFile> {
    let raw = load_submission_raw(&path)?;
    SubmissionFile::try_from(raw)
}
