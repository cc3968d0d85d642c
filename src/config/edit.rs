// src/config/edit.rs

//! In-place editing of the settings file, as done by `meow set`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::model::{RawSettings, Settings};
use crate::errors::{CatinError, Result};

/// How the value of an editable key is written into the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Bool,
    Integer,
    Text,
}

/// Keys `meow set` may change, as they appear in the file.
const EDITABLE: [(&str, ValueKind); 7] = [
    ("cascade_cancel_on_failure", ValueKind::Bool),
    ("detect_devices", ValueKind::Bool),
    ("device_env_var", ValueKind::Text),
    ("home", ValueKind::Text),
    ("kill_grace_period_ms", ValueKind::Integer),
    ("socket_path", ValueKind::Text),
    ("tick_interval_ms", ValueKind::Integer),
];

/// `[[device]]` entries can be reset but not set from the command line.
const DEVICE_KEY: &str = "device";

/// `kill-grace-period-ms` and `kill_grace_period_ms` name the same key.
pub fn normalize_key(key: &str) -> String {
    key.trim().replace('-', "_")
}

fn kind_of(key: &str) -> Result<ValueKind> {
    EDITABLE
        .iter()
        .find(|(name, _)| *name == key)
        .map(|&(_, kind)| kind)
        .ok_or_else(|| {
            CatinError::ConfigError(format!("unknown setting {:?}", key.replace('_', "-")))
        })
}

/// The settings file as an editable TOML table.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
    table: toml::Table,
}

impl SettingsFile {
    /// Read `path`; a missing file is an empty table.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = match fs::read_to_string(&path) {
            Ok(contents) => contents.parse::<toml::Table>()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => toml::Table::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, table })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set one key. The whole file must still validate afterwards.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key = normalize_key(key);
        if key == DEVICE_KEY {
            return Err(CatinError::ConfigError(format!(
                "[[device]] entries are edited in {}",
                self.path.display()
            )));
        }

        let invalid = |expected: &str| {
            CatinError::ConfigError(format!(
                "{} expects {expected}, got {value:?}",
                key.replace('_', "-")
            ))
        };
        let value = match kind_of(&key)? {
            ValueKind::Bool => toml::Value::Boolean(
                value.trim().parse().map_err(|_| invalid("true or false"))?,
            ),
            ValueKind::Integer => {
                let n: u64 = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid("a non-negative integer"))?;
                toml::Value::Integer(i64::try_from(n).map_err(|_| invalid("a smaller integer"))?)
            }
            ValueKind::Text => toml::Value::String(value.to_string()),
        };

        let previous = self.table.insert(key.clone(), value);
        if let Err(e) = self.settings() {
            match previous {
                Some(old) => self.table.insert(key, old),
                None => self.table.remove(&key),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Drop one key back to its default, or every key with `None`.
    pub fn reset(&mut self, key: Option<&str>) -> Result<()> {
        let Some(key) = key else {
            self.table.clear();
            return Ok(());
        };
        let key = normalize_key(key);
        if key != DEVICE_KEY {
            kind_of(&key)?;
        }
        self.table.remove(&key);
        Ok(())
    }

    /// Validated settings as the file currently describes them.
    pub fn settings(&self) -> Result<Settings> {
        let raw: RawSettings = self.table.clone().try_into()?;
        Settings::try_from(raw)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string(&self.table)
            .map_err(|e| CatinError::ConfigError(format!("cannot write settings: {e}")))?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

/// `key-with-dashes: value` lines describing `settings`, sorted by key.
pub fn describe(settings: &Settings) -> Vec<String> {
    let devices = if settings.devices.is_empty() {
        if settings.detect_devices {
            "detected at daemon start".to_string()
        } else {
            "none".to_string()
        }
    } else {
        settings
            .devices
            .iter()
            .map(|d| format!("{} ({} MiB)", d.id, d.memory))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut lines = vec![
        ("cascade-cancel-on-failure", settings.cascade_cancel_on_failure.to_string()),
        ("detect-devices", settings.detect_devices.to_string()),
        ("device", devices),
        ("device-env-var", settings.device_env_var.clone()),
        ("home", settings.home.display().to_string()),
        ("kill-grace-period-ms", settings.kill_grace.as_millis().to_string()),
        ("socket-path", settings.socket_path.display().to_string()),
        ("tick-interval-ms", settings.tick_interval.as_millis().to_string()),
    ];
    lines.sort_by_key(|(key, _)| *key);
    lines
        .into_iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect()
}
