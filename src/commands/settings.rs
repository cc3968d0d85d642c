// src/commands/settings.rs

//! `meow set`: show, change or reset settings.
//!
//! Runs without a daemon and before the settings are loaded, so a broken
//! settings file can still be reset. A running daemon keeps the settings it
//! started with.

use std::path::Path;

use anyhow::Result;

use crate::cli::SetArgs;
use crate::config::edit::{SettingsFile, describe};
use crate::errors::CatinError;

/// `meow set [-s] [-r] [setting] [value]`.
pub fn set(path: &Path, args: &SetArgs) -> Result<bool> {
    let mut file = SettingsFile::open(path)?;

    if args.show {
        for line in describe(&file.settings()?) {
            println!("{line}");
        }
        return Ok(true);
    }

    if args.reset {
        if let Err(e) = file.reset(args.setting.as_deref()) {
            return report(e);
        }
        file.save()?;
        match &args.setting {
            Some(setting) => println!("Setting {setting} reset to its default."),
            None => println!("All settings reset to their defaults."),
        }
        return Ok(true);
    }

    let (Some(setting), Some(value)) = (&args.setting, &args.value) else {
        println!("Provide a setting and a value, or use --show or --reset.");
        return Ok(false);
    };

    if let Err(e) = file.set(setting, value) {
        return report(e);
    }
    file.save()?;
    println!("Setting {setting} updated to {value}.");
    Ok(true)
}

/// Invalid input is a message, not a failure of the command itself.
fn report(err: CatinError) -> Result<bool> {
    match err {
        CatinError::ConfigError(message) => {
            println!("{message}");
            Ok(false)
        }
        other => Err(other.into()),
    }
}
