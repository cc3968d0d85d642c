// src/commands/clean.rs

//! `meow clean`: delete the cache directories of past daemon instances.

use std::fs;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use crate::cache::DaemonDir;
use crate::cli::CleanArgs;
use crate::commands::ClientContext;

const DATE_TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// A point in time given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moment {
    /// A whole day.
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Moment {
    /// First instant covered, in local time.
    pub fn earliest(self) -> Option<DateTime<Local>> {
        let naive = match self {
            Moment::Date(date) => date.and_time(NaiveTime::MIN),
            Moment::DateTime(dt) => dt,
        };
        Local.from_local_datetime(&naive).earliest()
    }

    /// Last instant covered, in local time.
    pub fn latest(self) -> Option<DateTime<Local>> {
        let naive = match self {
            Moment::Date(date) => date.and_hms_nano_opt(23, 59, 59, 999_999_999)?,
            Moment::DateTime(dt) => dt,
        };
        Local.from_local_datetime(&naive).latest()
    }
}

/// Parse `YYYY-MM-DD`, optionally followed by `HH:MM[:SS]`.
pub fn parse_moment(input: &str) -> Result<Moment, String> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(Moment::Date(date));
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .map(Moment::DateTime)
        .ok_or_else(|| format!("expected YYYY-MM-DD or 'YYYY-MM-DD HH:MM[:SS]', got {input:?}"))
}

/// Which daemon directories to delete.
#[derive(Debug, Clone, Default)]
pub struct CleanFilter {
    /// Created at or before this instant.
    pub before: Option<DateTime<Local>>,
    /// Created at or after this instant.
    pub after: Option<DateTime<Local>>,
    pub all: bool,
}

impl CleanFilter {
    pub fn from_args(args: &CleanArgs) -> Self {
        Self {
            before: args.before.and_then(Moment::latest),
            after: args.after.and_then(Moment::earliest),
            all: args.all,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.before.is_none() && self.after.is_none()
    }

    pub fn matches(&self, created: DateTime<Local>) -> bool {
        self.all
            || self.before.is_some_and(|before| created <= before)
            || self.after.is_some_and(|after| created >= after)
    }
}

/// Directories to delete, and matching ones that belong to the live daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanPlan {
    pub remove: Vec<DaemonDir>,
    pub in_use: Vec<DaemonDir>,
}

pub fn plan(dirs: Vec<DaemonDir>, filter: &CleanFilter, live_daemon: Option<u32>) -> CleanPlan {
    let mut plan = CleanPlan::default();
    for dir in dirs.into_iter().filter(|d| filter.matches(d.created)) {
        if Some(dir.pid) == live_daemon {
            plan.in_use.push(dir);
        } else {
            plan.remove.push(dir);
        }
    }
    plan
}

/// `meow clean [-b date] [-a date] [-A] [-v]`.
pub async fn clean(ctx: &ClientContext, args: &CleanArgs) -> Result<bool> {
    let filter = CleanFilter::from_args(args);
    if filter.is_empty() {
        println!("Nothing to clean: pass --before, --after or --all.");
        return Ok(false);
    }

    let live = ctx.client.test_running().await;
    let plan = plan(ctx.settings.cache().daemon_dirs()?, &filter, live);

    for dir in &plan.in_use {
        println!("{} is currently in use, skipping deletion.", dir.path.display());
    }

    let mut ok = true;
    let mut deleted = 0;
    for dir in &plan.remove {
        if args.verbose {
            println!("Deleting: {}", dir.path.display());
        }
        match fs::remove_dir_all(&dir.path) {
            Ok(()) => deleted += 1,
            Err(e) => {
                println!("Failed to delete {}: {e}", dir.path.display());
                ok = false;
            }
        }
    }

    println!("{deleted} cache directories deleted.");
    Ok(ok)
}
