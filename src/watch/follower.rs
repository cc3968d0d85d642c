// src/watch/follower.rs

use std::fs::File;
use std::future::Future;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::debug;

use crate::watch::progress::ProgressFilter;

/// Timing of [`follow_log`].
#[derive(Debug, Clone, Copy)]
pub struct FollowOptions {
    /// Re-read interval when no change notification arrives.
    pub poll_interval: Duration,
    /// How often to ask whether the writer is still running.
    pub liveness_interval: Duration,
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            liveness_interval: Duration::from_secs(2),
        }
    }
}

/// Print the log at `path` to `out` and keep following it while
/// `still_running` says the writer is alive.
///
/// Existing content is replayed with progress bars collapsed. New content is
/// picked up on file-change notifications, with a polling fallback for
/// filesystems that do not deliver them.
pub async fn follow_log<W, F, Fut>(
    path: &Path,
    out: &mut W,
    options: FollowOptions,
    mut still_running: F,
) -> Result<()>
where
    W: Write,
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let file = File::open(path).with_context(|| format!("opening log {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut filter = ProgressFilter::new()?;

    // Task output is arbitrary bytes; invalid UTF-8 is shown lossily.
    let mut backlog = Vec::new();
    reader
        .read_to_end(&mut backlog)
        .with_context(|| format!("reading log {}", path.display()))?;
    out.write_all(filter.collapse(&String::from_utf8_lossy(&backlog)).as_bytes())?;
    out.flush()?;

    let (change_tx, mut change_rx) = mpsc::unbounded_channel::<()>();
    let _watcher = match watch_file(path, change_tx) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            debug!(error = %e, "file notifications unavailable; polling only");
            None
        }
    };

    let mut liveness = tokio::time::interval(options.liveness_interval);
    liveness.tick().await;

    loop {
        tokio::select! {
            Some(()) = change_rx.recv() => {}
            _ = tokio::time::sleep(options.poll_interval) => {}
            _ = liveness.tick() => {
                if !still_running().await {
                    drain_new_lines(&mut reader, &mut filter, out)?;
                    break;
                }
            }
        }
        drain_new_lines(&mut reader, &mut filter, out)?;
    }

    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Write everything appended since the last read.
fn drain_new_lines<R: BufRead, W: Write>(
    reader: &mut R,
    filter: &mut ProgressFilter,
    out: &mut W,
) -> Result<()> {
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        out.write_all(filter.feed_line(&String::from_utf8_lossy(&line)).as_bytes())?;
    }
    out.flush()?;
    Ok(())
}

/// Forward change notifications for `path` into `tx`.
///
/// The returned watcher must be kept alive for as long as notifications are
/// wanted.
fn watch_file(path: &Path, tx: mpsc::UnboundedSender<()>) -> notify::Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if res.is_ok() {
                // Receiver gone means following has ended.
                let _ = tx.send(());
            }
        },
        Config::default(),
    )?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
