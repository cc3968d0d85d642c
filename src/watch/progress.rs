// src/watch/progress.rs

//! Progress-bar aware rendering of task logs.
//!
//! Progress bars (tqdm style, `42%|████      | 42/100`) are written as many
//! successive updates. When replaying a log only the last state of each run
//! of updates is kept; when following a log, updates redraw the current
//! terminal line instead of scrolling.

use anyhow::Result;
use regex::Regex;

const PROGRESS_BAR_PATTERN: &str = r"\d+%\|.*\| \d+/\d+";

/// Line filter collapsing progress-bar updates.
#[derive(Debug, Clone)]
pub struct ProgressFilter {
    pattern: Regex,
    /// A progress bar was drawn and its line has not been ended yet.
    pending_newline: bool,
}

impl ProgressFilter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(PROGRESS_BAR_PATTERN)?,
            pending_newline: false,
        })
    }

    pub fn is_progress(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }

    /// Render existing log content, keeping only the final state of each
    /// run of consecutive progress-bar lines.
    ///
    /// A trailing progress bar is left without a newline so that following
    /// the log can keep redrawing it.
    pub fn collapse(&mut self, content: &str) -> String {
        let mut out = String::with_capacity(content.len());
        let mut last_bar: Option<&str> = None;

        for raw in content.lines() {
            let line = visible_segment(raw);
            if self.is_progress(line) {
                last_bar = Some(line);
                continue;
            }
            if let Some(bar) = last_bar.take() {
                out.push_str(bar);
                out.push('\n');
            }
            out.push_str(line);
            out.push('\n');
        }

        self.pending_newline = last_bar.is_some();
        if let Some(bar) = last_bar {
            out.push_str(bar);
        }
        out
    }

    /// Render one line read while following a log (trailing `\n` included
    /// when present).
    ///
    /// Progress updates are prefixed with `\r` and lose their newline, so
    /// the bar keeps redrawing in place. The line is ended only once regular
    /// output follows; a lone newline right after a bar is swallowed.
    pub fn feed_line(&mut self, line: &str) -> String {
        if line.is_empty() {
            return String::new();
        }

        let content = line.strip_suffix('\n').unwrap_or(line);
        let visible = visible_segment(content);

        if self.is_progress(visible) {
            self.pending_newline = true;
            return format!("\r{visible}");
        }
        if line == "\n" && self.pending_newline {
            return String::new();
        }

        let mut out = String::new();
        if std::mem::take(&mut self.pending_newline) {
            out.push('\n');
        }
        out.push_str(line);
        out
    }
}

/// Text after the last carriage return: what a terminal would show.
fn visible_segment(line: &str) -> &str {
    line.rsplit('\r')
        .find(|segment| !segment.is_empty())
        .unwrap_or("")
}
