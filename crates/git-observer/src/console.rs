// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Console rendering of observations
//!
//! The text feed prints one block per observed path that has new commits:
//!
//! ```text
//! --- src ---
//! max.mustermann (2024-03-04 09:00:00 +01:00): Add parser
//! HEAD -> main
//! https://example.com/commit/1a2b3c4
//! ```
//!
//! The refs line is printed only for decorated commits, the link line only
//! when an origin is configured.

use std::fmt::Write as _;
use std::io::{self, Write};

use observer_log::{CommitRecord, Observation};

use crate::events::ObserverEvent;

/// Timestamp layout used in the text feed
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

/// How batches are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable blocks
    #[default]
    Text,
    /// One JSON object per batch, one batch per line
    Json,
}

impl OutputFormat {
    /// Map the `--json` flag
    #[must_use]
    pub fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Text }
    }
}

/// Render one commit as its text lines
#[must_use]
pub fn render_commit(commit: &CommitRecord) -> String {
    let mut out = format!(
        "{} ({}): {}\n",
        commit.author,
        commit.timestamp.format(DATE_FORMAT),
        commit.summary
    );
    if commit.has_refs() {
        let _ = writeln!(out, "{}", commit.refs);
    }
    if let Some(link) = commit.link() {
        let _ = writeln!(out, "{link}");
    }
    out
}

/// Render a batch as text, skipping paths without new commits
#[must_use]
pub fn render_text(observations: &[Observation]) -> String {
    let mut out = String::new();
    for observation in observations.iter().filter(|o| !o.is_empty()) {
        let _ = writeln!(out, "--- {} ---", observation.name);
        for commit in &observation.commits {
            out.push_str(&render_commit(commit));
            out.push('\n');
        }
    }
    out
}

/// Write an event to `out` in the given format
///
/// Status events are not part of the feed and produce no output.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_event(
    out: &mut impl Write,
    event: &ObserverEvent,
    format: OutputFormat,
) -> io::Result<()> {
    let ObserverEvent::ObservationsReady { observations, .. } = event else {
        return Ok(());
    };
    match format {
        OutputFormat::Text => out.write_all(render_text(observations).as_bytes())?,
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, event)?;
            out.write_all(b"\n")?;
        }
    }
    out.flush()
}

/// Write a batch produced outside the worker, e.g. by a single cycle
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_observations(
    out: &mut impl Write,
    observations: Vec<Observation>,
    format: OutputFormat,
) -> io::Result<()> {
    write_event(out, &ObserverEvent::observations(observations), format)
}
