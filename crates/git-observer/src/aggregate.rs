// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Observation aggregation
//!
//! One aggregation cycle syncs remote refs (best effort), then for each
//! observed path reads the log, parses every line and runs the result through
//! the [`CommitFilter`]. A path that fails to read or parse yields an empty,
//! flagged [`Observation`] and never affects the other paths. Setting the
//! aggregator's [`CancelFlag`] ends the cycle at the next path boundary and
//! kills a git process the source is waiting on.
//!
//! # Example
//!
//! ```no_run
//! use git_observer::aggregate::Aggregator;
//! use git_observer::config::Configuration;
//! use observer_log::GitCli;
//!
//! let config = Configuration::new("/path/to/repo");
//! let source = GitCli::new(&config.repository_root);
//! let mut aggregator = Aggregator::new(&config, Box::new(source));
//!
//! for observation in aggregator.collect() {
//!     println!("{}: {} new commits", observation.name, observation.commits.len());
//! }
//! ```

use std::fmt;

use observer_log::{
    CancelFlag, CommitRecord, LogSource, Observation, ParseError, ShowDetail, SourceError,
    parse_line,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::filter::CommitFilter;

// ============================================================================
// Error Types
// ============================================================================

/// Reasons a single observed path could not be read
#[derive(Debug, Error)]
pub enum ObserveError {
    /// The log source failed
    #[error("Log source error: {0}")]
    Source(#[from] SourceError),

    /// A line of the log could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

// ============================================================================
// Progress Reporting
// ============================================================================

/// Progress callback signature
pub type ProgressCallback = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Progress event during an aggregation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Remote refs are being synced
    Fetching,
    /// Syncing remote refs failed; the cycle goes on with local refs
    FetchFailed {
        /// Description of the failure
        message: String,
    },
    /// Reading the log of one path
    Reading {
        /// Observed path
        path: String,
        /// Zero-based position of the path
        index: usize,
        /// Number of observed paths
        total: usize,
    },
    /// One path failed and was reported empty
    PathFailed {
        /// Observed path
        path: String,
        /// Description of the failure
        message: String,
    },
    /// Cycle completed
    Completed {
        /// Statistics from the cycle
        stats: CycleStats,
    },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetching => write!(f, "fetching remote refs"),
            Self::FetchFailed { message } => write!(f, "fetch failed: {message}"),
            Self::Reading { path, index, total } => {
                write!(f, "reading {path} ({}/{total})", index + 1)
            }
            Self::PathFailed { path, message } => write!(f, "{path} failed: {message}"),
            Self::Completed { stats } => write!(
                f,
                "cycle complete: {} new commits in {} paths, {} failed",
                stats.commits, stats.paths, stats.failures
            ),
        }
    }
}

/// Statistics from one aggregation cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Paths visited
    pub paths: usize,
    /// Commits surfaced after filtering
    pub commits: usize,
    /// Paths that failed to read or parse
    pub failures: usize,
}

// ============================================================================
// Aggregator
// ============================================================================

/// Runs aggregation cycles over the observed paths of one repository
///
/// The aggregator owns the [`CommitFilter`], so dedup state persists across
/// every call to [`Aggregator::collect`].
pub struct Aggregator {
    source: Box<dyn LogSource>,
    filter: CommitFilter,
    paths: Vec<String>,
    origin: Option<String>,
    sync_remotes: bool,
    cancel: CancelFlag,
    progress: Option<ProgressCallback>,
}

impl Aggregator {
    /// Create an aggregator reading from `source`
    ///
    /// Remote refs are synced before each cycle unless `config` is in test
    /// mode. The source is handed the aggregator's cancel flag.
    #[must_use]
    pub fn new(config: &Configuration, mut source: Box<dyn LogSource>) -> Self {
        let cancel = CancelFlag::new();
        source.set_cancel(cancel.clone());
        Self {
            source,
            filter: CommitFilter::from_config(config),
            paths: config.observed_paths.clone(),
            origin: config.origin().map(str::to_string),
            sync_remotes: !config.is_test_mode,
            cancel,
            progress: None,
        }
    }

    /// Set a progress callback
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Replace the progress callback in place
    pub fn set_progress(&mut self, callback: ProgressCallback) {
        self.progress = Some(callback);
    }

    /// Report progress event
    fn report(&self, event: ProgressEvent) {
        if let Some(ref callback) = self.progress {
            callback(&event);
        }
    }

    /// Get reference to the filter
    #[must_use]
    pub fn filter(&self) -> &CommitFilter {
        &self.filter
    }

    /// Observed paths, in reporting order
    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Flag that abandons the current and every later cycle once set
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run one aggregation cycle
    ///
    /// Returns one observation per observed path, in configuration order.
    /// Failures never abort the cycle: a failed path is reported as an empty
    /// observation carrying the error message.
    ///
    /// Once the cancel flag is set the cycle stops before the next fetch or
    /// path, drops the path in flight, and returns what it had without a
    /// [`ProgressEvent::Completed`] report.
    pub fn collect(&mut self) -> Vec<Observation> {
        if self.sync_remotes && !self.cancel.is_cancelled() {
            self.sync();
        }

        let total = self.paths.len();
        let mut stats = CycleStats::default();
        let mut observations = Vec::with_capacity(total);

        for index in 0..total {
            if self.cancel.is_cancelled() {
                info!(done = index, total, "Aggregation cycle cancelled");
                return observations;
            }
            let path = self.paths[index].clone();
            self.report(ProgressEvent::Reading {
                path: path.clone(),
                index,
                total,
            });
            stats.paths += 1;

            let result = self.read_path(&path);
            if self.cancel.is_cancelled() {
                info!(path = %path, done = index, total, "Aggregation cycle cancelled");
                return observations;
            }
            match result {
                Ok(commits) => {
                    let parsed = commits.len();
                    let accepted = self.filter.apply(commits);
                    debug!(path = %path, parsed, accepted = accepted.len(), "Path observed");
                    stats.commits += accepted.len();
                    observations.push(Observation::new(path, accepted));
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "Failed to observe path");
                    stats.failures += 1;
                    self.report(ProgressEvent::PathFailed {
                        path: path.clone(),
                        message: err.to_string(),
                    });
                    observations.push(Observation::failed(path, err.to_string()));
                }
            }
        }

        info!(
            paths = stats.paths,
            commits = stats.commits,
            failures = stats.failures,
            "Aggregation cycle complete"
        );
        self.report(ProgressEvent::Completed { stats });
        observations
    }

    /// Read and parse the whole log of one path, without filtering
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails or any line does not parse. The
    /// output is parsed completely before anything reaches the filter, so a
    /// failed path leaves the known set untouched.
    pub fn read_path(&self, path: &str) -> Result<Vec<CommitRecord>, ObserveError> {
        let mut stream = self
            .source
            .log(path, self.filter.order())?
            .with_cancel(self.cancel.clone());
        let mut commits = Vec::new();
        while let Some(line) = stream.next_line()? {
            if let Some(record) = parse_line(&line, self.origin.as_deref())? {
                commits.push(record);
            }
        }
        stream.finish()?;
        Ok(commits)
    }

    /// Render the details of one commit
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot produce the commit.
    pub fn show(&self, identifier: &str, detail: ShowDetail) -> Result<String, SourceError> {
        self.source.show(identifier, detail)
    }

    /// Sync remote refs; failures are logged and reported, never raised
    fn sync(&self) {
        self.report(ProgressEvent::Fetching);
        if let Err(err) = self.source.fetch() {
            warn!(error = %err, "Remote sync failed, continuing with local refs");
            self.report(ProgressEvent::FetchFailed {
                message: err.to_string(),
            });
        }
    }
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("filter", &self.filter)
            .field("paths", &self.paths)
            .field("origin", &self.origin)
            .field("sync_remotes", &self.sync_remotes)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
