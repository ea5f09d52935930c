//! Commit record and observation types

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// One logged change as reported by `git log`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Committer name
    pub author: String,
    /// Commit timestamp, keeping the committer's UTC offset
    pub timestamp: DateTime<FixedOffset>,
    /// First line of the commit message
    pub summary: String,
    /// Abbreviated commit hash
    pub identifier: String,
    /// Ref decoration (`%D`), empty when the commit carries none
    pub refs: String,
    /// Base URL a link is built from by appending the identifier
    pub origin: Option<String>,
}

impl CommitRecord {
    /// Check if the commit is decorated with any ref
    #[must_use]
    pub fn has_refs(&self) -> bool {
        !self.refs.is_empty()
    }

    /// Build the clickable link `origin + identifier`
    ///
    /// Returns `None` when no (or an empty) origin was attached.
    #[must_use]
    pub fn link(&self) -> Option<String> {
        match self.origin.as_deref() {
            Some(origin) if !origin.is_empty() => Some(format!("{origin}{}", self.identifier)),
            _ => None,
        }
    }
}

/// A named batch of commit records for one observed path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Observed path, relative to the repository root
    pub name: String,
    /// New commits for this path, in display order
    pub commits: Vec<CommitRecord>,
    /// Why this path could not be read during the cycle, if it failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Observation {
    /// Create an observation for a successfully read path
    #[must_use]
    pub fn new(name: impl Into<String>, commits: Vec<CommitRecord>) -> Self {
        Self {
            name: name.into(),
            commits,
            error: None,
        }
    }

    /// Create an empty observation flagged with the failure that emptied it
    #[must_use]
    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commits: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Check if no commit was surfaced for this path
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Check if reading this path failed
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Check if a batch carries no commit at all
///
/// True for an empty slice and for a slice whose observations are all empty.
#[must_use]
pub fn observations_empty(observations: &[Observation]) -> bool {
    observations.iter().all(Observation::is_empty)
}
