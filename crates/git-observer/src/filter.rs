// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Dedup and author filtering
//!
//! The filter remembers every identifier it has ever seen, so a commit is
//! surfaced at most once for the lifetime of the filter, across all observed
//! paths. Identifiers are remembered before the ignore list is consulted, so
//! a commit by an ignored author is still known.

use std::collections::HashSet;

use observer_log::{CommitRecord, SortOrder};

use crate::config::Configuration;

/// Stateful filter applied to every parsed batch
#[derive(Debug, Clone, Default)]
pub struct CommitFilter {
    known: HashSet<String>,
    ignored: Option<Vec<String>>,
    order: SortOrder,
}

impl CommitFilter {
    /// Create a filter with an empty known set
    #[must_use]
    pub fn new(ignored: Option<Vec<String>>, order: SortOrder) -> Self {
        Self {
            known: HashSet::new(),
            ignored,
            order,
        }
    }

    /// Create a filter from the ignore list and sort flag of `config`
    #[must_use]
    pub fn from_config(config: &Configuration) -> Self {
        Self::new(config.ignored_authors.clone(), config.sort_order())
    }

    /// Remember every new identifier, drop known and ignored commits, and
    /// order the rest
    ///
    /// A commit whose identifier is already known is skipped, including a
    /// repeat inside `commits` itself. An ignored commit is remembered too.
    /// The survivors are stably sorted by timestamp: oldest first for
    /// [`SortOrder::Ascending`], newest first for [`SortOrder::Descending`].
    /// Commits sharing a timestamp keep the order the source produced them in.
    pub fn apply(&mut self, commits: Vec<CommitRecord>) -> Vec<CommitRecord> {
        let mut accepted = Vec::with_capacity(commits.len());
        for commit in commits {
            if !self.known.insert(commit.identifier.clone()) {
                continue;
            }
            if !self.is_ignored(&commit.author) {
                accepted.push(commit);
            }
        }

        match self.order {
            SortOrder::Ascending => accepted.sort_by_key(|commit| commit.timestamp),
            SortOrder::Descending => accepted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        }
        accepted
    }

    /// Check if commits by `author` are hidden
    #[must_use]
    pub fn is_ignored(&self, author: &str) -> bool {
        self.ignored
            .as_ref()
            .is_some_and(|ignored| ignored.iter().any(|name| name == author))
    }

    /// Check if `identifier` has already been seen
    #[must_use]
    pub fn is_known(&self, identifier: &str) -> bool {
        self.known.contains(identifier)
    }

    /// Number of identifiers seen so far
    #[must_use]
    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    /// Order applied to accepted commits
    #[must_use]
    pub fn order(&self) -> SortOrder {
        self.order
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::DateTime;
    use proptest::prelude::*;

    fn commit_strategy() -> impl Strategy<Value = CommitRecord> {
        ("[a-c]", "[0-9a-f]{2}", 0i64..1_000_000i64).prop_map(|(author, identifier, ts)| {
            CommitRecord {
                author,
                timestamp: DateTime::from_timestamp(1_700_000_000 + ts, 0)
                    .expect("valid timestamp")
                    .fixed_offset(),
                summary: String::new(),
                identifier,
                refs: String::new(),
                origin: None,
            }
        })
    }

    proptest! {
        /// Property: an identifier is surfaced at most once across batches
        #[test]
        fn prop_identifier_surfaced_once(
            batches in proptest::collection::vec(
                proptest::collection::vec(commit_strategy(), 0..20),
                1..5,
            )
        ) {
            let mut filter = CommitFilter::default();
            let mut seen = HashSet::new();
            for batch in batches {
                for commit in filter.apply(batch) {
                    prop_assert!(seen.insert(commit.identifier));
                }
            }
            prop_assert_eq!(seen.len(), filter.known_count());
        }

        /// Property: ignored authors never pass, but every identifier is remembered
        #[test]
        fn prop_ignored_author_filtered(batch in proptest::collection::vec(commit_strategy(), 0..30)) {
            let mut filter = CommitFilter::new(Some(vec!["a".to_string()]), SortOrder::Ascending);
            let distinct: HashSet<String> = batch.iter().map(|c| c.identifier.clone()).collect();
            prop_assert!(filter.apply(batch).iter().all(|c| c.author != "a"));
            prop_assert_eq!(filter.known_count(), distinct.len());
        }

        /// Property: output is ordered by timestamp in the configured direction
        #[test]
        fn prop_output_is_ordered(
            batch in proptest::collection::vec(commit_strategy(), 0..30),
            descending in any::<bool>(),
        ) {
            let mut filter = CommitFilter::new(None, SortOrder::from_descending(descending));
            let accepted = filter.apply(batch);
            for pair in accepted.windows(2) {
                if descending {
                    prop_assert!(pair[0].timestamp >= pair[1].timestamp);
                } else {
                    prop_assert!(pair[0].timestamp <= pair[1].timestamp);
                }
            }
        }
    }
}
