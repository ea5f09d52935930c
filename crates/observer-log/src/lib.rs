// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! observer-log: Git log reading and parsing for git-observer
//!
//! This library crate turns the output of a custom-formatted `git log` into
//! [`CommitRecord`]s and groups them into [`Observation`]s. It shells out to
//! the installed `git` rather than linking a git implementation.
//!
//! # Example
//!
//! ```no_run
//! use observer_log::{GitCli, LogSource, SortOrder, parse_line};
//!
//! let git = GitCli::new("/path/to/repo");
//! let stream = git.log("src", SortOrder::Descending).expect("run git log");
//!
//! for line in stream {
//!     let line = line.expect("read line");
//!     if let Some(c) = parse_line(&line, None).expect("parse line") {
//!         println!("{} - {}", c.identifier, c.summary);
//!     }
//! }
//! ```

#![warn(missing_docs)]

pub mod cancel;
pub mod commit;
pub mod error;
pub mod parser;
pub mod source;

pub use cancel::CancelFlag;
pub use commit::{CommitRecord, Observation, observations_empty};
pub use error::{ParseError, SourceError};
pub use parser::{parse_line, parse_log};
pub use source::{
    DEFAULT_SINCE, FixtureSource, GitCli, GitCommand, LogSource, LogStream, ShowDetail, SortOrder,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::commit::{CommitRecord, Observation};
    pub use crate::error::{ParseError, SourceError};
    pub use crate::parser::parse_line;
    pub use crate::source::{FixtureSource, GitCli, LogSource, SortOrder};
}
