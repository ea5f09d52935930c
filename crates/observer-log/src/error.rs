// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for observer-log

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// The line shape every log record must follow
pub const EXPECTED_SHAPE: &str = "author|date|message|identifier|[refs]";

/// Errors raised while turning one log line into a [`crate::CommitRecord`]
///
/// All variants are format errors: the line was non-empty but did not match
/// the expected shape. A blank line is never an error.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Wrong number of pipe-delimited fields
    #[error("Malformed log line (expected {EXPECTED_SHAPE}, found {fields} field(s)): {line}")]
    Format {
        /// The offending line
        line: String,
        /// Number of fields found after splitting
        fields: usize,
    },

    /// The date field is not an ISO 8601 timestamp with an offset
    #[error("Invalid commit date '{value}' (expected {EXPECTED_SHAPE}): {source}")]
    InvalidDate {
        /// The raw date field
        value: String,
        /// Underlying chrono error
        #[source]
        source: chrono::ParseError,
    },

    /// The identifier field is empty
    #[error("Missing commit identifier (expected {EXPECTED_SHAPE}): {line}")]
    MissingIdentifier {
        /// The offending line
        line: String,
    },
}

impl ParseError {
    /// Every parse error is a format violation of the log line
    #[must_use]
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::Format { .. } | Self::InvalidDate { .. } | Self::MissingIdentifier { .. }
        )
    }
}

/// Errors raised by a [`crate::source::LogSource`]
///
/// An empty log is not an error; these variants mean the source could not
/// deliver an answer at all.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The external program could not be started
    #[error("Could not run '{program}': {source}")]
    Unavailable {
        /// Program that was invoked
        program: String,
        /// Spawn error
        #[source]
        source: std::io::Error,
    },

    /// The external program exited abnormally without producing output
    #[error("'{command}' exited with {status}")]
    Exit {
        /// Rendered command line
        command: String,
        /// Exit status reported by the OS
        status: ExitStatus,
    },

    /// Reading the output stream failed
    #[error("IO error while reading log output: {0}")]
    Io(#[from] std::io::Error),

    /// The operation was abandoned through its [`crate::CancelFlag`]
    #[error("Cancelled")]
    Cancelled,

    /// The test fixture could not be loaded
    #[error("Could not read fixture {path}: {source}")]
    Fixture {
        /// Fixture path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}
