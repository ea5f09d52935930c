// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Log line parsing
//!
//! Every line produced by the log source has the shape
//! `author|date|message|identifier|[refs]`, matching the
//! `--pretty=format:%cn|%cI|%s|%h|%D` placeholder string. Parsing is a pure
//! function of the line; blank lines yield no record.

use chrono::{DateTime, FixedOffset};

use crate::commit::CommitRecord;
use crate::error::ParseError;

/// Field separator of the custom log format
pub const FIELD_DELIMITER: char = '|';

/// Minimum number of fields (refs may be omitted entirely)
const MIN_FIELDS: usize = 4;

/// `%ci` style timestamps, accepted next to strict ISO 8601 (`%cI`)
const SPACED_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Parse one log line into a commit record
///
/// `origin` is attached to the record unchanged.
///
/// Returns `Ok(None)` for a blank line. A line wrapped in one pair of double
/// quotes (left behind when the `--pretty` argument was quoted for a shell) is
/// unwrapped first. When a summary contains the delimiter itself the line has
/// more than five fields; the identifier and refs are then taken from the
/// right so the summary keeps its pipes.
///
/// # Errors
///
/// Returns a [`ParseError`] when a non-blank line has fewer than four fields,
/// an unparseable date, or an empty identifier.
pub fn parse_line(line: &str, origin: Option<&str>) -> Result<Option<CommitRecord>, ParseError> {
    let line = unquote(line.trim_end_matches(['\r', '\n']));
    if line.trim().is_empty() {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if fields.len() < MIN_FIELDS {
        return Err(ParseError::Format {
            line: line.to_string(),
            fields: fields.len(),
        });
    }

    let (summary, identifier, refs) = match fields.len() {
        MIN_FIELDS => (fields[2].to_string(), fields[3], ""),
        n => (fields[2..n - 2].join("|"), fields[n - 2], fields[n - 1]),
    };

    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(ParseError::MissingIdentifier {
            line: line.to_string(),
        });
    }

    Ok(Some(CommitRecord {
        author: fields[0].to_string(),
        timestamp: parse_date(fields[1])?,
        summary,
        identifier: identifier.to_string(),
        refs: refs.to_string(),
        origin: origin.map(str::to_string),
    }))
}

/// Parse a whole block of log output, skipping blank lines
///
/// # Errors
///
/// Returns the first [`ParseError`] encountered.
pub fn parse_log(output: &str, origin: Option<&str>) -> Result<Vec<CommitRecord>, ParseError> {
    let mut records = Vec::new();
    for line in output.lines() {
        if let Some(record) = parse_line(line, origin)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Parse an ISO 8601 timestamp that carries an explicit UTC offset
///
/// # Errors
///
/// Returns [`ParseError::InvalidDate`] if neither accepted shape matches.
pub fn parse_date(value: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .or_else(|rfc_err| {
            DateTime::parse_from_str(value, SPACED_DATE_FORMAT).map_err(|_| rfc_err)
        })
        .map_err(|source| ParseError::InvalidDate {
            value: value.to_string(),
            source,
        })
}

fn unquote(line: &str) -> &str {
    line.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(line)
}
