// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Log sources
//!
//! A [`LogSource`] answers the three questions the observer asks a repository:
//! sync with the remotes (`fetch --all`), list recent commits below a path
//! (`log`), and describe one commit (`show`). [`GitCli`] shells out to the
//! installed `git`; [`FixtureSource`] replays a fixed byte stream so parsing
//! and filtering can be exercised without a repository.
//!
//! A source handed a [`CancelFlag`] gives up once it is set: [`GitCli`] kills
//! the git process it is waiting on, and [`LogStream`] stops yielding lines.

use std::fmt;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cancel::{CANCEL_POLL, CancelFlag};
use crate::error::SourceError;
use crate::parser::parse_line;

/// Lookback window handed to `git log --since`
pub const DEFAULT_SINCE: &str = "1 week ago";

/// Placeholder string producing `author|date|message|identifier|refs`
pub const LOG_FORMAT: &str = "%cn|%cI|%s|%h|%D";

/// Order in which an observation lists its commits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest commit first
    #[default]
    Ascending,
    /// Most recent commit first
    Descending,
}

impl SortOrder {
    /// Map the configuration's `descending` flag
    #[must_use]
    pub fn from_descending(descending: bool) -> Self {
        if descending {
            Self::Descending
        } else {
            Self::Ascending
        }
    }

    /// Check if the most recent commit comes first
    #[must_use]
    pub fn is_descending(self) -> bool {
        self == Self::Descending
    }

    /// The `git log` ordering flag for this order
    ///
    /// `Descending` keeps git's newest-first output under `--date-order`;
    /// `Ascending` asks for `--reverse` so git emits oldest first.
    #[must_use]
    pub fn git_flag(self) -> &'static str {
        match self {
            Self::Descending => "--date-order",
            Self::Ascending => "--reverse",
        }
    }
}

/// Level of detail for `git show`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowDetail {
    /// `--pretty=medium`: author, date and full message
    Medium,
    /// `--pretty=fuller`: author and committer with both dates
    #[default]
    Fuller,
}

impl ShowDetail {
    fn pretty_arg(self) -> &'static str {
        match self {
            Self::Medium => "--pretty=medium",
            Self::Fuller => "--pretty=fuller",
        }
    }
}

/// Builds argument lists for git invocations scoped to one repository
///
/// Every invocation carries `--git-dir=<root>/.git/` and
/// `--work-tree=<root>` so the observer can run from any directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommand {
    root: PathBuf,
    since: String,
}

impl GitCommand {
    /// Create a command builder for the repository at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            since: DEFAULT_SINCE.to_string(),
        }
    }

    /// Override the lookback window
    #[must_use]
    pub fn with_since(mut self, since: impl Into<String>) -> Self {
        self.since = since.into();
        self
    }

    /// Repository root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lookback window
    #[must_use]
    pub fn since(&self) -> &str {
        &self.since
    }

    fn location_args(&self) -> Vec<String> {
        let root = self.root.display();
        vec![format!("--git-dir={root}/.git/"), format!("--work-tree={root}")]
    }

    /// Arguments for `git fetch --all`
    #[must_use]
    pub fn fetch_args(&self) -> Vec<String> {
        let mut args = self.location_args();
        args.extend(["fetch".to_string(), "--all".to_string()]);
        args
    }

    /// Arguments for listing recent commits below `path`
    #[must_use]
    pub fn log_args(&self, path: &str, order: SortOrder) -> Vec<String> {
        let mut args = self.location_args();
        args.extend([
            "log".to_string(),
            format!("--since={}", self.since),
            format!("--pretty=format:{LOG_FORMAT}"),
            "--all".to_string(),
            order.git_flag().to_string(),
            format!("{}/{path}", self.root.display()),
        ]);
        args
    }

    /// Arguments for describing a single commit
    #[must_use]
    pub fn show_args(&self, identifier: &str, detail: ShowDetail) -> Vec<String> {
        let mut args = self.location_args();
        args.extend([
            "show".to_string(),
            detail.pretty_arg().to_string(),
            "-s".to_string(),
            identifier.to_string(),
        ]);
        args
    }
}

/// A repository the observer can read commits from
pub trait LogSource: Send {
    /// Sync remote-tracking refs
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the sync could not be performed.
    fn fetch(&self) -> Result<(), SourceError>;

    /// Stream recent log lines for `path`
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the log cannot be produced at all.
    fn log(&self, path: &str, order: SortOrder) -> Result<LogStream, SourceError>;

    /// Describe one commit
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the commit cannot be described.
    fn show(&self, identifier: &str, detail: ShowDetail) -> Result<String, SourceError>;

    /// Abandon work in flight once `cancel` is set
    ///
    /// The default ignores the flag.
    fn set_cancel(&mut self, _cancel: CancelFlag) {}
}

type SharedChild = Arc<Mutex<Option<Child>>>;

fn lock_child(child: &SharedChild) -> MutexGuard<'_, Option<Child>> {
    child.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Line stream produced by a [`LogSource`]
///
/// Owns whatever backs the stream. Dropping a stream that still has a child
/// process attached kills and reaps that process; call [`LogStream::finish`]
/// to wait for a normal exit and learn its status instead.
///
/// With a [`CancelFlag`] attached, a child process is killed as soon as the
/// flag is set, even while a read is blocked on it.
pub struct LogStream {
    reader: Box<dyn BufRead + Send>,
    child: Option<SharedChild>,
    cancel: Option<CancelFlag>,
    command: String,
    lines_read: usize,
}

impl LogStream {
    /// Stream lines from an in-memory or file reader
    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            child: None,
            cancel: None,
            command: String::new(),
            lines_read: 0,
        }
    }

    /// Stop yielding lines once `cancel` is set
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn from_child(
        mut child: Child,
        command: String,
        cancel: Option<CancelFlag>,
    ) -> Result<Self, SourceError> {
        let stdout = child.stdout.take().ok_or_else(|| {
            SourceError::Io(io::Error::other("child process has no stdout pipe"))
        })?;
        let child = Arc::new(Mutex::new(Some(child)));
        if let Some(cancel) = &cancel {
            kill_on_cancel(&child, cancel.clone());
        }
        Ok(Self {
            reader: Box::new(BufReader::new(stdout)),
            child: Some(child),
            cancel,
            command,
            lines_read: 0,
        })
    }

    fn check_cancelled(&self) -> Result<(), SourceError> {
        if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            return Err(SourceError::Cancelled);
        }
        Ok(())
    }

    /// Read the next line without its terminator
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if reading fails and
    /// [`SourceError::Cancelled`] once the stream's flag is set.
    pub fn next_line(&mut self) -> Result<Option<String>, SourceError> {
        self.check_cancelled()?;
        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            // A killed child also ends in EOF
            self.check_cancelled()?;
            return Ok(None);
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        if !buf.is_empty() {
            self.lines_read += 1;
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Number of non-empty lines read so far
    #[must_use]
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    /// Drain the stream and reap the process behind it, if any
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Exit`] if the process exited abnormally
    /// without producing any output, and [`SourceError::Cancelled`] if the
    /// stream's flag was set.
    pub fn finish(mut self) -> Result<usize, SourceError> {
        io::copy(&mut self.reader, &mut io::sink())?;
        self.check_cancelled()?;
        let child = self.child.as_ref().and_then(|child| lock_child(child).take());
        if let Some(mut child) = child {
            let status = child.wait()?;
            if !status.success() {
                if self.lines_read == 0 {
                    return Err(SourceError::Exit {
                        command: self.command.clone(),
                        status,
                    });
                }
                warn!(command = %self.command, %status, "git exited abnormally after producing output");
            }
        }
        Ok(self.lines_read)
    }
}

impl Iterator for LogStream {
    type Item = Result<String, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}

impl fmt::Debug for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStream")
            .field("command", &self.command)
            .field("has_child", &self.child.is_some())
            .field("cancellable", &self.cancel.is_some())
            .field("lines_read", &self.lines_read)
            .finish()
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        let child = self.child.take();
        if let Some(mut child) = child.as_ref().and_then(|child| lock_child(child).take()) {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Kill the process in `child` once `cancel` is set
///
/// The watcher thread exits when the owning stream drops its handle.
fn kill_on_cancel(child: &SharedChild, cancel: CancelFlag) {
    let child = Arc::clone(child);
    let spawned = thread::Builder::new()
        .name("git-log-cancel".to_string())
        .spawn(move || {
            while Arc::strong_count(&child) > 1 {
                if cancel.is_cancelled() {
                    if let Some(process) = lock_child(&child).as_mut() {
                        debug!(pid = process.id(), "Killing git after cancellation");
                        let _ = process.kill();
                    }
                    return;
                }
                thread::sleep(CANCEL_POLL);
            }
        });
    if let Err(err) = spawned {
        warn!(error = %err, "Could not watch git process for cancellation");
    }
}

/// Wait for `child`, killing it if `cancel` is set first
fn wait_or_kill(child: &mut Child, cancel: &CancelFlag) -> Result<ExitStatus, SourceError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if cancel.is_cancelled() {
            debug!(pid = child.id(), "Killing git after cancellation");
            let _ = child.kill();
            let _ = child.wait();
            return Err(SourceError::Cancelled);
        }
        thread::sleep(CANCEL_POLL);
    }
}

/// Log source backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    command: GitCommand,
    cancel: Option<CancelFlag>,
}

impl GitCli {
    /// Use `git` from `PATH` against the repository at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("git"),
            command: GitCommand::new(root),
            cancel: None,
        }
    }

    /// Use a specific git executable
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Use a custom command builder (e.g. a different lookback window)
    #[must_use]
    pub fn with_command(mut self, command: GitCommand) -> Self {
        self.command = command;
        self
    }

    /// Kill running git processes once `cancel` is set
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// The command builder in use
    #[must_use]
    pub fn command(&self) -> &GitCommand {
        &self.command
    }

    fn render(&self, args: &[String]) -> String {
        format!("{} {}", self.program.display(), args.join(" "))
    }

    fn unavailable(&self, source: io::Error) -> SourceError {
        SourceError::Unavailable {
            program: self.program.display().to_string(),
            source,
        }
    }
}

impl LogSource for GitCli {
    fn fetch(&self) -> Result<(), SourceError> {
        let args = self.command.fetch_args();
        debug!(command = %self.render(&args), "Running git fetch");
        // Never block on a credential prompt
        let mut child = Command::new(&self.program)
            .args(&args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| self.unavailable(e))?;
        let status = match &self.cancel {
            Some(cancel) => wait_or_kill(&mut child, cancel)?,
            None => child.wait()?,
        };
        if status.success() {
            Ok(())
        } else {
            Err(SourceError::Exit {
                command: self.render(&args),
                status,
            })
        }
    }

    fn log(&self, path: &str, order: SortOrder) -> Result<LogStream, SourceError> {
        let args = self.command.log_args(path, order);
        let rendered = self.render(&args);
        debug!(command = %rendered, "Running git log");
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| self.unavailable(e))?;
        LogStream::from_child(child, rendered, self.cancel.clone())
    }

    fn show(&self, identifier: &str, detail: ShowDetail) -> Result<String, SourceError> {
        let args = self.command.show_args(identifier, detail);
        debug!(command = %self.render(&args), "Running git show");
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.unavailable(e))?;
        if !output.status.success() && output.stdout.is_empty() {
            return Err(SourceError::Exit {
                command: self.render(&args),
                status: output.status,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn set_cancel(&mut self, cancel: CancelFlag) {
        self.cancel = Some(cancel);
    }
}

/// Log source replaying a fixed byte stream for every path
///
/// `fetch` does nothing and `show` renders the matching fixture line, so no
/// git installation or repository is needed.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    content: Arc<[u8]>,
}

impl FixtureSource {
    /// Serve the given bytes
    #[must_use]
    pub fn from_bytes(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: Arc::from(content.into()),
        }
    }

    /// Load the fixture file at `path` once and serve its bytes
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Fixture`] if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|source| SourceError::Fixture {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_bytes(content))
    }

    /// Raw fixture bytes
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

impl LogSource for FixtureSource {
    fn fetch(&self) -> Result<(), SourceError> {
        Ok(())
    }

    fn log(&self, _path: &str, _order: SortOrder) -> Result<LogStream, SourceError> {
        Ok(LogStream::from_reader(Cursor::new(Arc::clone(&self.content))))
    }

    fn show(&self, identifier: &str, detail: ShowDetail) -> Result<String, SourceError> {
        let text = String::from_utf8_lossy(&self.content);
        let record = text
            .lines()
            .filter_map(|line| parse_line(line, None).ok().flatten())
            .find(|record| record.identifier == identifier)
            .ok_or_else(|| {
                SourceError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("unknown revision '{identifier}'"),
                ))
            })?;

        let date = record.timestamp.format("%a %b %-d %H:%M:%S %Y %z");
        let header = match detail {
            ShowDetail::Medium => format!("Author: {}\nDate:   {date}\n", record.author),
            ShowDetail::Fuller => format!(
                "Author:     {author}\nAuthorDate: {date}\nCommit:     {author}\nCommitDate: {date}\n",
                author = record.author
            ),
        };
        Ok(format!(
            "commit {}\n{header}\n    {}\n",
            record.identifier, record.summary
        ))
    }
}
