//! Configuration for git-observer
//!
//! [`Configuration`] is what the observation pipeline consumes. [`Cli`] is the
//! command-line surface that produces it, with environment variable
//! fallbacks for every option.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use observer_log::{FixtureSource, GitCli, LogSource, SortOrder, SourceError};
use serde::Serialize;
use tracing::info;

use crate::worker::Schedule;

/// Settings the observation pipeline runs with
///
/// Built once and handed to the aggregator; the pipeline never mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Configuration {
    /// Base URL a commit link is built from (`origin + identifier`)
    pub origin: String,
    /// Root of the git working tree
    pub repository_root: PathBuf,
    /// Sub-paths to observe, in reporting order
    pub observed_paths: Vec<String>,
    /// Committer names to hide; `None` hides nobody
    pub ignored_authors: Option<Vec<String>>,
    /// List the most recent commit first
    pub descending: bool,
    /// Read a fixture instead of running git
    pub is_test_mode: bool,
    /// Fixture replayed in test mode
    pub fixture: Option<PathBuf>,
}

impl Configuration {
    /// Observe the whole repository at `root`
    #[must_use]
    pub fn new(repository_root: impl Into<PathBuf>) -> Self {
        Self {
            repository_root: repository_root.into(),
            observed_paths: vec![".".to_string()],
            ..Default::default()
        }
    }

    /// Sort order derived from the `descending` flag
    #[must_use]
    pub fn sort_order(&self) -> SortOrder {
        SortOrder::from_descending(self.descending)
    }

    /// Origin to attach to parsed records, if one is configured
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        Some(self.origin.as_str()).filter(|o| !o.is_empty())
    }

    /// Log the effective settings; silent in test mode
    pub fn log_summary(&self) {
        if self.is_test_mode {
            return;
        }
        info!(origin = %self.origin, "Origin");
        info!(root = %self.repository_root.display(), "Git root");
        info!(descending = self.descending, "Descending");
        if !self.observed_paths.is_empty() {
            info!(paths = %self.observed_paths.join(", "), "Observed folders");
        }
        if let Some(ignored) = self.ignored_authors.as_ref().filter(|i| !i.is_empty()) {
            info!(authors = %ignored.join(", "), "Ignored authors");
        }
    }
}

/// Git Observer - report new commits in folders of a git repository
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "git-observer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run (defaults to the continuous console feed)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Base URL used to build commit links, e.g. https://github.com/org/repo/commit/
    #[arg(short, long, env = "GIT_OBSERVER_ORIGIN")]
    pub origin: Option<String>,

    /// Root of the git repository to observe
    ///
    /// Defaults to the current working directory.
    #[arg(short, long, env = "GIT_OBSERVER_REPOSITORY")]
    pub repository: Option<PathBuf>,

    /// Folder to observe, relative to the repository root (repeatable)
    ///
    /// Defaults to the whole repository.
    #[arg(
        short,
        long = "path",
        value_name = "FOLDER",
        env = "GIT_OBSERVER_PATHS",
        value_delimiter = ','
    )]
    pub paths: Vec<String>,

    /// Committer name whose commits are hidden (repeatable)
    #[arg(
        short,
        long = "ignore",
        value_name = "AUTHOR",
        env = "GIT_OBSERVER_IGNORE",
        value_delimiter = ','
    )]
    pub ignore: Vec<String>,

    /// List the most recent commit first
    #[arg(short, long, default_value = "false")]
    pub descending: bool,

    /// Replay a fixture file instead of running git
    #[arg(long, default_value = "false", requires = "fixture")]
    pub test_mode: bool,

    /// Fixture file with one `author|date|message|identifier|refs` line per commit
    #[arg(long, env = "GIT_OBSERVER_FIXTURE")]
    pub fixture: Option<PathBuf>,

    /// Seconds between two aggregation cycles
    #[arg(long, value_name = "SECONDS", env = "GIT_OBSERVER_INTERVAL")]
    pub interval: Option<u64>,

    /// Git executable to run
    #[arg(long, value_name = "PROGRAM", env = "GIT_OBSERVER_GIT")]
    pub git: Option<PathBuf>,

    /// Print each batch as one JSON object per line
    #[arg(long, default_value = "false")]
    pub json: bool,

    /// Enable verbose logging (debug level)
    ///
    /// Logs are written to stderr so they never mix with the feed.
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,

    /// Quiet mode - suppress info-level logs
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq, Default)]
pub enum Command {
    /// Poll continuously and print new commits as they appear
    #[default]
    Watch,

    /// Run a single aggregation cycle, print it and exit
    Once,

    /// Print the details of one commit
    Show {
        /// Commit identifier (hash or abbreviated hash)
        identifier: String,

        /// Use the shorter `medium` layout instead of `fuller`
        #[arg(long, default_value = "false")]
        medium: bool,
    },
}

impl Cli {
    /// Default seconds between aggregation cycles
    pub const DEFAULT_INTERVAL_SECS: u64 = 60;

    /// Subcommand to run, defaulting to [`Command::Watch`]
    #[must_use]
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or_default()
    }

    /// Schedule for the background worker
    #[must_use]
    pub fn schedule(&self) -> Schedule {
        let secs = self.interval.unwrap_or(Self::DEFAULT_INTERVAL_SECS).max(1);
        Schedule {
            interval: Duration::from_secs(secs),
            ..Schedule::default()
        }
    }

    /// Get the log level based on verbose/quiet flags
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }

    /// Validate the arguments and build the pipeline configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The repository root doesn't exist or isn't a directory (outside test mode)
    /// - Test mode is requested without an existing fixture file
    /// - The current directory is needed but cannot be determined
    pub fn validate(&self) -> Result<Configuration, ConfigError> {
        let repository_root = match self.repository {
            Some(ref root) => root.clone(),
            None => std::env::current_dir().map_err(ConfigError::CurrentDirectory)?,
        };

        if self.test_mode {
            match self.fixture {
                None => return Err(ConfigError::FixtureRequired),
                Some(ref fixture) if !fixture.is_file() => {
                    return Err(ConfigError::FixtureNotFound(fixture.clone()));
                }
                Some(_) => {}
            }
        } else {
            if !repository_root.exists() {
                return Err(ConfigError::RepositoryNotFound(repository_root));
            }
            if !repository_root.is_dir() {
                return Err(ConfigError::RepositoryNotDirectory(repository_root));
            }
        }

        let observed_paths = if self.paths.is_empty() {
            vec![".".to_string()]
        } else {
            self.paths.clone()
        };
        let ignored_authors = Some(self.ignore.clone()).filter(|i| !i.is_empty());

        Ok(Configuration {
            origin: self.origin.clone().unwrap_or_default(),
            repository_root,
            observed_paths,
            ignored_authors,
            descending: self.descending,
            is_test_mode: self.test_mode,
            fixture: self.fixture.clone(),
        })
    }

    /// Build the log source the configuration asks for
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Fixture`] if the test-mode fixture cannot be read.
    pub fn log_source(&self, config: &Configuration) -> Result<Box<dyn LogSource>, SourceError> {
        if config.is_test_mode {
            return match config.fixture {
                Some(ref path) => Ok(Box::new(FixtureSource::from_file(path)?)),
                None => Ok(Box::new(FixtureSource::from_bytes(Vec::new()))),
            };
        }
        let mut git = GitCli::new(&config.repository_root);
        if let Some(ref program) = self.git {
            git = git.with_program(program);
        }
        Ok(Box::new(git))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Repository root not found
    #[error("Repository root not found: {0}")]
    RepositoryNotFound(PathBuf),

    /// Repository root is not a directory
    #[error("Repository root is not a directory: {0}")]
    RepositoryNotDirectory(PathBuf),

    /// Test mode without a fixture
    #[error("Test mode needs a fixture file (--fixture)")]
    FixtureRequired,

    /// Fixture file not found
    #[error("Fixture file not found: {0}")]
    FixtureNotFound(PathBuf),

    /// Current directory unavailable
    #[error("Cannot determine the current directory: {0}")]
    CurrentDirectory(std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_default_cli() {
        let cli = Cli::default();
        assert!(cli.command.is_none());
        assert!(cli.repository.is_none());
        assert!(cli.paths.is_empty());
        assert!(!cli.descending);
        assert!(!cli.test_mode);
        assert_eq!(cli.command(), Command::Watch);
    }

    #[test]
    fn test_schedule_default_interval() {
        let cli = Cli::default();
        assert_eq!(cli.schedule().interval, Duration::from_secs(60));
    }

    #[test]
    fn test_schedule_custom_interval() {
        let cli = Cli {
            interval: Some(5),
            ..Default::default()
        };
        assert_eq!(cli.schedule().interval, Duration::from_secs(5));

        let zero = Cli {
            interval: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.schedule().interval, Duration::from_secs(1));
    }

    #[test]
    fn test_log_level_default() {
        assert_eq!(Cli::default().log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_log_level_verbose() {
        let cli = Cli {
            verbose: true,
            ..Default::default()
        };
        assert_eq!(cli.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_log_level_quiet() {
        let cli = Cli {
            quiet: true,
            ..Default::default()
        };
        assert_eq!(cli.log_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_validate_defaults_to_whole_repository() {
        let cli = Cli {
            repository: Some(std::env::temp_dir()),
            ..Default::default()
        };
        let config = cli.validate().expect("temp dir exists");
        assert_eq!(config.observed_paths, vec![".".to_string()]);
        assert_eq!(config.ignored_authors, None);
        assert_eq!(config.origin(), None);
        assert!(!config.is_test_mode);
    }

    #[test]
    fn test_validate_nonexistent_repository() {
        let cli = Cli {
            repository: Some(PathBuf::from("/nonexistent/path/12345")),
            ..Default::default()
        };
        assert!(matches!(
            cli.validate(),
            Err(ConfigError::RepositoryNotFound(_))
        ));
    }

    #[test]
    fn test_validate_test_mode_requires_fixture() {
        let cli = Cli {
            test_mode: true,
            ..Default::default()
        };
        assert!(matches!(cli.validate(), Err(ConfigError::FixtureRequired)));

        let cli = Cli {
            test_mode: true,
            fixture: Some(PathBuf::from("/nonexistent/gitlog-dummy.txt")),
            ..Default::default()
        };
        assert!(matches!(cli.validate(), Err(ConfigError::FixtureNotFound(_))));
    }

    #[test]
    fn test_validate_keeps_paths_and_ignore_list() {
        let cli = Cli {
            repository: Some(std::env::temp_dir()),
            paths: vec!["src".to_string(), "docs".to_string()],
            ignore: vec!["otto.mustermann".to_string()],
            descending: true,
            origin: Some("https://example.com/commit/".to_string()),
            ..Default::default()
        };
        let config = cli.validate().expect("valid");
        assert_eq!(config.observed_paths, vec!["src".to_string(), "docs".to_string()]);
        assert_eq!(
            config.ignored_authors,
            Some(vec!["otto.mustermann".to_string()])
        );
        assert_eq!(config.sort_order(), SortOrder::Descending);
        assert_eq!(config.origin(), Some("https://example.com/commit/"));
    }

    #[test]
    fn test_configuration_new() {
        let config = Configuration::new("/repo");
        assert_eq!(config.repository_root, PathBuf::from("/repo"));
        assert_eq!(config.observed_paths, vec![".".to_string()]);
        assert_eq!(config.sort_order(), SortOrder::Ascending);
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        <Cli as CommandFactory>::command().debug_assert();
    }
}
