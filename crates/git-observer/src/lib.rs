//! git-observer library
//!
//! This module exports the observation pipeline of git-observer for use in
//! integration tests and as a library: configuration, the dedup filter, the
//! aggregator, the event channel and the background worker.

pub mod aggregate;
pub mod config;
pub mod console;
pub mod events;
pub mod filter;
pub mod worker;

pub use aggregate::{Aggregator, CycleStats, ObserveError, ProgressEvent};
pub use config::{Cli, Command, ConfigError, Configuration};
pub use events::{EventChannel, ObserverEvent, SubscriptionId};
pub use filter::CommitFilter;
pub use worker::{ObserverWorker, Schedule, WorkerError, WorkerState};
