//! git-observer: report new commits in folders of a git repository
//!
//! By default the binary polls the repository once a minute and prints every
//! commit it has not reported before. `once` runs a single cycle and `show`
//! prints the details of one commit.

use std::io;

use anyhow::Context;
use clap::Parser;
use git_observer::console::{self, OutputFormat};
use git_observer::{Aggregator, Cli, Command, ObserverEvent, ObserverWorker};
use observer_log::ShowDetail;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so the feed on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(cli.log_level().into()),
        )
        .with_writer(io::stderr)
        .init();

    let config = cli.validate().context("Invalid configuration")?;
    config.log_summary();

    let source = cli
        .log_source(&config)
        .context("Could not create log source")?;
    let mut aggregator = Aggregator::new(&config, source);
    let format = OutputFormat::from_json_flag(cli.json);

    match cli.command() {
        Command::Watch => watch(aggregator, &cli, format).await,
        Command::Once => {
            let observations = tokio::task::spawn_blocking(move || aggregator.collect())
                .await
                .context("Aggregation cycle failed")?;
            console::write_observations(&mut io::stdout().lock(), observations, format)
                .context("Could not write observations")
        }
        Command::Show { identifier, medium } => {
            let detail = if medium {
                ShowDetail::Medium
            } else {
                ShowDetail::Fuller
            };
            let commit = identifier.clone();
            let text = tokio::task::spawn_blocking(move || aggregator.show(&commit, detail))
                .await
                .context("Commit lookup failed")?
                .with_context(|| format!("Could not show commit {identifier}"))?;
            println!("{}", text.trim_end());
            Ok(())
        }
    }
}

/// Run the worker until Ctrl-C or SIGTERM
async fn watch(aggregator: Aggregator, cli: &Cli, format: OutputFormat) -> anyhow::Result<()> {
    let mut worker = ObserverWorker::new(aggregator, cli.schedule());
    worker.subscribe(move |event| {
        if let ObserverEvent::Status { message, .. } = event {
            debug!(status = %message, "Observer status");
        }
        if let Err(err) = console::write_event(&mut io::stdout().lock(), event, format) {
            error!(error = %err, "Could not write to stdout");
        }
    });

    worker.start().context("Could not start observer worker")?;
    shutdown_signal().await;
    info!("Shutting down");
    worker.shutdown().await;
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            error!(error = %err, "Could not listen for SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
