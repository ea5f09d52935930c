// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Background observer worker
//!
//! The worker runs aggregation cycles on a fixed schedule inside a tokio
//! task. Each cycle executes on the blocking pool, since reading the log
//! source blocks on a child process. Between cycles the worker wakes every
//! poll tick so a stop request is honoured promptly, and publishes a
//! countdown status once per status period.
//!
//! State moves `Idle -> Running -> Stopping -> Stopped`; stopping an idle
//! worker goes straight to `Stopped`. A stop also sets the aggregator's
//! cancel flag, so a cycle in flight reads no further paths, any git process
//! it waits on is killed, and its progress is no longer published.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use observer_log::{CancelFlag, Observation, observations_empty};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::aggregate::Aggregator;
use crate::events::{EventChannel, ObserverEvent, SubscriptionId};

// ============================================================================
// Types
// ============================================================================

/// Lifecycle of an [`ObserverWorker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Created, not started
    Idle,
    /// Loop is active
    Running,
    /// Stop requested, loop not yet exited
    Stopping,
    /// Loop has exited; the worker cannot be restarted
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Timing of the worker loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Time between the starts of two aggregation cycles
    pub interval: Duration,
    /// How often the loop wakes to check for a stop request
    pub poll: Duration,
    /// How often the countdown status is published between cycles
    pub status_every: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            poll: Duration::from_millis(250),
            status_every: Duration::from_secs(1),
        }
    }
}

/// Worker errors
#[derive(Debug, Error)]
pub enum WorkerError {
    /// `start` was called on a worker that is not idle
    #[error("Worker cannot start from state '{0}'")]
    NotIdle(WorkerState),

    /// `start` was called outside a tokio runtime
    #[error("No tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

// ============================================================================
// Worker
// ============================================================================

/// Runs an [`Aggregator`] on a schedule and publishes the results
///
/// Batches with at least one new commit are published as
/// [`ObserverEvent::ObservationsReady`]; everything else the loop has to say
/// is published as [`ObserverEvent::Status`].
pub struct ObserverWorker {
    aggregator: Arc<Mutex<Aggregator>>,
    events: Arc<EventChannel<ObserverEvent>>,
    schedule: Schedule,
    state: Arc<watch::Sender<WorkerState>>,
    cancel: CancelFlag,
    handle: Option<JoinHandle<()>>,
}

impl ObserverWorker {
    /// Create an idle worker
    ///
    /// The aggregator's progress callback is replaced so that progress is
    /// published as status events on this worker's channel until the worker
    /// is stopped.
    #[must_use]
    pub fn new(mut aggregator: Aggregator, schedule: Schedule) -> Self {
        let events = Arc::new(EventChannel::new());
        let cancel = aggregator.cancel_flag();
        let progress_events = Arc::clone(&events);
        let progress_cancel = cancel.clone();
        aggregator.set_progress(Box::new(move |event| {
            if !progress_cancel.is_cancelled() {
                progress_events.publish(&ObserverEvent::status(event.to_string()));
            }
        }));

        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            aggregator: Arc::new(Mutex::new(aggregator)),
            events,
            schedule,
            state: Arc::new(state),
            cancel,
            handle: None,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Schedule the worker runs on
    #[must_use]
    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Channel the worker publishes to
    #[must_use]
    pub fn events(&self) -> Arc<EventChannel<ObserverEvent>> {
        Arc::clone(&self.events)
    }

    /// Register an event handler
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ObserverEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    /// Remove an event handler; returns `false` if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Start the worker loop on the current tokio runtime
    ///
    /// The first cycle runs immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker is not idle or no runtime is
    /// available.
    pub fn start(&mut self) -> Result<(), WorkerError> {
        let runtime = tokio::runtime::Handle::try_current()?;

        let mut started = false;
        self.state.send_if_modified(|state| {
            if *state == WorkerState::Idle {
                *state = WorkerState::Running;
                started = true;
            }
            started
        });
        if !started {
            return Err(WorkerError::NotIdle(self.state()));
        }

        info!(interval_secs = self.schedule.interval.as_secs(), "Starting observer worker");
        self.handle = Some(runtime.spawn(run_loop(
            Arc::clone(&self.aggregator),
            Arc::clone(&self.events),
            self.schedule,
            Arc::clone(&self.state),
        )));
        Ok(())
    }

    /// Request the loop to stop
    ///
    /// Returns immediately. A cycle in flight is abandoned and cancelled;
    /// the loop exits within one poll tick. Stopping an idle worker marks it
    /// stopped.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.state.send_if_modified(|state| match *state {
            WorkerState::Running => {
                *state = WorkerState::Stopping;
                true
            }
            WorkerState::Idle => {
                *state = WorkerState::Stopped;
                true
            }
            WorkerState::Stopping | WorkerState::Stopped => false,
        });
    }

    /// Wait for the loop task to exit
    ///
    /// Returns at once if the worker was never started.
    pub async fn join(&mut self) {
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle.await
        {
            error!(error = %err, "Observer worker task failed");
            self.state.send_replace(WorkerState::Stopped);
        }
    }

    /// Stop the worker and wait for the loop to exit
    pub async fn shutdown(&mut self) {
        self.stop();
        self.join().await;
    }

    /// Run one aggregation cycle on the calling thread
    ///
    /// The batch is returned instead of published; progress still goes out
    /// as status events. After a stop the batch is empty.
    pub fn run_once(&self) -> Vec<Observation> {
        self.aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .collect()
    }
}

impl Drop for ObserverWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for ObserverWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverWorker")
            .field("state", &self.state())
            .field("schedule", &self.schedule)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Loop
// ============================================================================

async fn run_loop(
    aggregator: Arc<Mutex<Aggregator>>,
    events: Arc<EventChannel<ObserverEvent>>,
    schedule: Schedule,
    state: Arc<watch::Sender<WorkerState>>,
) {
    let mut stop = state.subscribe();
    let mut ticker = tokio::time::interval(schedule.poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut next_run = Instant::now();
    let mut next_status = next_run;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.changed() => {}
        }
        if *stop.borrow_and_update() != WorkerState::Running {
            break;
        }

        let now = Instant::now();
        if now >= next_run {
            if !run_cycle(&aggregator, &events, &mut stop).await {
                break;
            }
            next_run = now + schedule.interval;
            next_status = Instant::now();
        } else if now >= next_status {
            events.publish(&ObserverEvent::status(countdown(next_run - now)));
            next_status = now + schedule.status_every;
        }
    }

    state.send_replace(WorkerState::Stopped);
    info!("Observer worker stopped");
}

/// Run one cycle on the blocking pool, racing it against a stop request
///
/// Returns `false` if the loop should exit.
async fn run_cycle(
    aggregator: &Arc<Mutex<Aggregator>>,
    events: &EventChannel<ObserverEvent>,
    stop: &mut watch::Receiver<WorkerState>,
) -> bool {
    let aggregator = Arc::clone(aggregator);
    let cycle = tokio::task::spawn_blocking(move || {
        aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .collect()
    });

    let result = tokio::select! {
        result = cycle => result,
        () = stop_requested(stop) => {
            info!("Stop requested, abandoning aggregation cycle");
            return false;
        }
    };
    // A stop may land while the cycle returns
    if *stop.borrow() != WorkerState::Running {
        return false;
    }

    match result {
        Ok(observations) if observations_empty(&observations) => {
            debug!("No new commits");
        }
        Ok(observations) => {
            events.publish(&ObserverEvent::observations(observations));
        }
        Err(err) => {
            error!(error = %err, "Aggregation cycle failed");
            events.publish(&ObserverEvent::status(format!("cycle failed: {err}")));
        }
    }
    true
}

/// Resolve once the state leaves `Running`
async fn stop_requested(stop: &mut watch::Receiver<WorkerState>) {
    let _ = stop.wait_for(|state| *state != WorkerState::Running).await;
}

/// `waiting, next run in MM:SS`
fn countdown(remaining: Duration) -> String {
    let secs = remaining.as_secs_f64().ceil() as u64;
    format!("waiting, next run in {:02}:{:02}", secs / 60, secs % 60)
}
