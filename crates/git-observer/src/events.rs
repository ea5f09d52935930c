// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Publish/subscribe channel for observer events
//!
//! Handlers are invoked synchronously, in subscription order, on the thread
//! that publishes. Handlers run outside the subscriber lock, so a handler may
//! subscribe or unsubscribe without deadlocking; such changes take effect
//! from the next publish.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use observer_log::Observation;
use serde::Serialize;
use tracing::error;

/// Event handler signature
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`EventChannel::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Synchronous fan-out of events to registered handlers
pub struct EventChannel<T> {
    handlers: Mutex<Vec<(SubscriptionId, Handler<T>)>>,
    next_id: AtomicU64,
}

impl<T> EventChannel<T> {
    /// Create a channel with no subscribers
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler; it receives every event published afterwards
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler
    ///
    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Deliver `event` to every current subscriber
    ///
    /// A panicking handler is logged and skipped; the remaining handlers
    /// still run. Returns the number of handlers invoked.
    pub fn publish(&self, event: &T) -> usize {
        let snapshot: Vec<Handler<T>> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!("Event handler panicked");
            }
        }
        snapshot.len()
    }

    /// Number of registered handlers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<T> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Events published by the observer worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ObserverEvent {
    /// A cycle surfaced at least one new commit
    ObservationsReady {
        /// When the batch was produced
        timestamp: DateTime<Utc>,
        /// One observation per observed path, in configuration order
        observations: Vec<Observation>,
    },
    /// Human-readable progress of the worker
    Status {
        /// When the status was produced
        timestamp: DateTime<Utc>,
        /// Status text
        message: String,
    },
}

impl ObserverEvent {
    /// Batch event stamped with the current time
    #[must_use]
    pub fn observations(observations: Vec<Observation>) -> Self {
        Self::ObservationsReady {
            timestamp: Utc::now(),
            observations,
        }
    }

    /// Status event stamped with the current time
    #[must_use]
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    /// Time the event was produced
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ObservationsReady { timestamp, .. } | Self::Status { timestamp, .. } => {
                *timestamp
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&String) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |name: &str| -> Box<dyn Fn(&String) + Send + Sync> {
            let sink = Arc::clone(&sink);
            let name = name.to_string();
            Box::new(move |event: &String| sink.lock().unwrap().push(format!("{name}:{event}")))
        };
        (log, make)
    }

    #[test]
    fn test_publish_reaches_subscribers_in_order() {
        let channel = EventChannel::<String>::new();
        let (log, make) = recorder();
        channel.subscribe(make("a"));
        channel.subscribe(make("b"));

        assert_eq!(channel.publish(&"hello".to_string()), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a:hello", "b:hello"]);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let channel: EventChannel<String> = EventChannel::default();
        assert_eq!(channel.publish(&"nobody".to_string()), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let channel = EventChannel::<String>::new();
        let (log, make) = recorder();
        let a = channel.subscribe(make("a"));
        channel.subscribe(make("b"));

        assert!(channel.unsubscribe(a));
        channel.publish(&"x".to_string());
        assert_eq!(*log.lock().unwrap(), vec!["b:x"]);
        assert_eq!(channel.subscriber_count(), 1);
    }

    #[test]
    fn test_unsubscribe_unknown_id() {
        let channel: EventChannel<String> = EventChannel::new();
        let id = channel.subscribe(|_| {});
        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
    }

    #[test]
    fn test_ids_are_unique() {
        let channel: EventChannel<String> = EventChannel::new();
        let a = channel.subscribe(|_| {});
        let b = channel.subscribe(|_| {});
        assert_ne!(a, b);
    }

    #[test]
    fn test_handler_may_unsubscribe_during_publish() {
        let channel = Arc::new(EventChannel::<String>::new());
        let own_id = Arc::new(Mutex::new(None));

        let inner_channel = Arc::clone(&channel);
        let inner_id = Arc::clone(&own_id);
        let id = channel.subscribe(move |_| {
            if let Some(id) = *inner_id.lock().unwrap() {
                inner_channel.unsubscribe(id);
            }
        });
        *own_id.lock().unwrap() = Some(id);

        assert_eq!(channel.publish(&"first".to_string()), 1);
        assert_eq!(channel.publish(&"second".to_string()), 0);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_others() {
        let channel = EventChannel::<String>::new();
        let (log, make) = recorder();
        channel.subscribe(|_: &String| panic!("handler failure"));
        channel.subscribe(make("b"));

        assert_eq!(channel.publish(&"x".to_string()), 2);
        assert_eq!(*log.lock().unwrap(), vec!["b:x"]);
    }

    #[test]
    fn test_event_json_shape() {
        let event = ObserverEvent::status("waiting");
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["event"], "status");
        assert_eq!(json["message"], "waiting");

        let batch = ObserverEvent::observations(vec![Observation::new("src", vec![])]);
        let json = serde_json::to_value(&batch).expect("serialize");
        assert_eq!(json["event"], "observations_ready");
        assert_eq!(json["observations"][0]["name"], "src");
    }
}
