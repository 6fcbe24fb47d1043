//! Analytics collaborator: fire-and-forget product event emission.
//!
//! Events are queued onto a bounded channel and drained by a background
//! worker. A full queue drops the event with a warning; tracking must never
//! block or fail the caller's flow.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

/// Context attached to every event: when, which deployment, which origin.
#[derive(Debug, Clone, Serialize)]
pub struct EventContext {
    pub timestamp: i64,
    pub environment: String,
    pub origin: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub properties: Value,
    pub context: EventContext,
}

#[derive(Default)]
struct AnalyticsStats {
    emitted: AtomicUsize,
    dropped: AtomicUsize,
}

#[derive(Clone)]
pub struct AnalyticsHandle {
    sender: mpsc::Sender<AnalyticsEvent>,
    environment: String,
    origin: String,
    stats: Arc<AnalyticsStats>,
}

impl AnalyticsHandle {
    /// Starts the delivery worker and returns the shared handle.
    pub fn spawn(environment: String, origin: String, buffer: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<AnalyticsEvent>(buffer);

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                deliver(&event);
            }
        });

        Self {
            sender,
            environment,
            origin,
            stats: Arc::new(AnalyticsStats::default()),
        }
    }

    /// Handle whose queue is never drained. Lets tests exercise the
    /// full-queue path deterministically.
    #[cfg(test)]
    pub fn paused(
        environment: String,
        origin: String,
        buffer: usize,
    ) -> (Self, mpsc::Receiver<AnalyticsEvent>) {
        let (sender, receiver) = mpsc::channel(buffer);
        let handle = Self {
            sender,
            environment,
            origin,
            stats: Arc::new(AnalyticsStats::default()),
        };
        (handle, receiver)
    }

    pub fn event_context(&self) -> EventContext {
        EventContext {
            timestamp: Utc::now().timestamp_millis(),
            environment: self.environment.clone(),
            origin: self.origin.clone(),
        }
    }

    /// Queues one event. Never blocks; a full queue drops the event.
    pub fn track(&self, name: &str, properties: Value) {
        let event = AnalyticsEvent {
            name: name.to_string(),
            properties,
            context: self.event_context(),
        };

        match self.sender.try_send(event) {
            Ok(()) => {
                self.stats.emitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(event = name, "analytics queue full, dropping event");
            }
        }
    }

    pub fn emitted(&self) -> usize {
        self.stats.emitted.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> usize {
        self.stats.dropped.load(Ordering::Relaxed)
    }
}

fn deliver(event: &AnalyticsEvent) {
    // Reference delivery is the structured log stream; a real deployment
    // would forward to the product-analytics backend here.
    tracing::info!(
        target: "analytics",
        event = %event.name,
        properties = %event.properties,
        timestamp = event.context.timestamp,
        environment = %event.context.environment,
        origin = %event.context.origin,
        "event tracked"
    );
}
