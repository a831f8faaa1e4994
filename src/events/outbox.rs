//! Outbound event queue.
//!
//! Events taken from an aggregate are enqueued only after the store accepted
//! the write, then drained to every registered sink. A failed write therefore
//! never publishes anything.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::{DomainEvent, EventSink};

/// Queue of committed events waiting for delivery.
#[derive(Default)]
pub struct EventOutbox {
    queue: Mutex<VecDeque<DomainEvent>>,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventOutbox {
    /// Creates an outbox delivering to `sinks`.
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            sinks,
        }
    }

    /// Queues committed events.
    pub fn enqueue(&self, events: Vec<DomainEvent>) {
        if events.is_empty() {
            return;
        }
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(events);
    }

    /// Number of events waiting for delivery.
    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Delivers every queued event to every sink, oldest first, and returns
    /// how many events were drained. Sink failures are logged and skipped.
    pub fn drain(&self) -> usize {
        let batch: Vec<DomainEvent> = self
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();

        for event in &batch {
            for sink in &self.sinks {
                if let Err(e) = sink.publish(event) {
                    warn!(
                        sink = sink.name(),
                        event_id = %event.event_id,
                        event_type = event.name(),
                        calculation_id = %event.calculation_id,
                        error = %e,
                        "Event delivery failed"
                    );
                }
            }
        }
        if !batch.is_empty() {
            debug!(count = batch.len(), "Drained event outbox");
        }
        batch.len()
    }
}

impl std::fmt::Debug for EventOutbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventOutbox")
            .field("pending", &self.pending())
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}
