//! Destinations for committed domain events.

use std::sync::Mutex;

use thiserror::Error;
use tracing::info;

use super::DomainEvent;

/// Failure reported by an event sink.
#[derive(Debug, Error)]
#[error("event sink '{sink}' failed: {message}")]
pub struct SinkError {
    /// The sink that failed.
    pub sink: String,
    /// What went wrong.
    pub message: String,
}

/// Receives events after the change that raised them has been committed.
///
/// Delivery is fire-and-forget: a failing sink is logged and never rolls the
/// change back.
pub trait EventSink: Send + Sync {
    /// A short name used in logs.
    fn name(&self) -> &str;

    /// Delivers one event.
    fn publish(&self, event: &DomainEvent) -> Result<(), SinkError>;
}

/// Writes every event to the `audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl EventSink for TracingAuditSink {
    fn name(&self) -> &str {
        "tracing_audit"
    }

    fn publish(&self, event: &DomainEvent) -> Result<(), SinkError> {
        let payload = serde_json::to_string(event).map_err(|e| SinkError {
            sink: self.name().to_string(),
            message: e.to_string(),
        })?;
        info!(
            target: "audit",
            event_id = %event.event_id,
            event_type = event.name(),
            calculation_id = %event.calculation_id,
            employee_id = %event.employee_id,
            payload = %payload,
            "Domain event"
        );
        Ok(())
    }
}

/// Keeps every delivered event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the delivered events, oldest first.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of delivered events named `name`.
    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|e| e.name() == name)
            .count()
    }
}

impl EventSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn publish(&self, event: &DomainEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
        Ok(())
    }
}
