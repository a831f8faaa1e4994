//! Domain events and their delivery.

mod event;
mod outbox;
mod sink;

pub use event::{DomainEvent, DomainEventKind};
pub use outbox::EventOutbox;
pub use sink::{EventSink, MemorySink, SinkError, TracingAuditSink};
