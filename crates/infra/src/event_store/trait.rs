//! Event store contract: append-only streams with optimistic concurrency.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use ticketforge_core::ExpectedVersion;
use ticketforge_events::{Event, EventEnvelope};

/// An event that has been produced by an aggregate but not yet committed
/// to a stream. The store assigns the sequence number on append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

impl UncommittedEvent {
    /// Build an uncommitted event from a typed domain event.
    pub fn from_typed<E>(
        event_id: Uuid,
        aggregate_id: Uuid,
        aggregate_type: impl Into<String>,
        event: &E,
    ) -> Result<Self, serde_json::Error>
    where
        E: Event + serde::Serialize,
    {
        Ok(Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload: serde_json::to_value(event)?,
        })
    }
}

/// A committed event with its assigned position in the stream.
///
/// `sequence_number` starts at 1 and increases by 1 per event; the highest
/// sequence number in a stream is the stream's version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub sequence_number: u64,
    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Wrap this event into the bus envelope form.
    pub fn to_envelope(&self) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            self.event_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventStoreError {
    /// Optimistic concurrency check failed; reload and retry.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// A stream never changes its aggregate type after the first event.
    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    /// Malformed batch or storage failure.
    #[error("invalid append: {0}")]
    InvalidAppend(String),

    /// Post-commit publication failed; events are durable and can be replayed.
    #[error("publish failed: {0}")]
    Publish(String),
}

/// Append-only event stream storage.
///
/// `append` commits a batch atomically: either every event in the batch is
/// assigned a sequence number and persisted, or none are. All events in a
/// batch must target the same stream.
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load a full stream in sequence order. Empty if the stream does not exist.
    fn load_stream(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for std::sync::Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(aggregate_id)
    }
}
