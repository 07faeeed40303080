//! Command dispatch: rehydrate, decide, append, publish.
//!
//! The dispatcher owns the full command round-trip for one aggregate
//! stream:
//!
//! 1. load the stream and rehydrate the aggregate
//! 2. `handle` the command (pure decision)
//! 3. append the produced events with `ExpectedVersion::Exact(stream version)`
//! 4. publish the committed events to the bus
//!
//! Step 3 is the only synchronization point. Two dispatches racing on the
//! same stream both pass step 2; the loser's append fails the version check
//! and surfaces as `DispatchError::Concurrency`, which is safe to retry
//! from step 1.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use ticketforge_core::{Aggregate, DomainError, ExpectedVersion};
use ticketforge_events::{Event, EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Bounded retry budget for concurrency-conflict retries.
pub const RETRY_LIMIT: u32 = 5;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Another writer committed first; reload and retry.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// The aggregate rejected the command.
    #[error(transparent)]
    Domain(DomainError),

    /// A stored payload no longer deserializes into the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    /// The loaded stream violates its own sequencing invariants.
    #[error("corrupt event stream: {0}")]
    CorruptStream(String),

    #[error(transparent)]
    Store(EventStoreError),

    #[error("failed to publish committed events: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(err: EventStoreError) -> Self {
        match err {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::Publish(msg) => DispatchError::Publish(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(err: DomainError) -> Self {
        DispatchError::Domain(err)
    }
}

impl DispatchError {
    pub fn is_concurrency(&self) -> bool {
        matches!(self, DispatchError::Concurrency(_))
    }
}

/// Generic command dispatcher over an event store and an event bus.
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Dispatch one command against one aggregate stream.
    ///
    /// `make_aggregate` produces the empty aggregate instance that history
    /// is replayed onto. Returns the committed events (empty if the command
    /// was a no-op).
    pub fn dispatch<A>(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: impl FnOnce() -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(&history)?;

        let mut aggregate = make_aggregate();
        apply_history(&mut aggregate, &history)?;
        let current_version = stream_version(&history);

        let events = aggregate.handle(command)?;
        if events.is_empty() {
            return Ok(vec![]);
        }

        let mut uncommitted = Vec::with_capacity(events.len());
        for event in &events {
            let record =
                UncommittedEvent::from_typed(Uuid::now_v7(), aggregate_id, aggregate_type, event)
                    .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
            uncommitted.push(record);
        }

        let committed = self
            .store
            .append(uncommitted, ExpectedVersion::Exact(current_version))?;

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|err| DispatchError::Publish(format!("{err:?}")))?;
        }

        Ok(committed)
    }

    /// Dispatch with a bounded retry loop on concurrency conflicts.
    ///
    /// Every retry reloads the stream, so the command is re-decided against
    /// fresh state. Non-concurrency errors are returned immediately.
    pub fn dispatch_with_retry<A>(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: impl Fn() -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.dispatch(aggregate_id, aggregate_type, command, &make_aggregate) {
                Err(err) if err.is_concurrency() && attempt < RETRY_LIMIT => {
                    tracing::debug!(
                        aggregate_type,
                        %aggregate_id,
                        attempt,
                        "retrying after concurrency conflict"
                    );
                }
                result => return result,
            }
        }
    }
}

/// Stream version = highest committed sequence number (0 for a new stream).
pub fn stream_version(history: &[StoredEvent]) -> u64 {
    history.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(history: &[StoredEvent]) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for event in history {
        if event.sequence_number == 0 {
            return Err(DispatchError::CorruptStream(
                "sequence_number 0 in stream".to_string(),
            ));
        }
        if last != 0 && event.sequence_number != last + 1 {
            return Err(DispatchError::CorruptStream(format!(
                "non-monotonic sequence: {} after {}",
                event.sequence_number, last
            )));
        }
        last = event.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let event: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&event);
    }
    Ok(())
}
