//! In-memory event store for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use ticketforge_core::ExpectedVersion;

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// In-memory append-only event store.
///
/// Holds one vector of committed events per stream, protected by a single
/// `RwLock`. Appends are serialized by the write lock, which gives the same
/// all-or-nothing and version-check semantics as the Postgres store.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<Uuid, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All committed events across every stream, in arbitrary stream order.
    ///
    /// Used to rebuild projections from scratch.
    pub fn all_events(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self.streams.read().map_err(poisoned)?;
        Ok(streams.values().flatten().cloned().collect())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> EventStoreError {
    EventStoreError::InvalidAppend("event store lock poisoned".to_string())
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let aggregate_id = events[0].aggregate_id;
        let aggregate_type = events[0].aggregate_type.clone();

        // A batch targets exactly one stream.
        for (idx, event) in events.iter().enumerate() {
            if event.aggregate_id != aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if event.aggregate_type != aggregate_type {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let mut streams = self.streams.write().map_err(poisoned)?;
        let stream = streams.entry(aggregate_id).or_default();

        if let Some(first) = stream.first() {
            if first.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    first.aggregate_type, aggregate_type
                )));
            }
        }

        let current_version = stream.last().map(|e| e.sequence_number).unwrap_or(0);
        if !expected_version.matches(current_version) {
            return Err(EventStoreError::Concurrency(format!(
                "optimistic concurrency check failed: expected {expected_version:?}, found {current_version}"
            )));
        }

        let mut committed = Vec::with_capacity(events.len());
        let mut next_sequence = current_version + 1;
        for event in events {
            let stored = StoredEvent {
                event_id: event.event_id,
                aggregate_id: event.aggregate_id,
                aggregate_type: event.aggregate_type,
                sequence_number: next_sequence,
                event_type: event.event_type,
                event_version: event.event_version,
                occurred_at: event.occurred_at,
                payload: event.payload,
            };
            stream.push(stored.clone());
            committed.push(stored);
            next_sequence += 1;
        }

        Ok(committed)
    }

    fn load_stream(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self.streams.read().map_err(poisoned)?;
        Ok(streams.get(&aggregate_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn uncommitted(aggregate_id: Uuid, event_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_type: "order".to_string(),
            event_type: event_type.to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: serde_json::json!({}),
        }
    }

    #[test]
    fn append_assigns_contiguous_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let aggregate_id = Uuid::now_v7();

        let first = store
            .append(
                vec![uncommitted(aggregate_id, "orders.order.placed")],
                ExpectedVersion::Exact(0),
            )
            .unwrap();
        assert_eq!(first[0].sequence_number, 1);

        let second = store
            .append(
                vec![
                    uncommitted(aggregate_id, "orders.order.payment_started"),
                    uncommitted(aggregate_id, "orders.order.confirmed"),
                ],
                ExpectedVersion::Exact(1),
            )
            .unwrap();
        assert_eq!(second[0].sequence_number, 2);
        assert_eq!(second[1].sequence_number, 3);

        let stream = store.load_stream(aggregate_id).unwrap();
        assert_eq!(stream.len(), 3);
    }

    #[test]
    fn stale_expected_version_is_a_concurrency_error() {
        let store = InMemoryEventStore::new();
        let aggregate_id = Uuid::now_v7();

        store
            .append(
                vec![uncommitted(aggregate_id, "orders.order.placed")],
                ExpectedVersion::Exact(0),
            )
            .unwrap();

        let err = store
            .append(
                vec![uncommitted(aggregate_id, "orders.order.payment_started")],
                ExpectedVersion::Exact(0),
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[test]
    fn aggregate_type_is_stable_per_stream() {
        let store = InMemoryEventStore::new();
        let aggregate_id = Uuid::now_v7();

        store
            .append(
                vec![uncommitted(aggregate_id, "orders.order.placed")],
                ExpectedVersion::Exact(0),
            )
            .unwrap();

        let mut other = uncommitted(aggregate_id, "inventory.unit.registered");
        other.aggregate_type = "sellable_unit".to_string();
        let err = store
            .append(vec![other], ExpectedVersion::Exact(1))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
    }

    #[test]
    fn mixed_batch_is_rejected() {
        let store = InMemoryEventStore::new();
        let err = store
            .append(
                vec![
                    uncommitted(Uuid::now_v7(), "orders.order.placed"),
                    uncommitted(Uuid::now_v7(), "orders.order.placed"),
                ],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::InvalidAppend(_)));
    }
}
