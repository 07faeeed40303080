use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stream metadata wrapped around an event payload.
///
/// This is what travels over the bus and what projections key their
/// cursors on: `aggregate_id` names the stream (an order, a sellable
/// unit, a ticket), `sequence_number` is the event's 1-based position in
/// it, and `aggregate_type` routes the payload to the right projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    aggregate_id: Uuid,
    aggregate_type: String,
    sequence_number: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        aggregate_id: Uuid,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Raw stream id; callers convert from their typed ids.
    pub fn aggregate_id(&self) -> Uuid {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    /// 1-based position in the stream; strictly increasing, no gaps.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
