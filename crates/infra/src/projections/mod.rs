//! Read-model projections.
//!
//! Projections fold committed events into denormalized rows. Delivery is
//! at-least-once, so every projection keeps a per-stream cursor and applies
//! an event only when its sequence number advances the cursor by exactly
//! one; duplicates are skipped, gaps are reported.
//!
//! Services apply committed events synchronously after dispatch; a bus
//! worker replaying the same envelopes is a no-op thanks to the cursors.

pub mod availability;
pub mod orders;
pub mod ticket_index;

pub use availability::{AvailabilityProjection, UnitAvailability};
pub use orders::{OrderReadModel, OrdersProjection};
pub use ticket_index::{TicketIndexProjection, TicketReadModel};

use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use ticketforge_events::EventEnvelope;

use crate::event_store::StoredEvent;
use crate::read_model::InMemoryReadModel;
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    /// Committed sequence numbers start at 1.
    #[error("sequence_number 0 in envelope")]
    ZeroSequence,

    /// An event arrived that skips ahead of the cursor; intermediate events
    /// were lost and the projection needs a rebuild.
    #[error("non-monotonic sequence: cursor at {last}, found {found}")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("failed to deserialize projected event: {0}")]
    Deserialize(String),
}

pub(crate) enum CursorCheck {
    Apply,
    Skip,
}

pub(crate) fn check_cursor(
    cursors: &InMemoryReadModel<Uuid, u64>,
    envelope: &EventEnvelope<JsonValue>,
) -> Result<CursorCheck, ProjectionError> {
    let found = envelope.sequence_number();
    if found == 0 {
        return Err(ProjectionError::ZeroSequence);
    }
    let last = cursors.get(&envelope.aggregate_id()).unwrap_or(0);
    if found <= last {
        // Duplicate delivery.
        return Ok(CursorCheck::Skip);
    }
    if last != 0 && found != last + 1 {
        return Err(ProjectionError::NonMonotonicSequence { last, found });
    }
    Ok(CursorCheck::Apply)
}

/// All projections of the engine, routed by aggregate type.
pub struct Projections {
    pub orders: OrdersProjection,
    pub availability: AvailabilityProjection,
    pub tickets: TicketIndexProjection,
}

impl Projections {
    pub fn new(scan_secret: impl Into<String>) -> Self {
        Self {
            orders: OrdersProjection::new(),
            availability: AvailabilityProjection::new(),
            tickets: TicketIndexProjection::new(scan_secret),
        }
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        match envelope.aggregate_type() {
            streams::ORDER => self.orders.apply_envelope(envelope),
            streams::SELLABLE_UNIT => self.availability.apply_envelope(envelope),
            streams::TICKET => self.tickets.apply_envelope(envelope),
            _ => Ok(()),
        }
    }

    /// Fold a freshly committed batch, in commit order.
    pub fn apply_committed(&self, committed: &[StoredEvent]) -> Result<(), ProjectionError> {
        for stored in committed {
            self.apply_envelope(&stored.to_envelope())?;
        }
        Ok(())
    }

    /// Drop all state and replay the given events.
    ///
    /// Events may arrive in any order; they are sorted per stream before
    /// replay.
    pub fn rebuild_from_scratch(&self, events: Vec<StoredEvent>) -> Result<(), ProjectionError> {
        self.orders.clear();
        self.availability.clear();
        self.tickets.clear();

        let mut events = events;
        events.sort_by(|a, b| {
            (a.aggregate_id, a.sequence_number).cmp(&(b.aggregate_id, b.sequence_number))
        });
        self.apply_committed(&events)
    }
}
