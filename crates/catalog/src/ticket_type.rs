//! Ticket type entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ticketforge_core::{CatalogEventId, Entity, TicketTypeId};

pub const DEFAULT_MIN_PER_ORDER: u32 = 1;
pub const DEFAULT_MAX_PER_ORDER: u32 = 10;

/// A ticket type within an event (e.g. VIP Pass, General Admission).
///
/// Carries the per-order quantity bounds and the type-level sales window.
/// The sellable capacity itself lives on the unit descriptors (and their
/// inventory aggregates), one per pricing variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketType {
    pub id: TicketTypeId,
    pub event_id: CatalogEventId,
    pub name: String,
    pub min_per_order: u32,
    pub max_per_order: u32,
    pub sales_start: Option<DateTime<Utc>>,
    pub sales_end: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl TicketType {
    pub fn new(id: TicketTypeId, event_id: CatalogEventId, name: impl Into<String>) -> Self {
        Self {
            id,
            event_id,
            name: name.into(),
            min_per_order: DEFAULT_MIN_PER_ORDER,
            max_per_order: DEFAULT_MAX_PER_ORDER,
            sales_start: None,
            sales_end: None,
            is_active: true,
        }
    }

    pub fn with_bounds(mut self, min: u32, max: u32) -> Self {
        self.min_per_order = min;
        self.max_per_order = max;
        self
    }

    pub fn within_sales_window(&self, now: DateTime<Utc>) -> bool {
        if self.sales_start.is_some_and(|start| now < start) {
            return false;
        }
        if self.sales_end.is_some_and(|end| now > end) {
            return false;
        }
        true
    }
}

impl Entity for TicketType {
    type Id = TicketTypeId;

    fn id(&self) -> &TicketTypeId {
        &self.id
    }
}
