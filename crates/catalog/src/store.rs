//! Catalog lookups.

use std::collections::HashMap;
use std::sync::RwLock;

use ticketforge_core::{CatalogEventId, TicketTypeId, UnitId};

use crate::record::EventRecord;
use crate::ticket_type::TicketType;
use crate::unit::UnitDescriptor;

/// Read-only catalog access used by the resolver.
///
/// Lookups return owned copies; catalog data is small and changes rarely.
pub trait CatalogStore: Send + Sync {
    fn event(&self, id: CatalogEventId) -> Option<EventRecord>;
    fn ticket_type(&self, id: TicketTypeId) -> Option<TicketType>;
    fn unit(&self, id: UnitId) -> Option<UnitDescriptor>;
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    events: RwLock<HashMap<CatalogEventId, EventRecord>>,
    ticket_types: RwLock<HashMap<TicketTypeId, TicketType>>,
    units: RwLock<HashMap<UnitId, UnitDescriptor>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_event(&self, record: EventRecord) {
        if let Ok(mut events) = self.events.write() {
            events.insert(record.id, record);
        }
    }

    pub fn insert_ticket_type(&self, ticket_type: TicketType) {
        if let Ok(mut types) = self.ticket_types.write() {
            types.insert(ticket_type.id, ticket_type);
        }
    }

    pub fn insert_unit(&self, unit: UnitDescriptor) {
        if let Ok(mut units) = self.units.write() {
            units.insert(unit.unit_id, unit);
        }
    }
}

impl CatalogStore for InMemoryCatalog {
    fn event(&self, id: CatalogEventId) -> Option<EventRecord> {
        self.events.read().ok()?.get(&id).cloned()
    }

    fn ticket_type(&self, id: TicketTypeId) -> Option<TicketType> {
        self.ticket_types.read().ok()?.get(&id).cloned()
    }

    fn unit(&self, id: UnitId) -> Option<UnitDescriptor> {
        self.units.read().ok()?.get(&id).cloned()
    }
}
