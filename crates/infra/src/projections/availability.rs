//! Per-unit availability counters.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use ticketforge_catalog::UnitKind;
use ticketforge_core::{TicketTypeId, UnitId};
use ticketforge_events::EventEnvelope;
use ticketforge_inventory::UnitEvent;

use super::{CursorCheck, ProjectionError, check_cursor};
use crate::read_model::InMemoryReadModel;

/// Counter snapshot for one sellable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitAvailability {
    pub unit_id: UnitId,
    pub ticket_type_id: TicketTypeId,
    pub kind: UnitKind,
    pub label: String,
    pub price: u64,
    pub total: u32,
    pub reserved: u32,
    pub sold: u32,
}

impl UnitAvailability {
    pub fn available(&self) -> u32 {
        self.total - self.reserved - self.sold
    }
}

pub struct AvailabilityProjection {
    gate: Mutex<()>,
    cursors: InMemoryReadModel<Uuid, u64>,
    units: InMemoryReadModel<UnitId, UnitAvailability>,
}

impl Default for AvailabilityProjection {
    fn default() -> Self {
        Self {
            gate: Mutex::new(()),
            cursors: InMemoryReadModel::new(),
            units: InMemoryReadModel::new(),
        }
    }
}

impl AvailabilityProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, unit_id: UnitId) -> Option<UnitAvailability> {
        self.units.get(&unit_id)
    }

    pub fn list(&self) -> Vec<UnitAvailability> {
        self.units.list().into_iter().map(|(_, unit)| unit).collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if let CursorCheck::Skip = check_cursor(&self.cursors, envelope)? {
            return Ok(());
        }

        let event: UnitEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
        self.apply_event(&event);
        self.cursors
            .upsert(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    pub fn clear(&self) {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.cursors.clear();
        self.units.clear();
    }

    fn apply_event(&self, event: &UnitEvent) {
        match event {
            UnitEvent::UnitRegistered(e) => {
                self.units.upsert(
                    e.unit_id,
                    UnitAvailability {
                        unit_id: e.unit_id,
                        ticket_type_id: e.ticket_type_id,
                        kind: e.kind,
                        label: e.label.clone(),
                        price: e.price,
                        total: e.total_quantity,
                        reserved: 0,
                        sold: 0,
                    },
                );
            }
            UnitEvent::UnitsReserved(e) => self.update(e.unit_id, |unit| {
                unit.reserved += e.quantity;
            }),
            UnitEvent::UnitsCommitted(e) => self.update(e.unit_id, |unit| {
                unit.reserved = unit.reserved.saturating_sub(e.quantity);
                unit.sold += e.quantity;
            }),
            UnitEvent::UnitsReleased(e) => self.update(e.unit_id, |unit| {
                unit.reserved = unit.reserved.saturating_sub(e.quantity);
            }),
            UnitEvent::PriceChanged(e) => self.update(e.unit_id, |unit| {
                unit.price = e.price;
            }),
        }
    }

    fn update(&self, unit_id: UnitId, f: impl FnOnce(&mut UnitAvailability)) {
        match self.units.get(&unit_id) {
            Some(mut unit) => {
                f(&mut unit);
                self.units.upsert(unit_id, unit);
            }
            None => tracing::warn!(%unit_id, "unit event for unknown availability row"),
        }
    }
}
