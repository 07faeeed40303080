//! Pricing variant resolver.
//!
//! Validates a buyer's `(unit, quantity)` selection against an event's
//! pricing mode and resolves advisory prices. Pure validation + lookup;
//! no side effects. Reservation happens downstream in the inventory ledger.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ticketforge_core::{CatalogEventId, DomainError, DomainResult, TicketTypeId, UnitId};

use crate::store::CatalogStore;
use crate::unit::UnitKind;

/// One requested line of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionItem {
    pub unit_id: UnitId,
    pub quantity: u32,
}

/// A validated selection line with resolved metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedItem {
    pub unit_id: UnitId,
    pub ticket_type_id: TicketTypeId,
    pub kind: UnitKind,
    /// Display label snapshot, e.g. "Festival Pass - Day 1 - VIP".
    pub label: String,
    pub quantity: u32,
    /// Advisory price in smallest currency unit. The binding snapshot is
    /// emitted by the inventory aggregate at reservation time.
    pub unit_price: u64,
}

/// Validate a selection against the event's pricing mode.
///
/// Every unit must belong to a ticket type of `event_id`, carry the unit
/// kind the event's mode sells, be on sale at `now`, and be requested in a
/// quantity within the ticket type's per-order bounds.
pub fn resolve_selection(
    store: &dyn CatalogStore,
    event_id: CatalogEventId,
    selection: &[SelectionItem],
    now: DateTime<Utc>,
) -> DomainResult<Vec<ResolvedItem>> {
    if selection.is_empty() {
        return Err(DomainError::validation("selection is empty"));
    }

    let event = store.event(event_id).ok_or(DomainError::NotFound)?;
    if !event.is_published {
        return Err(DomainError::validation("event is not open for sale"));
    }

    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(selection.len());

    for item in selection {
        if !seen.insert(item.unit_id) {
            return Err(DomainError::validation(format!(
                "duplicate unit {} in selection",
                item.unit_id
            )));
        }

        let unit = store.unit(item.unit_id).ok_or(DomainError::NotFound)?;
        let ticket_type = store
            .ticket_type(unit.ticket_type_id)
            .ok_or(DomainError::NotFound)?;

        if ticket_type.event_id != event_id {
            return Err(DomainError::invalid_selection(format!(
                "unit {} does not belong to the target event",
                item.unit_id
            )));
        }

        if !event.pricing_mode.allows(unit.kind) {
            return Err(DomainError::invalid_selection(format!(
                "unit kind {} is not sellable under this event's pricing mode",
                unit.kind
            )));
        }

        if !ticket_type.is_active || !unit.is_active {
            return Err(DomainError::invalid_selection(format!(
                "unit {} is not on sale",
                item.unit_id
            )));
        }

        // Variant-level sales window overrides the ticket type's.
        let on_sale = if unit.sales_start.is_some() || unit.sales_end.is_some() {
            unit.within_sales_window(now)
        } else {
            ticket_type.within_sales_window(now)
        };
        if !on_sale {
            return Err(DomainError::invalid_selection(format!(
                "unit {} is outside its sales window",
                item.unit_id
            )));
        }

        if item.quantity < ticket_type.min_per_order || item.quantity > ticket_type.max_per_order {
            return Err(DomainError::OutOfBounds {
                requested: item.quantity,
                min: ticket_type.min_per_order,
                max: ticket_type.max_per_order,
            });
        }

        let label = if unit.label.is_empty() {
            ticket_type.name.clone()
        } else {
            format!("{} - {}", ticket_type.name, unit.label)
        };

        resolved.push(ResolvedItem {
            unit_id: unit.unit_id,
            ticket_type_id: unit.ticket_type_id,
            kind: unit.kind,
            label,
            quantity: item.quantity,
            unit_price: unit.price,
        });
    }

    Ok(resolved)
}
