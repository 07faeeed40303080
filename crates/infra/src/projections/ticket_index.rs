//! Ticket read model and scan-token index.
//!
//! Scanners send back only the token; this projection is the reverse map
//! from token to ticket. Tokens are derived here, at issuance time, so the
//! derivation secret never leaves the server.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use ticketforge_core::{OrderId, TicketId, UnitId, UserId};
use ticketforge_events::EventEnvelope;
use ticketforge_tickets::{TicketEvent, TicketStatus, scan_token};

use super::{CursorCheck, ProjectionError, check_cursor};
use crate::read_model::InMemoryReadModel;

/// Denormalized ticket row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketReadModel {
    pub ticket_id: TicketId,
    pub order_id: OrderId,
    pub unit_id: UnitId,
    pub label: String,
    pub price: u64,
    pub status: TicketStatus,
    pub used_at: Option<DateTime<Utc>>,
    pub verified_by: Option<UserId>,
    pub scan_token: String,
}

pub struct TicketIndexProjection {
    secret: String,
    gate: Mutex<()>,
    cursors: InMemoryReadModel<Uuid, u64>,
    tickets: InMemoryReadModel<TicketId, TicketReadModel>,
    by_token: InMemoryReadModel<String, TicketId>,
    by_order: InMemoryReadModel<OrderId, Vec<TicketId>>,
}

impl TicketIndexProjection {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            gate: Mutex::new(()),
            cursors: InMemoryReadModel::new(),
            tickets: InMemoryReadModel::new(),
            by_token: InMemoryReadModel::new(),
            by_order: InMemoryReadModel::new(),
        }
    }

    pub fn get(&self, ticket_id: TicketId) -> Option<TicketReadModel> {
        self.tickets.get(&ticket_id)
    }

    pub fn find_by_token(&self, token: &str) -> Option<TicketReadModel> {
        let ticket_id = self.by_token.get(&token.to_string())?;
        self.tickets.get(&ticket_id)
    }

    pub fn tickets_for_order(&self, order_id: OrderId) -> Vec<TicketReadModel> {
        self.by_order
            .get(&order_id)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|ticket_id| self.tickets.get(&ticket_id))
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if let CursorCheck::Skip = check_cursor(&self.cursors, envelope)? {
            return Ok(());
        }

        let event: TicketEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
        self.apply_event(&event);
        self.cursors
            .upsert(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    pub fn clear(&self) {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.cursors.clear();
        self.tickets.clear();
        self.by_token.clear();
        self.by_order.clear();
    }

    fn apply_event(&self, event: &TicketEvent) {
        match event {
            TicketEvent::TicketIssued(e) => {
                let token = scan_token(e.ticket_id, &self.secret);
                self.tickets.upsert(
                    e.ticket_id,
                    TicketReadModel {
                        ticket_id: e.ticket_id,
                        order_id: e.order_id,
                        unit_id: e.unit_id,
                        label: e.label.clone(),
                        price: e.price,
                        status: TicketStatus::Active,
                        used_at: None,
                        verified_by: None,
                        scan_token: token.clone(),
                    },
                );
                self.by_token.upsert(token, e.ticket_id);
                self.by_order.update(e.order_id, |tickets| {
                    let mut tickets = tickets.cloned().unwrap_or_default();
                    tickets.push(e.ticket_id);
                    tickets
                });
            }
            TicketEvent::TicketScanned(e) => self.update(e.ticket_id, |ticket| {
                ticket.status = TicketStatus::Used;
                ticket.used_at = Some(e.occurred_at);
                ticket.verified_by = Some(e.verified_by);
            }),
            TicketEvent::TicketCancelled(e) => self.update(e.ticket_id, |ticket| {
                ticket.status = TicketStatus::Cancelled;
            }),
            TicketEvent::TicketExpired(e) => self.update(e.ticket_id, |ticket| {
                ticket.status = TicketStatus::Expired;
            }),
        }
    }

    fn update(&self, ticket_id: TicketId, f: impl FnOnce(&mut TicketReadModel)) {
        match self.tickets.get(&ticket_id) {
            Some(mut ticket) => {
                f(&mut ticket);
                self.tickets.upsert(ticket_id, ticket);
            }
            None => tracing::warn!(%ticket_id, "ticket event for unknown ticket row"),
        }
    }
}
