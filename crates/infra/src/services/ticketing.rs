//! Ticket issuance and gate verification.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::info;

use ticketforge_core::{DomainError, OrderId, TicketId, UserId};
use ticketforge_events::{EventBus, EventEnvelope};
use ticketforge_tickets::{
    CancelTicket, IssueTicket, Ticket, TicketCommand, TicketStatus, VerifyTicket,
};

use super::ServiceError;
use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::projections::{OrderReadModel, Projections, TicketReadModel};
use crate::streams;

pub struct TicketingService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    projections: Arc<Projections>,
}

impl<S, B> TicketingService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>, projections: Arc<Projections>) -> Self {
        Self {
            dispatcher,
            projections,
        }
    }

    /// Mint one ticket per admission of a confirmed order: an item with
    /// quantity N produces N tickets at the item's snapshot price.
    ///
    /// Re-entrant per order: if tickets already exist they are returned
    /// instead of minting a second batch.
    pub fn issue_for_order(&self, order: &OrderReadModel) -> Result<Vec<TicketId>, ServiceError> {
        let existing = self.projections.tickets.tickets_for_order(order.order_id);
        if !existing.is_empty() {
            return Ok(existing.into_iter().map(|t| t.ticket_id).collect());
        }

        let now = Utc::now();
        let mut issued = Vec::new();
        for item in &order.items {
            for _ in 0..item.quantity {
                let ticket_id = TicketId::new();
                let cmd = TicketCommand::IssueTicket(IssueTicket {
                    ticket_id,
                    order_id: order.order_id,
                    unit_id: item.unit_id,
                    label: item.label.clone(),
                    price: item.unit_price,
                    occurred_at: now,
                });
                let committed =
                    self.dispatcher
                        .dispatch(ticket_id.into(), streams::TICKET, &cmd, || {
                            Ticket::empty(ticket_id)
                        })?;
                self.projections.apply_committed(&committed)?;
                issued.push(ticket_id);
            }
        }

        info!(order_id = %order.order_id, count = issued.len(), "tickets issued");
        Ok(issued)
    }

    /// Verify a scan token at the gate.
    ///
    /// The active-to-used flip is a compare-and-set on the ticket stream:
    /// of two concurrent scans exactly one commits the `used` transition,
    /// the other re-reads and gets `AlreadyUsed` with the original scan
    /// time.
    pub fn verify(&self, token: &str, verified_by: UserId) -> Result<TicketReadModel, ServiceError> {
        let ticket = self
            .projections
            .tickets
            .find_by_token(token)
            .ok_or(DomainError::NotFound)?;

        let cmd = TicketCommand::VerifyTicket(VerifyTicket {
            ticket_id: ticket.ticket_id,
            verified_by,
            occurred_at: Utc::now(),
        });
        let committed = self.dispatcher.dispatch_with_retry(
            ticket.ticket_id.into(),
            streams::TICKET,
            &cmd,
            || Ticket::empty(ticket.ticket_id),
        )?;
        self.projections.apply_committed(&committed)?;

        self.projections
            .tickets
            .get(ticket.ticket_id)
            .ok_or_else(|| DomainError::invariant("verified ticket missing from index").into())
    }

    /// Cancel the still-active tickets of an order (refund path).
    pub fn cancel_for_order(&self, order_id: OrderId) -> Result<usize, ServiceError> {
        let mut cancelled = 0;
        for ticket in self.projections.tickets.tickets_for_order(order_id) {
            if ticket.status != TicketStatus::Active {
                continue;
            }
            let cmd = TicketCommand::CancelTicket(CancelTicket {
                ticket_id: ticket.ticket_id,
                occurred_at: Utc::now(),
            });
            let result = self.dispatcher.dispatch_with_retry(
                ticket.ticket_id.into(),
                streams::TICKET,
                &cmd,
                || Ticket::empty(ticket.ticket_id),
            );
            match result {
                Ok(committed) => {
                    self.projections.apply_committed(&committed)?;
                    cancelled += 1;
                }
                // Scanned in the meantime; the gate won.
                Err(DispatchError::Domain(DomainError::StateConflict { .. })) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(cancelled)
    }
}
