//! Webhook reconciliation.
//!
//! Payment truth arrives asynchronously as processor events. Reconciliation
//! is idempotent (journal keyed by processor event id), tolerant of
//! duplicates and retries, and never force-applies an event that
//! contradicts the order's current state: those are journaled as anomalies
//! for operator review and the order is left untouched.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use ticketforge_core::OrderId;
use ticketforge_events::{EventBus, EventEnvelope};
use ticketforge_inventory::{CommitUnits, ReleaseUnits, SellableUnit, UnitCommand};
use ticketforge_orders::{
    CancelOrder, ConfirmPayment, FailPayment, Order, OrderCommand, OrderStatus, RefundOrder,
};

use super::{ServiceError, TicketingService};
use crate::command_dispatcher::CommandDispatcher;
use crate::event_store::EventStore;
use crate::external::{Notification, NotificationDispatcher};
use crate::journal::{PaymentEventKind, PaymentJournal, ProcessedOutcome, ProcessedPaymentEvent};
use crate::projections::{OrderReadModel, Projections};
use crate::streams;

/// Normalized webhook delivery from the payment processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentWebhookEvent {
    /// Processor-assigned event id; the idempotency key.
    pub event_id: String,
    /// Wire-format event type (e.g. `payment_intent.succeeded`).
    pub event_type: String,
    /// Payment intent / charge reference the event is about.
    pub payment_reference: String,
    /// Order id carried in the intent's metadata, when present.
    pub order_id: Option<OrderId>,
    /// Refund reference for `charge.refunded` events.
    pub refund_reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// How a delivery was disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Transitions applied.
    Applied,
    /// Event id already journaled; nothing done.
    Duplicate,
    /// Order already in the target terminal state; journaled, nothing done.
    AlreadyApplied,
    /// Event contradicts order state; journaled, order untouched.
    Anomaly,
    /// Unrecognized event type; journaled, skipped.
    Ignored,
}

pub struct ReconciliationService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    projections: Arc<Projections>,
    journal: Arc<dyn PaymentJournal>,
    ticketing: Arc<TicketingService<S, B>>,
    notifier: Arc<dyn NotificationDispatcher>,
    // Serializes webhook processing; deliveries are infrequent compared to
    // the read-check-transition races they would otherwise open.
    gate: Mutex<()>,
}

impl<S, B> ReconciliationService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        projections: Arc<Projections>,
        journal: Arc<dyn PaymentJournal>,
        ticketing: Arc<TicketingService<S, B>>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            dispatcher,
            projections,
            journal,
            ticketing,
            notifier,
            gate: Mutex::new(()),
        }
    }

    /// Reconcile one webhook delivery.
    ///
    /// The journal row is written after the transitions it records, so a
    /// crash mid-apply leads to a redelivery that re-enters here. The
    /// terminal-state arms re-run the follow-up work (unit commits or
    /// releases, ticket issuance) before reporting `AlreadyApplied`; those
    /// steps are no-ops when the first delivery got all the way through.
    pub fn process(&self, event: &PaymentWebhookEvent) -> Result<ReconcileOutcome, ServiceError> {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);

        if self.journal.find(&event.event_id)?.is_some() {
            debug!(event_id = %event.event_id, "duplicate webhook delivery");
            return Ok(ReconcileOutcome::Duplicate);
        }

        let Some(kind) = PaymentEventKind::from_wire(&event.event_type) else {
            self.journal.record(journal_entry(
                event,
                None,
                None,
                ProcessedOutcome::Ignored,
                Some("unrecognized event type".to_string()),
            ))?;
            return Ok(ReconcileOutcome::Ignored);
        };

        let Some(order) = self.locate_order(event) else {
            warn!(
                event_id = %event.event_id,
                payment_reference = %event.payment_reference,
                "webhook event for unknown order"
            );
            self.journal.record(journal_entry(
                event,
                Some(kind),
                None,
                ProcessedOutcome::Anomaly,
                Some("order not found".to_string()),
            ))?;
            return Ok(ReconcileOutcome::Anomaly);
        };

        let (outcome, detail) = match kind {
            PaymentEventKind::PaymentSucceeded => self.apply_success(&order, event)?,
            PaymentEventKind::PaymentFailed => self.apply_failure(&order, event)?,
            PaymentEventKind::PaymentCanceled => self.apply_cancellation(&order, event)?,
            PaymentEventKind::ChargeRefunded => self.apply_refund(&order, event)?,
        };

        if outcome == ProcessedOutcome::Anomaly {
            warn!(
                event_id = %event.event_id,
                order_id = %order.order_id,
                status = %order.status,
                kind = kind.as_str(),
                "webhook event journaled as anomaly"
            );
        }
        self.journal
            .record(journal_entry(event, Some(kind), Some(order.order_id), outcome, detail))?;
        Ok(to_outcome(outcome))
    }

    fn locate_order(&self, event: &PaymentWebhookEvent) -> Option<OrderReadModel> {
        if let Some(order_id) = event.order_id {
            if let Some(order) = self.projections.orders.get(order_id) {
                return Some(order);
            }
        }
        self.projections
            .orders
            .find_by_payment_reference(&event.payment_reference)
    }

    fn apply_success(
        &self,
        order: &OrderReadModel,
        event: &PaymentWebhookEvent,
    ) -> Result<(ProcessedOutcome, Option<String>), ServiceError> {
        match order.status {
            OrderStatus::Processing => {
                // Confirm first: a crash between here and the commits below
                // leaves a Confirmed order whose redelivery takes the arm
                // underneath and finishes the commits and issuance.
                self.dispatch_order(
                    order.order_id,
                    &OrderCommand::ConfirmPayment(ConfirmPayment {
                        order_id: order.order_id,
                        payment_reference: event.payment_reference.clone(),
                        occurred_at: event.occurred_at,
                    }),
                )?;

                self.commit_items(order, event.occurred_at)?;
                let tickets = self.ticketing.issue_for_order(order)?;
                self.notify(Notification::OrderConfirmed {
                    order_id: order.order_id,
                    email: order.buyer.email.clone(),
                    ticket_count: tickets.len(),
                });
                Ok((ProcessedOutcome::Applied, None))
            }
            OrderStatus::Confirmed => {
                // Redelivery after a partial first pass. Commits are per-order
                // idempotent and issuance is re-entrant, so this settles any
                // work the first delivery did not finish.
                self.commit_items(order, event.occurred_at)?;
                self.ticketing.issue_for_order(order)?;
                Ok((ProcessedOutcome::AlreadyApplied, None))
            }
            other => Ok((
                ProcessedOutcome::Anomaly,
                Some(format!("payment success arrived while order was {other}")),
            )),
        }
    }

    fn apply_failure(
        &self,
        order: &OrderReadModel,
        event: &PaymentWebhookEvent,
    ) -> Result<(ProcessedOutcome, Option<String>), ServiceError> {
        match order.status {
            OrderStatus::Processing => {
                self.dispatch_order(
                    order.order_id,
                    &OrderCommand::FailPayment(FailPayment {
                        order_id: order.order_id,
                        reason: "payment failed".to_string(),
                        occurred_at: event.occurred_at,
                    }),
                )?;
                self.release_items(order)?;
                self.notify(Notification::OrderFailed {
                    order_id: order.order_id,
                    email: order.buyer.email.clone(),
                    reason: "payment failed".to_string(),
                });
                Ok((ProcessedOutcome::Applied, None))
            }
            OrderStatus::Failed => {
                // Finish releases a crashed first pass may have left behind.
                self.release_items(order)?;
                Ok((ProcessedOutcome::AlreadyApplied, None))
            }
            other => Ok((
                ProcessedOutcome::Anomaly,
                Some(format!("payment failure arrived while order was {other}")),
            )),
        }
    }

    fn apply_cancellation(
        &self,
        order: &OrderReadModel,
        event: &PaymentWebhookEvent,
    ) -> Result<(ProcessedOutcome, Option<String>), ServiceError> {
        match order.status {
            OrderStatus::Pending | OrderStatus::Processing => {
                self.dispatch_order(
                    order.order_id,
                    &OrderCommand::CancelOrder(CancelOrder {
                        order_id: order.order_id,
                        reason: "payment canceled".to_string(),
                        occurred_at: event.occurred_at,
                    }),
                )?;
                self.release_items(order)?;
                Ok((ProcessedOutcome::Applied, None))
            }
            OrderStatus::Cancelled => {
                self.release_items(order)?;
                Ok((ProcessedOutcome::AlreadyApplied, None))
            }
            other => Ok((
                ProcessedOutcome::Anomaly,
                Some(format!("payment cancellation arrived while order was {other}")),
            )),
        }
    }

    fn apply_refund(
        &self,
        order: &OrderReadModel,
        event: &PaymentWebhookEvent,
    ) -> Result<(ProcessedOutcome, Option<String>), ServiceError> {
        match order.status {
            OrderStatus::Confirmed => {
                self.dispatch_order(
                    order.order_id,
                    &OrderCommand::RefundOrder(RefundOrder {
                        order_id: order.order_id,
                        refund_reference: event.refund_reference.clone(),
                        occurred_at: event.occurred_at,
                    }),
                )?;
                // Sold units stay sold: refunded inventory is not returned
                // to sale automatically.
                self.ticketing.cancel_for_order(order.order_id)?;
                self.notify(Notification::OrderRefunded {
                    order_id: order.order_id,
                    email: order.buyer.email.clone(),
                });
                Ok((ProcessedOutcome::Applied, None))
            }
            OrderStatus::Refunded => {
                // cancel_for_order skips tickets that are no longer active.
                self.ticketing.cancel_for_order(order.order_id)?;
                Ok((ProcessedOutcome::AlreadyApplied, None))
            }
            other => Ok((
                ProcessedOutcome::Anomaly,
                Some(format!("refund arrived while order was {other}")),
            )),
        }
    }

    fn dispatch_order(&self, order_id: OrderId, cmd: &OrderCommand) -> Result<(), ServiceError> {
        let committed = self.dispatcher.dispatch_with_retry(
            order_id.into(),
            streams::ORDER,
            cmd,
            || Order::empty(order_id),
        )?;
        self.projections.apply_committed(&committed)?;
        Ok(())
    }

    fn commit_items(
        &self,
        order: &OrderReadModel,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        for item in &order.items {
            let cmd = UnitCommand::CommitUnits(CommitUnits {
                unit_id: item.unit_id,
                order_id: order.order_id,
                quantity: item.quantity,
                occurred_at,
            });
            let committed = self.dispatcher.dispatch_with_retry(
                item.unit_id.into(),
                streams::SELLABLE_UNIT,
                &cmd,
                || SellableUnit::empty(item.unit_id),
            )?;
            self.projections.apply_committed(&committed)?;
        }
        Ok(())
    }

    fn release_items(&self, order: &OrderReadModel) -> Result<(), ServiceError> {
        for item in &order.items {
            let cmd = UnitCommand::ReleaseUnits(ReleaseUnits {
                unit_id: item.unit_id,
                order_id: order.order_id,
                quantity: item.quantity,
                occurred_at: Utc::now(),
            });
            let committed = self.dispatcher.dispatch_with_retry(
                item.unit_id.into(),
                streams::SELLABLE_UNIT,
                &cmd,
                || SellableUnit::empty(item.unit_id),
            )?;
            self.projections.apply_committed(&committed)?;
        }
        Ok(())
    }

    fn notify(&self, notification: Notification) {
        if let Err(err) = self.notifier.dispatch(&notification) {
            warn!(?err, "notification dispatch failed");
        }
    }
}

fn journal_entry(
    event: &PaymentWebhookEvent,
    kind: Option<PaymentEventKind>,
    order_id: Option<OrderId>,
    outcome: ProcessedOutcome,
    detail: Option<String>,
) -> ProcessedPaymentEvent {
    ProcessedPaymentEvent {
        event_id: event.event_id.clone(),
        kind,
        order_id,
        outcome,
        detail,
        processed_at: Utc::now(),
    }
}

fn to_outcome(outcome: ProcessedOutcome) -> ReconcileOutcome {
    match outcome {
        ProcessedOutcome::Applied => ReconcileOutcome::Applied,
        ProcessedOutcome::AlreadyApplied => ReconcileOutcome::AlreadyApplied,
        ProcessedOutcome::Anomaly => ReconcileOutcome::Anomaly,
        ProcessedOutcome::Ignored => ReconcileOutcome::Ignored,
    }
}
