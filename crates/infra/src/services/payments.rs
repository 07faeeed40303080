//! Payment intent management.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::info;

use ticketforge_core::{DomainError, OrderId};
use ticketforge_events::{EventBus, EventEnvelope};
use ticketforge_orders::{Order, OrderCommand, OrderStatus, StartPayment};

use super::ServiceError;
use crate::command_dispatcher::CommandDispatcher;
use crate::event_store::EventStore;
use crate::external::{ChargeRequest, PaymentIntent, PaymentProcessor};
use crate::projections::Projections;
use crate::streams;

pub struct PaymentsService<S, B, P> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    processor: P,
    projections: Arc<Projections>,
}

impl<S, B, P> PaymentsService<S, B, P>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    P: PaymentProcessor,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        processor: P,
        projections: Arc<Projections>,
    ) -> Self {
        Self {
            dispatcher,
            processor,
            projections,
        }
    }

    /// Open a payment intent for a pending order.
    ///
    /// Re-entrant: when the order is already processing with an intent
    /// attached, the existing reference is returned instead of opening a
    /// second charge.
    pub fn start_payment(&self, order_id: OrderId) -> Result<PaymentIntent, ServiceError> {
        let order = self
            .projections
            .orders
            .get(order_id)
            .ok_or(DomainError::NotFound)?;

        match order.status {
            OrderStatus::Processing => match order.payment_reference {
                Some(reference) => Ok(PaymentIntent {
                    reference,
                    client_secret: None,
                }),
                None => Err(DomainError::invariant(
                    "processing order missing payment reference",
                )
                .into()),
            },
            OrderStatus::Pending => {
                let intent = self.processor.create_intent(&ChargeRequest {
                    order_id,
                    amount: order.totals.total,
                    currency: order.currency.clone(),
                })?;

                let cmd = OrderCommand::StartPayment(StartPayment {
                    order_id,
                    payment_reference: intent.reference.clone(),
                    occurred_at: Utc::now(),
                });
                let committed = self.dispatcher.dispatch_with_retry(
                    order_id.into(),
                    streams::ORDER,
                    &cmd,
                    || Order::empty(order_id),
                )?;
                self.projections.apply_committed(&committed)?;

                info!(%order_id, reference = %intent.reference, "payment intent opened");
                Ok(intent)
            }
            other => {
                Err(DomainError::state_conflict("start payment", other.to_string()).into())
            }
        }
    }

    /// Ask the processor to refund a confirmed order's charge.
    ///
    /// The `Refunded` transition itself lands when the processor's
    /// `charge.refunded` event comes back through reconciliation.
    pub fn request_refund(&self, order_id: OrderId) -> Result<String, ServiceError> {
        let order = self
            .projections
            .orders
            .get(order_id)
            .ok_or(DomainError::NotFound)?;

        if order.status != OrderStatus::Confirmed {
            return Err(
                DomainError::state_conflict("request refund", order.status.to_string()).into(),
            );
        }
        let reference = order.payment_reference.ok_or_else(|| {
            DomainError::invariant("confirmed order missing payment reference")
        })?;

        let refund_reference = self.processor.refund(&reference)?;
        info!(%order_id, refund_reference, "refund requested");
        Ok(refund_reference)
    }
}
