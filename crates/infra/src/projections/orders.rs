//! Orders read model.
//!
//! One row per order, plus a payment-reference index used by webhook
//! reconciliation to locate the order for a processor event.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use ticketforge_core::{CatalogEventId, OrderId};
use ticketforge_events::EventEnvelope;
use ticketforge_orders::{BuyerContact, OrderEvent, OrderItem, OrderStatus, OrderTotals};

use super::{CursorCheck, ProjectionError, check_cursor};
use crate::read_model::InMemoryReadModel;

/// Denormalized order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReadModel {
    pub order_id: OrderId,
    pub event_id: CatalogEventId,
    pub status: OrderStatus,
    pub buyer: BuyerContact,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub currency: String,
    pub payment_reference: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct OrdersProjection {
    gate: Mutex<()>,
    cursors: InMemoryReadModel<Uuid, u64>,
    orders: InMemoryReadModel<OrderId, OrderReadModel>,
    by_payment_reference: InMemoryReadModel<String, OrderId>,
}

impl Default for OrdersProjection {
    fn default() -> Self {
        Self {
            gate: Mutex::new(()),
            cursors: InMemoryReadModel::new(),
            orders: InMemoryReadModel::new(),
            by_payment_reference: InMemoryReadModel::new(),
        }
    }
}

impl OrdersProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, order_id: OrderId) -> Option<OrderReadModel> {
        self.orders.get(&order_id)
    }

    pub fn find_by_payment_reference(&self, payment_reference: &str) -> Option<OrderReadModel> {
        let order_id = self
            .by_payment_reference
            .get(&payment_reference.to_string())?;
        self.orders.get(&order_id)
    }

    /// Orders whose TTL has elapsed and that are still in a non-terminal
    /// state. Input for the expiry reaper.
    pub fn expired_candidates(&self, now: DateTime<Utc>) -> Vec<OrderReadModel> {
        self.orders
            .list()
            .into_iter()
            .filter(|(_, order)| !order.status.is_terminal() && now > order.expires_at)
            .map(|(_, order)| order)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if let CursorCheck::Skip = check_cursor(&self.cursors, envelope)? {
            return Ok(());
        }

        let event: OrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
        self.apply_event(&event);
        self.cursors
            .upsert(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    pub fn clear(&self) {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.cursors.clear();
        self.orders.clear();
        self.by_payment_reference.clear();
    }

    fn apply_event(&self, event: &OrderEvent) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.orders.upsert(
                    e.order_id,
                    OrderReadModel {
                        order_id: e.order_id,
                        event_id: e.event_id,
                        status: OrderStatus::Pending,
                        buyer: e.buyer.clone(),
                        items: e.items.clone(),
                        totals: e.totals,
                        currency: e.currency.clone(),
                        payment_reference: None,
                        expires_at: e.expires_at,
                        paid_at: None,
                        cancellation_reason: None,
                        placed_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            OrderEvent::PaymentStarted(e) => {
                self.by_payment_reference
                    .upsert(e.payment_reference.clone(), e.order_id);
                self.update(e.order_id, e.occurred_at, |order| {
                    order.status = OrderStatus::Processing;
                    order.payment_reference = Some(e.payment_reference.clone());
                });
            }
            OrderEvent::OrderConfirmed(e) => {
                self.update(e.order_id, e.occurred_at, |order| {
                    order.status = OrderStatus::Confirmed;
                    order.paid_at = Some(e.occurred_at);
                });
            }
            OrderEvent::OrderFailed(e) => {
                self.update(e.order_id, e.occurred_at, |order| {
                    order.status = OrderStatus::Failed;
                });
            }
            OrderEvent::OrderCancelled(e) => {
                self.update(e.order_id, e.occurred_at, |order| {
                    order.status = OrderStatus::Cancelled;
                    order.cancellation_reason = Some(e.reason.clone());
                });
            }
            OrderEvent::OrderExpired(e) => {
                self.update(e.order_id, e.occurred_at, |order| {
                    order.status = OrderStatus::Expired;
                });
            }
            OrderEvent::OrderRefunded(e) => {
                self.update(e.order_id, e.occurred_at, |order| {
                    order.status = OrderStatus::Refunded;
                });
            }
        }
    }

    fn update(&self, order_id: OrderId, at: DateTime<Utc>, f: impl FnOnce(&mut OrderReadModel)) {
        match self.orders.get(&order_id) {
            Some(mut order) => {
                f(&mut order);
                order.updated_at = at;
                self.orders.upsert(order_id, order);
            }
            // Per-stream ordering guarantees OrderPlaced arrives first.
            None => tracing::warn!(%order_id, "order event for unknown order row"),
        }
    }
}
