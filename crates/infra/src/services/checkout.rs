//! Checkout: resolve a selection, reserve inventory, place the order.
//!
//! Reservation is all-or-nothing across the selection. Units are visited in
//! canonical unit-id order so concurrent checkouts contend predictably, and
//! every reservation made before a failure is released before the error is
//! returned.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use ticketforge_catalog::{CatalogStore, ResolvedItem, SelectionItem, resolve_selection};
use ticketforge_core::{CatalogEventId, DomainError, OrderId};
use ticketforge_events::{EventBus, EventEnvelope};
use ticketforge_inventory::{ReleaseUnits, ReserveUnits, SellableUnit, UnitCommand, UnitEvent};
use ticketforge_orders::{BuyerContact, FeePolicy, Order, OrderCommand, OrderItem, PlaceOrder};

use super::ServiceError;
use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::config::EngineConfig;
use crate::event_store::EventStore;
use crate::projections::Projections;
use crate::streams;

/// Buyer's checkout submission.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub event_id: CatalogEventId,
    pub buyer: BuyerContact,
    pub selection: Vec<SelectionItem>,
    /// Discount in smallest currency unit, already validated upstream.
    pub discount: u64,
    pub currency: String,
}

pub struct CheckoutService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    catalog: Arc<dyn CatalogStore>,
    projections: Arc<Projections>,
    config: EngineConfig,
}

impl<S, B> CheckoutService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        catalog: Arc<dyn CatalogStore>,
        projections: Arc<Projections>,
        config: EngineConfig,
    ) -> Self {
        Self {
            dispatcher,
            catalog,
            projections,
            config,
        }
    }

    /// Reserve every unit in the selection and place the order.
    ///
    /// On any reservation failure the units already reserved for this order
    /// are released and the failing unit's error is returned unchanged
    /// (including `InsufficientInventory { available, requested }`).
    pub fn place_order(&self, request: CheckoutRequest) -> Result<OrderId, ServiceError> {
        let now = Utc::now();
        let mut resolved =
            resolve_selection(self.catalog.as_ref(), request.event_id, &request.selection, now)?;
        // Canonical reservation order.
        resolved.sort_by_key(|item| item.unit_id);

        let order_id = OrderId::new();

        let mut reserved: Vec<(ResolvedItem, u64)> = Vec::with_capacity(resolved.len());
        for item in &resolved {
            match self.reserve(order_id, item) {
                Ok(unit_price) => reserved.push((item.clone(), unit_price)),
                Err(err) => {
                    self.release(order_id, &reserved);
                    return Err(err);
                }
            }
        }

        // Order items carry the reservation-time price snapshots, not the
        // catalog's advisory prices.
        let items: Vec<OrderItem> = reserved
            .iter()
            .map(|(item, unit_price)| OrderItem {
                unit_id: item.unit_id,
                kind: item.kind,
                label: item.label.clone(),
                quantity: item.quantity,
                unit_price: *unit_price,
            })
            .collect();
        let totals =
            FeePolicy::new(self.config.service_fee_basis_points).totals(&items, request.discount);

        let place = OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            event_id: request.event_id,
            buyer: request.buyer.clone(),
            items,
            totals,
            currency: request.currency.clone(),
            expires_at: now + self.config.reservation_ttl(),
            occurred_at: now,
        });
        match self
            .dispatcher
            .dispatch(order_id.into(), streams::ORDER, &place, || {
                Order::empty(order_id)
            }) {
            Ok(committed) => self.projections.apply_committed(&committed)?,
            Err(err) => {
                self.release(order_id, &reserved);
                return Err(err.into());
            }
        }

        info!(%order_id, event_id = %request.event_id, total = totals.total, "order placed");
        Ok(order_id)
    }

    /// Reserve one unit and return the binding price snapshot it emitted.
    fn reserve(&self, order_id: OrderId, item: &ResolvedItem) -> Result<u64, ServiceError> {
        let cmd = UnitCommand::ReserveUnits(ReserveUnits {
            unit_id: item.unit_id,
            order_id,
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

        let first = committed.first().ok_or_else(|| {
            ServiceError::Domain(DomainError::invariant("reservation produced no events"))
        })?;
        let event: UnitEvent = serde_json::from_value(first.payload.clone())
            .map_err(|e| ServiceError::Dispatch(DispatchError::Deserialize(e.to_string())))?;
        match event {
            UnitEvent::UnitsReserved(e) => Ok(e.unit_price),
            _ => Err(ServiceError::Domain(DomainError::invariant(
                "reservation emitted an unexpected event",
            ))),
        }
    }

    /// Roll back reservations already made for an aborted checkout.
    fn release(&self, order_id: OrderId, reserved: &[(ResolvedItem, u64)]) {
        for (item, _) in reserved {
            let cmd = UnitCommand::ReleaseUnits(ReleaseUnits {
                unit_id: item.unit_id,
                order_id,
                quantity: item.quantity,
                occurred_at: Utc::now(),
            });
            let result = self.dispatcher.dispatch_with_retry(
                item.unit_id.into(),
                streams::SELLABLE_UNIT,
                &cmd,
                || SellableUnit::empty(item.unit_id),
            );
            match result {
                Ok(committed) => {
                    if let Err(err) = self.projections.apply_committed(&committed) {
                        warn!(%order_id, unit_id = %item.unit_id, ?err, "rollback projection lag");
                    }
                }
                Err(err) => {
                    warn!(%order_id, unit_id = %item.unit_id, ?err, "failed to roll back reservation")
                }
            }
        }
    }
}
