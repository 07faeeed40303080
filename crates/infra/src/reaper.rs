//! Reservation expiry reaper.
//!
//! Expiry is reaper-only: nothing else transitions an order to `Expired`,
//! and an order past its TTL keeps holding inventory until a sweep picks it
//! up. Each sweep expires the order first, then releases its reservations;
//! a sweep that loses a race against a concurrent confirm or cancel simply
//! skips the order.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use ticketforge_core::DomainError;
use ticketforge_events::{EventBus, EventEnvelope};
use ticketforge_inventory::{ReleaseUnits, SellableUnit, UnitCommand};
use ticketforge_orders::{ExpireOrder, Order, OrderCommand};

use crate::command_dispatcher::CommandDispatcher;
use crate::event_store::EventStore;
use crate::projections::{OrderReadModel, Projections};
use crate::services::ServiceError;
use crate::streams;
use crate::workers::WorkerHandle;

pub struct ExpiryReaper;

impl ExpiryReaper {
    pub fn spawn<S, B>(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        projections: Arc<Projections>,
        interval: Duration,
    ) -> std::io::Result<WorkerHandle>
    where
        S: EventStore + 'static,
        B: EventBus<EventEnvelope<JsonValue>> + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let join = thread::Builder::new()
            .name("expiry-reaper".to_string())
            .spawn(move || {
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            sweep(&dispatcher, &projections);
                        }
                    }
                }
            })?;
        Ok(WorkerHandle::new(shutdown_tx, join))
    }
}

/// One reaper pass. Returns the number of orders expired.
pub fn sweep<S, B>(dispatcher: &CommandDispatcher<S, B>, projections: &Projections) -> usize
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let mut expired = 0;
    for order in projections.orders.expired_candidates(Utc::now()) {
        match expire_order(dispatcher, projections, &order) {
            Ok(()) => {
                info!(order_id = %order.order_id, "order expired, reservations released");
                expired += 1;
            }
            // Confirmed or cancelled since the candidate list was read.
            Err(ServiceError::Domain(DomainError::StateConflict { .. })) => {}
            Err(err) => warn!(order_id = %order.order_id, ?err, "failed to expire order"),
        }
    }
    expired
}

fn expire_order<S, B>(
    dispatcher: &CommandDispatcher<S, B>,
    projections: &Projections,
    order: &OrderReadModel,
) -> Result<(), ServiceError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let cmd = OrderCommand::ExpireOrder(ExpireOrder {
        order_id: order.order_id,
        occurred_at: Utc::now(),
    });
    let committed =
        dispatcher.dispatch_with_retry(order.order_id.into(), streams::ORDER, &cmd, || {
            Order::empty(order.order_id)
        })?;
    projections.apply_committed(&committed)?;

    for item in &order.items {
        let release = UnitCommand::ReleaseUnits(ReleaseUnits {
            unit_id: item.unit_id,
            order_id: order.order_id,
            quantity: item.quantity,
            occurred_at: Utc::now(),
        });
        let committed = dispatcher.dispatch_with_retry(
            item.unit_id.into(),
            streams::SELLABLE_UNIT,
            &release,
            || SellableUnit::empty(item.unit_id),
        )?;
        projections.apply_committed(&committed)?;
    }
    Ok(())
}
