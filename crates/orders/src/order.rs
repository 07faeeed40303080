use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ticketforge_catalog::UnitKind;
use ticketforge_core::{
    Aggregate, AggregateRoot, CatalogEventId, DomainError, OrderId, UnitId, ValueObject,
};
use ticketforge_events::Event;

/// Order status lifecycle.
///
/// `Pending` and `Processing` are the only non-terminal states, apart from
/// the `Confirmed` -> `Refunded` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Confirmed,
    Failed,
    Cancelled,
    Expired,
    Refunded,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Expired => "expired",
            OrderStatus::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

/// Buyer contact snapshot taken at order placement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuyerContact {
    pub email: String,
    pub name: String,
    pub phone: String,
}

impl ValueObject for BuyerContact {}

/// Monetary totals of an order, in smallest currency unit (e.g., cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: u64,
    pub service_fee: u64,
    pub discount: u64,
    pub total: u64,
}

impl ValueObject for OrderTotals {}

/// Order line: one sellable unit, quantity, and the reservation-time price
/// snapshot. Immutable once the order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub unit_id: UnitId,
    pub kind: UnitKind,
    /// Display label snapshot, e.g. "Festival Pass - Day 1 - VIP".
    pub label: String,
    pub quantity: u32,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
}

impl OrderItem {
    pub fn subtotal(&self) -> u64 {
        u64::from(self.quantity) * self.unit_price
    }
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    event_id: Option<CatalogEventId>,
    status: OrderStatus,
    buyer: BuyerContact,
    items: Vec<OrderItem>,
    totals: OrderTotals,
    currency: String,
    payment_reference: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-placed aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            event_id: None,
            status: OrderStatus::Pending,
            buyer: BuyerContact::default(),
            items: Vec::new(),
            totals: OrderTotals::default(),
            currency: String::new(),
            payment_reference: None,
            paid_at: None,
            cancellation_reason: None,
            expires_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn event_id(&self) -> Option<CatalogEventId> {
        self.event_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn buyer(&self) -> &BuyerContact {
        &self.buyer
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn totals(&self) -> OrderTotals {
        self.totals
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// True when the TTL has elapsed and the reaper may expire this order.
    pub fn is_expirable(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.expires_at.is_some_and(|at| now > at)
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
///
/// Issued by the checkout service after every item's unit has been reserved;
/// items carry the reservation-time price snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub event_id: CatalogEventId,
    pub buyer: BuyerContact,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub currency: String,
    pub expires_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPayment {
    pub order_id: OrderId,
    pub payment_reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPayment {
    pub order_id: OrderId,
    pub payment_reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FailPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailPayment {
    pub order_id: OrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ExpireOrder (reaper only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RefundOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundOrder {
    pub order_id: OrderId,
    pub refund_reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    StartPayment(StartPayment),
    ConfirmPayment(ConfirmPayment),
    FailPayment(FailPayment),
    CancelOrder(CancelOrder),
    ExpireOrder(ExpireOrder),
    RefundOrder(RefundOrder),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub event_id: CatalogEventId,
    pub buyer: BuyerContact,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub currency: String,
    pub expires_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStarted {
    pub order_id: OrderId,
    pub payment_reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub order_id: OrderId,
    pub payment_reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderFailed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFailed {
    pub order_id: OrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderExpired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExpired {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderRefunded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRefunded {
    pub order_id: OrderId,
    pub refund_reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    PaymentStarted(PaymentStarted),
    OrderConfirmed(OrderConfirmed),
    OrderFailed(OrderFailed),
    OrderCancelled(OrderCancelled),
    OrderExpired(OrderExpired),
    OrderRefunded(OrderRefunded),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::PaymentStarted(_) => "orders.order.payment_started",
            OrderEvent::OrderConfirmed(_) => "orders.order.confirmed",
            OrderEvent::OrderFailed(_) => "orders.order.failed",
            OrderEvent::OrderCancelled(_) => "orders.order.cancelled",
            OrderEvent::OrderExpired(_) => "orders.order.expired",
            OrderEvent::OrderRefunded(_) => "orders.order.refunded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::PaymentStarted(e) => e.occurred_at,
            OrderEvent::OrderConfirmed(e) => e.occurred_at,
            OrderEvent::OrderFailed(e) => e.occurred_at,
            OrderEvent::OrderCancelled(e) => e.occurred_at,
            OrderEvent::OrderExpired(e) => e.occurred_at,
            OrderEvent::OrderRefunded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.event_id = Some(e.event_id);
                self.status = OrderStatus::Pending;
                self.buyer = e.buyer.clone();
                self.items = e.items.clone();
                self.totals = e.totals;
                self.currency = e.currency.clone();
                self.expires_at = Some(e.expires_at);
                self.created = true;
            }
            OrderEvent::PaymentStarted(e) => {
                self.status = OrderStatus::Processing;
                self.payment_reference = Some(e.payment_reference.clone());
            }
            OrderEvent::OrderConfirmed(e) => {
                self.status = OrderStatus::Confirmed;
                self.payment_reference = Some(e.payment_reference.clone());
                self.paid_at = Some(e.occurred_at);
            }
            OrderEvent::OrderFailed(_) => {
                self.status = OrderStatus::Failed;
            }
            OrderEvent::OrderCancelled(e) => {
                self.status = OrderStatus::Cancelled;
                self.cancellation_reason = Some(e.reason.clone());
            }
            OrderEvent::OrderExpired(_) => {
                self.status = OrderStatus::Expired;
            }
            OrderEvent::OrderRefunded(_) => {
                self.status = OrderStatus::Refunded;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::StartPayment(cmd) => self.handle_start_payment(cmd),
            OrderCommand::ConfirmPayment(cmd) => self.handle_confirm(cmd),
            OrderCommand::FailPayment(cmd) => self.handle_fail(cmd),
            OrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
            OrderCommand::ExpireOrder(cmd) => self.handle_expire(cmd),
            OrderCommand::RefundOrder(cmd) => self.handle_refund(cmd),
        }
    }
}

impl Order {
    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_placed(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already placed"));
        }
        if cmd.items.is_empty() {
            return Err(DomainError::validation("order has no items"));
        }
        if cmd.items.iter().any(|item| item.quantity == 0) {
            return Err(DomainError::validation("item quantity must be positive"));
        }
        if cmd.currency.len() != 3 {
            return Err(DomainError::validation("currency must be a 3-letter code"));
        }
        if cmd.buyer.email.trim().is_empty() {
            return Err(DomainError::validation("buyer email is required"));
        }

        let subtotal: u64 = cmd.items.iter().map(OrderItem::subtotal).sum();
        if cmd.totals.subtotal != subtotal {
            return Err(DomainError::validation("subtotal does not match items"));
        }
        let expected_total =
            (cmd.totals.subtotal + cmd.totals.service_fee).saturating_sub(cmd.totals.discount);
        if cmd.totals.total != expected_total {
            return Err(DomainError::validation("total does not match components"));
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            event_id: cmd.event_id,
            buyer: cmd.buyer.clone(),
            items: cmd.items.clone(),
            totals: cmd.totals,
            currency: cmd.currency.clone(),
            expires_at: cmd.expires_at,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_payment(&self, cmd: &StartPayment) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        self.ensure_order_id(cmd.order_id)?;

        if cmd.payment_reference.trim().is_empty() {
            return Err(DomainError::validation("payment reference is required"));
        }
        if self.status != OrderStatus::Pending {
            return Err(DomainError::state_conflict(
                "start payment",
                self.status.to_string(),
            ));
        }

        Ok(vec![OrderEvent::PaymentStarted(PaymentStarted {
            order_id: cmd.order_id,
            payment_reference: cmd.payment_reference.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmPayment) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        self.ensure_order_id(cmd.order_id)?;

        if self.status != OrderStatus::Processing {
            return Err(DomainError::state_conflict(
                "confirm payment",
                self.status.to_string(),
            ));
        }

        Ok(vec![OrderEvent::OrderConfirmed(OrderConfirmed {
            order_id: cmd.order_id,
            payment_reference: cmd.payment_reference.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fail(&self, cmd: &FailPayment) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        self.ensure_order_id(cmd.order_id)?;

        if self.status != OrderStatus::Processing {
            return Err(DomainError::state_conflict(
                "fail payment",
                self.status.to_string(),
            ));
        }

        Ok(vec![OrderEvent::OrderFailed(OrderFailed {
            order_id: cmd.order_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        self.ensure_order_id(cmd.order_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::state_conflict(
                "cancel order",
                self.status.to_string(),
            ));
        }

        Ok(vec![OrderEvent::OrderCancelled(OrderCancelled {
            order_id: cmd.order_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_expire(&self, cmd: &ExpireOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        self.ensure_order_id(cmd.order_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::state_conflict(
                "expire order",
                self.status.to_string(),
            ));
        }

        Ok(vec![OrderEvent::OrderExpired(OrderExpired {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_refund(&self, cmd: &RefundOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        self.ensure_order_id(cmd.order_id)?;

        if self.status != OrderStatus::Confirmed {
            return Err(DomainError::state_conflict(
                "refund order",
                self.status.to_string(),
            ));
        }

        Ok(vec![OrderEvent::OrderRefunded(OrderRefunded {
            order_id: cmd.order_id,
            refund_reference: cmd.refund_reference.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::FeePolicy;
    use chrono::Duration;

    fn test_order_id() -> OrderId {
        OrderId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_buyer() -> BuyerContact {
        BuyerContact {
            email: "buyer@example.com".to_string(),
            name: "Alex Buyer".to_string(),
            phone: String::new(),
        }
    }

    fn test_items() -> Vec<OrderItem> {
        vec![OrderItem {
            unit_id: UnitId::new(),
            kind: UnitKind::DayTierCell,
            label: "Festival Pass - Day 1 - VIP".to_string(),
            quantity: 2,
            unit_price: 15_000,
        }]
    }

    fn place_cmd(order_id: OrderId) -> PlaceOrder {
        let items = test_items();
        let totals = FeePolicy::default().totals(&items, 0);
        PlaceOrder {
            order_id,
            event_id: CatalogEventId::new(),
            buyer: test_buyer(),
            items,
            totals,
            currency: "USD".to_string(),
            expires_at: test_time() + Duration::minutes(15),
            occurred_at: test_time(),
        }
    }

    fn placed_order() -> Order {
        let order_id = test_order_id();
        let mut order = Order::empty(order_id);
        let events = order
            .handle(&OrderCommand::PlaceOrder(place_cmd(order_id)))
            .unwrap();
        for event in &events {
            order.apply(event);
        }
        order
    }

    fn drive(order: &mut Order, command: OrderCommand) -> Result<(), DomainError> {
        let events = order.handle(&command)?;
        for event in &events {
            order.apply(event);
        }
        Ok(())
    }

    fn start_payment(order: &mut Order, reference: &str) {
        drive(
            order,
            OrderCommand::StartPayment(StartPayment {
                order_id: order.id_typed(),
                payment_reference: reference.to_string(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
    }

    #[test]
    fn place_order_emits_order_placed_event() {
        let order_id = test_order_id();
        let order = Order::empty(order_id);
        let cmd = place_cmd(order_id);

        let events = order
            .handle(&OrderCommand::PlaceOrder(cmd.clone()))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            OrderEvent::OrderPlaced(e) => {
                assert_eq!(e.order_id, order_id);
                assert_eq!(e.items.len(), 1);
                assert_eq!(e.totals.subtotal, 30_000);
                assert_eq!(e.totals.service_fee, 1_500);
                assert_eq!(e.totals.total, 31_500);
            }
            _ => panic!("Expected OrderPlaced event"),
        }
    }

    #[test]
    fn place_rejects_mismatched_totals() {
        let order_id = test_order_id();
        let order = Order::empty(order_id);
        let mut cmd = place_cmd(order_id);
        cmd.totals.total += 1;

        let err = order.handle(&OrderCommand::PlaceOrder(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn full_lifecycle_to_refund() {
        let mut order = placed_order();
        assert_eq!(order.status(), OrderStatus::Pending);

        start_payment(&mut order, "pi_123");
        assert_eq!(order.status(), OrderStatus::Processing);
        assert_eq!(order.payment_reference(), Some("pi_123"));

        let order_id = order.id_typed();
        drive(
            &mut order,
            OrderCommand::ConfirmPayment(ConfirmPayment {
                order_id,
                payment_reference: "pi_123".to_string(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert!(order.paid_at().is_some());

        let order_id = order.id_typed();
        drive(
            &mut order,
            OrderCommand::RefundOrder(RefundOrder {
                order_id,
                refund_reference: Some("re_456".to_string()),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(order.status(), OrderStatus::Refunded);
        assert_eq!(order.version(), 4);
    }

    #[test]
    fn cannot_confirm_pending_order() {
        let order = placed_order();

        let err = order
            .handle(&OrderCommand::ConfirmPayment(ConfirmPayment {
                order_id: order.id_typed(),
                payment_reference: "pi_123".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();

        assert!(matches!(err, DomainError::StateConflict { .. }));
    }

    #[test]
    fn cannot_start_payment_twice() {
        let mut order = placed_order();
        start_payment(&mut order, "pi_123");

        let err = order
            .handle(&OrderCommand::StartPayment(StartPayment {
                order_id: order.id_typed(),
                payment_reference: "pi_456".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();

        assert!(matches!(err, DomainError::StateConflict { .. }));
        assert_eq!(order.payment_reference(), Some("pi_123"));
    }

    #[test]
    fn cancel_is_valid_from_pending_and_processing_only() {
        let mut pending = placed_order();
        let order_id = pending.id_typed();
        drive(
            &mut pending,
            OrderCommand::CancelOrder(CancelOrder {
                order_id,
                reason: "changed my mind".to_string(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(pending.status(), OrderStatus::Cancelled);
        assert_eq!(pending.cancellation_reason(), Some("changed my mind"));

        // Terminal orders cannot be cancelled again.
        let err = pending
            .handle(&OrderCommand::CancelOrder(CancelOrder {
                order_id: pending.id_typed(),
                reason: "again".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::StateConflict { .. }));
    }

    #[test]
    fn expire_races_with_cancel_loser_conflicts() {
        let mut order = placed_order();
        let order_id = order.id_typed();
        drive(
            &mut order,
            OrderCommand::ExpireOrder(ExpireOrder {
                order_id,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(order.status(), OrderStatus::Expired);

        let err = order
            .handle(&OrderCommand::CancelOrder(CancelOrder {
                order_id: order.id_typed(),
                reason: "buyer cancel after expiry".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::StateConflict { .. }));
    }

    #[test]
    fn expired_order_cannot_be_confirmed() {
        let mut order = placed_order();
        start_payment(&mut order, "pi_123");
        let order_id = order.id_typed();
        drive(
            &mut order,
            OrderCommand::ExpireOrder(ExpireOrder {
                order_id,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = order
            .handle(&OrderCommand::ConfirmPayment(ConfirmPayment {
                order_id: order.id_typed(),
                payment_reference: "pi_123".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::StateConflict { .. }));
        assert_eq!(order.status(), OrderStatus::Expired);
    }

    #[test]
    fn refund_requires_confirmed() {
        let order = placed_order();

        let err = order
            .handle(&OrderCommand::RefundOrder(RefundOrder {
                order_id: order.id_typed(),
                refund_reference: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();

        assert!(matches!(err, DomainError::StateConflict { .. }));
    }

    #[test]
    fn is_expirable_tracks_ttl_and_terminal_states() {
        let mut order = placed_order();
        let expires_at = order.expires_at().unwrap();

        assert!(!order.is_expirable(expires_at - Duration::seconds(1)));
        assert!(order.is_expirable(expires_at + Duration::seconds(1)));

        let order_id = order.id_typed();
        drive(
            &mut order,
            OrderCommand::CancelOrder(CancelOrder {
                order_id,
                reason: String::new(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert!(!order.is_expirable(expires_at + Duration::seconds(1)));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let order = placed_order();
        let before = order.clone();

        let _ = order.handle(&OrderCommand::StartPayment(StartPayment {
            order_id: order.id_typed(),
            payment_reference: "pi_123".to_string(),
            occurred_at: test_time(),
        }));

        assert_eq!(order, before);
    }

    #[test]
    fn apply_is_deterministic() {
        let order_id = test_order_id();
        let cmd = place_cmd(order_id);
        let events = Order::empty(order_id)
            .handle(&OrderCommand::PlaceOrder(cmd))
            .unwrap();

        let mut a = Order::empty(order_id);
        let mut b = Order::empty(order_id);
        for event in &events {
            a.apply(event);
            b.apply(event);
        }
        assert_eq!(a, b);
        assert_eq!(a.version(), 1);
    }
}
