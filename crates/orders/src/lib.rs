//! Order lifecycle domain (event-sourced).
//!
//! The order state machine and totals policy, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Inventory
//! effects of each transition are composed by the application services.

pub mod order;
pub mod pricing;

pub use order::{
    BuyerContact, CancelOrder, ConfirmPayment, ExpireOrder, FailPayment, Order, OrderCancelled,
    OrderCommand, OrderConfirmed, OrderEvent, OrderExpired, OrderFailed, OrderItem, OrderPlaced,
    OrderRefunded, OrderStatus, OrderTotals, PaymentStarted, PlaceOrder, RefundOrder,
    StartPayment,
};
pub use pricing::{DEFAULT_FEE_BASIS_POINTS, FeePolicy};
