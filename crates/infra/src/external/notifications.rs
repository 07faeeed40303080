//! Buyer notifications.
//!
//! Notifications are fire-and-forget: a failed send is logged and never
//! rolls back the state transition that triggered it.

use std::sync::Arc;

use thiserror::Error;

use ticketforge_core::OrderId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    OrderConfirmed {
        order_id: OrderId,
        email: String,
        ticket_count: usize,
    },
    OrderFailed {
        order_id: OrderId,
        email: String,
        reason: String,
    },
    OrderRefunded {
        order_id: OrderId,
        email: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("notification channel failed: {0}")]
    Channel(String),
}

pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notification: &Notification) -> Result<(), NotificationError>;
}

impl<N> NotificationDispatcher for Arc<N>
where
    N: NotificationDispatcher + ?Sized,
{
    fn dispatch(&self, notification: &Notification) -> Result<(), NotificationError> {
        (**self).dispatch(notification)
    }
}

/// Default dispatcher: structured log lines instead of outbound email.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl NotificationDispatcher for TracingNotifier {
    fn dispatch(&self, notification: &Notification) -> Result<(), NotificationError> {
        match notification {
            Notification::OrderConfirmed {
                order_id,
                email,
                ticket_count,
            } => tracing::info!(%order_id, email, ticket_count, "order confirmed"),
            Notification::OrderFailed {
                order_id,
                email,
                reason,
            } => tracing::info!(%order_id, email, reason, "order failed"),
            Notification::OrderRefunded { order_id, email } => {
                tracing::info!(%order_id, email, "order refunded")
            }
        }
        Ok(())
    }
}
