//! Pub/sub seam between the event store and its consumers.
//!
//! Committed envelopes fan out to subscribers (projection workers, and
//! whatever else wants to watch the streams). The bus carries no truth of
//! its own: events land in the store first and are published after, so a
//! dropped publish is recoverable by replaying the store. Delivery is
//! at-least-once and consumers are expected to deduplicate.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// One consumer's end of the bus.
///
/// Every subscription sees every message published after it was opened
/// (broadcast). A subscription is single-consumer; give each worker thread
/// its own.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Wait for the next message, giving up after `timeout`. Workers use
    /// this so their loops stay responsive to shutdown.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Transport-agnostic publish/subscribe.
///
/// A failed `publish` surfaces to the caller; the events it carried are
/// already durable, so publishing again is always safe.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
