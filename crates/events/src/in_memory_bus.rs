//! Channel-backed bus for tests and single-process deployments.

use std::sync::{Mutex, mpsc};

use crate::bus::{EventBus, Subscription};

#[derive(Debug)]
pub enum InMemoryBusError {
    /// The subscriber list lock was poisoned.
    Poisoned,
}

/// Fan-out over std mpsc channels. Each subscriber owns a channel; a
/// publish clones the message into every live channel and prunes the
/// dead ones.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    senders: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut senders = self.senders.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        // A send fails only when the subscription was dropped; prune those.
        senders.retain(|sender| sender.send(message.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (sender, receiver) = mpsc::channel();
        // On a poisoned lock the subscription is still handed out; it just
        // never receives, and the next publish reports the poisoning.
        if let Ok(mut senders) = self.senders.lock() {
            senders.push(sender);
        }
        Subscription::new(receiver)
    }
}
