//! Background worker plumbing.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::warn;

use ticketforge_events::{EventBus, EventEnvelope, Subscription};

use crate::projections::Projections;

const TICK: Duration = Duration::from_millis(250);

/// Handle to a spawned worker thread.
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub(crate) fn new(shutdown: mpsc::Sender<()>, join: thread::JoinHandle<()>) -> Self {
        Self {
            shutdown,
            join: Some(join),
        }
    }

    /// Signal the worker to stop and wait for it to exit.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Bus-driven projection updater.
///
/// Folds published envelopes into the projections. Services already apply
/// their own committed events synchronously; the cursors make this worker's
/// second delivery a no-op, so it only matters for envelopes committed by
/// other writers.
pub struct ProjectionWorker;

impl ProjectionWorker {
    pub fn spawn<B>(
        name: &str,
        bus: &B,
        projections: Arc<Projections>,
    ) -> std::io::Result<WorkerHandle>
    where
        B: EventBus<EventEnvelope<JsonValue>>,
    {
        let subscription = bus.subscribe();
        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(subscription, shutdown_rx, projections))?;
        Ok(WorkerHandle::new(shutdown_tx, join))
    }
}

fn worker_loop(
    subscription: Subscription<EventEnvelope<JsonValue>>,
    shutdown: mpsc::Receiver<()>,
    projections: Arc<Projections>,
) {
    loop {
        if shutdown.try_recv().is_ok() {
            break;
        }
        match subscription.recv_timeout(TICK) {
            Ok(envelope) => {
                if let Err(err) = projections.apply_envelope(&envelope) {
                    warn!(?err, event_id = %envelope.event_id(), "projection apply failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}
