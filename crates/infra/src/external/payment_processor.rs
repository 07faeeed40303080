//! Payment processor boundary.

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use ticketforge_core::OrderId;

/// Charge to open with the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub order_id: OrderId,
    /// Amount in smallest currency unit.
    pub amount: u64,
    pub currency: String,
}

/// Opened payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    /// Processor reference (e.g. `pi_...`). Stored on the order and echoed
    /// back in webhook events.
    pub reference: String,
    /// Client-side confirmation secret; absent when returning an intent
    /// that was opened earlier.
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessorError {
    #[error("processor rejected the request: {0}")]
    Rejected(String),
    #[error("processor unavailable: {0}")]
    Unavailable(String),
}

/// Outbound calls to the payment processor.
///
/// Confirmation never comes from these calls; it arrives asynchronously as
/// webhook events handled by the reconciler.
pub trait PaymentProcessor: Send + Sync {
    fn create_intent(&self, request: &ChargeRequest) -> Result<PaymentIntent, ProcessorError>;

    /// Request a refund of the full charge. Returns the refund reference.
    fn refund(&self, payment_reference: &str) -> Result<String, ProcessorError>;
}

impl<P> PaymentProcessor for Arc<P>
where
    P: PaymentProcessor + ?Sized,
{
    fn create_intent(&self, request: &ChargeRequest) -> Result<PaymentIntent, ProcessorError> {
        (**self).create_intent(request)
    }

    fn refund(&self, payment_reference: &str) -> Result<String, ProcessorError> {
        (**self).refund(payment_reference)
    }
}

/// Deterministic processor stub for tests/dev.
#[derive(Debug, Default)]
pub struct MockPaymentProcessor {
    intents: Mutex<Vec<ChargeRequest>>,
    refunds: Mutex<Vec<String>>,
}

impl MockPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intent_requests(&self) -> Vec<ChargeRequest> {
        self.intents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn refund_requests(&self) -> Vec<String> {
        self.refunds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PaymentProcessor for MockPaymentProcessor {
    fn create_intent(&self, request: &ChargeRequest) -> Result<PaymentIntent, ProcessorError> {
        let mut intents = self.intents.lock().unwrap_or_else(PoisonError::into_inner);
        intents.push(request.clone());
        let n = intents.len();
        Ok(PaymentIntent {
            reference: format!("pi_{n}"),
            client_secret: Some(format!("pi_{n}_secret")),
        })
    }

    fn refund(&self, payment_reference: &str) -> Result<String, ProcessorError> {
        let mut refunds = self.refunds.lock().unwrap_or_else(PoisonError::into_inner);
        refunds.push(payment_reference.to_string());
        Ok(format!("re_{}", refunds.len()))
    }
}
