//! Application services.
//!
//! Services compose aggregates, projections, and external boundaries into
//! the engine's operations: checkout (reserve + place), payment intent
//! management, webhook reconciliation, and ticket issuance/verification.

pub mod checkout;
pub mod payments;
pub mod reconciliation;
pub mod ticketing;

pub use checkout::{CheckoutRequest, CheckoutService};
pub use payments::PaymentsService;
pub use reconciliation::{PaymentWebhookEvent, ReconcileOutcome, ReconciliationService};
pub use ticketing::TicketingService;

use thiserror::Error;

use ticketforge_core::DomainError;

use crate::command_dispatcher::DispatchError;
use crate::external::ProcessorError;
use crate::journal::JournalError;
use crate::projections::ProjectionError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Domain rule rejection (validation, insufficient inventory, state
    /// conflicts, ...).
    #[error(transparent)]
    Domain(DomainError),

    /// Infrastructure-level dispatch failure.
    #[error(transparent)]
    Dispatch(DispatchError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        ServiceError::Domain(err)
    }
}

impl From<DispatchError> for ServiceError {
    fn from(err: DispatchError) -> Self {
        // Surface aggregate rejections with their full domain shape.
        match err {
            DispatchError::Domain(domain) => ServiceError::Domain(domain),
            other => ServiceError::Dispatch(other),
        }
    }
}
