//! Boundaries to external systems: payment processor, notifications, and
//! ticket artifact rendering.

pub mod notifications;
pub mod payment_processor;
pub mod renderer;

pub use notifications::{Notification, NotificationDispatcher, NotificationError, TracingNotifier};
pub use payment_processor::{
    ChargeRequest, MockPaymentProcessor, PaymentIntent, PaymentProcessor, ProcessorError,
};
pub use renderer::{RenderError, TextTicketRenderer, TicketArtifact, TicketArtifactRenderer};
