//! Ticket artifact rendering boundary.
//!
//! Produces the deliverable handed to the buyer (PDF, QR image, pass file).
//! The artifact embeds the scan token, never the ticket id.

use thiserror::Error;

use ticketforge_core::TicketId;

use crate::projections::TicketReadModel;

/// Rendered deliverable for one ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketArtifact {
    pub ticket_id: TicketId,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("failed to render ticket artifact: {0}")]
    Failed(String),
}

pub trait TicketArtifactRenderer: Send + Sync {
    fn render(&self, ticket: &TicketReadModel) -> Result<TicketArtifact, RenderError>;
}

/// Plain-text renderer for tests/dev.
#[derive(Debug, Default)]
pub struct TextTicketRenderer;

impl TicketArtifactRenderer for TextTicketRenderer {
    fn render(&self, ticket: &TicketReadModel) -> Result<TicketArtifact, RenderError> {
        let body = format!(
            "{label}\norder: {order_id}\ntoken: {token}\n",
            label = ticket.label,
            order_id = ticket.order_id,
            token = ticket.scan_token,
        );
        Ok(TicketArtifact {
            ticket_id: ticket.ticket_id,
            content_type: "text/plain".to_string(),
            bytes: body.into_bytes(),
        })
    }
}
