//! Ticket issuance and verification domain (event-sourced).
//!
//! Individual tickets minted on order confirmation, plus the scan-token
//! derivation and the scan state machine. Pure domain logic; the
//! token-to-ticket index and the per-ticket CAS live in infra.

pub mod ticket;
pub mod token;

pub use ticket::{
    CancelTicket, ExpireTicket, IssueTicket, Ticket, TicketCancelled, TicketCommand, TicketEvent,
    TicketExpired, TicketIssued, TicketScanned, TicketStatus, VerifyTicket,
};
pub use token::scan_token;
