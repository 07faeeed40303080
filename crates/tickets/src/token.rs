//! Scan-token derivation.

use sha2::{Digest, Sha256};

use ticketforge_core::TicketId;

/// Derive the scan token for a ticket.
///
/// One-way hash of the ticket identity and a server-side secret; the token
/// is printed into the QR artifact and is the only thing a scanner sends
/// back. Without the secret, tokens cannot be forged from ticket ids.
pub fn scan_token(ticket_id: TicketId, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ticket_id.as_uuid().as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}
