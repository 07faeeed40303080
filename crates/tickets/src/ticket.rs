use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ticketforge_core::{Aggregate, AggregateRoot, DomainError, OrderId, TicketId, UnitId, UserId};
use ticketforge_events::Event;

/// Ticket status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Valid, not yet scanned.
    Active,
    /// Scanned at the gate.
    Used,
    /// Order cancelled/refunded.
    Cancelled,
    /// Event date passed.
    Expired,
}

impl core::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            TicketStatus::Active => "active",
            TicketStatus::Used => "used",
            TicketStatus::Cancelled => "cancelled",
            TicketStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Aggregate root: Ticket.
///
/// One row per admission; an order item with quantity N mints N of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    id: TicketId,
    order_id: Option<OrderId>,
    unit_id: Option<UnitId>,
    label: String,
    /// Price paid, in smallest currency unit (e.g., cents).
    price: u64,
    status: TicketStatus,
    used_at: Option<DateTime<Utc>>,
    verified_by: Option<UserId>,
    version: u64,
    created: bool,
}

impl Ticket {
    /// Create an empty, not-yet-issued aggregate instance for rehydration.
    pub fn empty(id: TicketId) -> Self {
        Self {
            id,
            order_id: None,
            unit_id: None,
            label: String::new(),
            price: 0,
            status: TicketStatus::Active,
            used_at: None,
            verified_by: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TicketId {
        self.id
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn unit_id(&self) -> Option<UnitId> {
        self.unit_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn status(&self) -> TicketStatus {
        self.status
    }

    pub fn used_at(&self) -> Option<DateTime<Utc>> {
        self.used_at
    }

    pub fn verified_by(&self) -> Option<UserId> {
        self.verified_by
    }
}

impl AggregateRoot for Ticket {
    type Id = TicketId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: IssueTicket (on order confirmation only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueTicket {
    pub ticket_id: TicketId,
    pub order_id: OrderId,
    pub unit_id: UnitId,
    pub label: String,
    pub price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: VerifyTicket (gate scan).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyTicket {
    pub ticket_id: TicketId,
    pub verified_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelTicket (order refunded or cancelled post-issue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelTicket {
    pub ticket_id: TicketId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ExpireTicket (event date passed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireTicket {
    pub ticket_id: TicketId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketCommand {
    IssueTicket(IssueTicket),
    VerifyTicket(VerifyTicket),
    CancelTicket(CancelTicket),
    ExpireTicket(ExpireTicket),
}

/// Event: TicketIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketIssued {
    pub ticket_id: TicketId,
    pub order_id: OrderId,
    pub unit_id: UnitId,
    pub label: String,
    pub price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TicketScanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketScanned {
    pub ticket_id: TicketId,
    pub verified_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TicketCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCancelled {
    pub ticket_id: TicketId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TicketExpired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketExpired {
    pub ticket_id: TicketId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketEvent {
    TicketIssued(TicketIssued),
    TicketScanned(TicketScanned),
    TicketCancelled(TicketCancelled),
    TicketExpired(TicketExpired),
}

impl Event for TicketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TicketEvent::TicketIssued(_) => "tickets.ticket.issued",
            TicketEvent::TicketScanned(_) => "tickets.ticket.scanned",
            TicketEvent::TicketCancelled(_) => "tickets.ticket.cancelled",
            TicketEvent::TicketExpired(_) => "tickets.ticket.expired",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TicketEvent::TicketIssued(e) => e.occurred_at,
            TicketEvent::TicketScanned(e) => e.occurred_at,
            TicketEvent::TicketCancelled(e) => e.occurred_at,
            TicketEvent::TicketExpired(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Ticket {
    type Command = TicketCommand;
    type Event = TicketEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TicketEvent::TicketIssued(e) => {
                self.id = e.ticket_id;
                self.order_id = Some(e.order_id);
                self.unit_id = Some(e.unit_id);
                self.label = e.label.clone();
                self.price = e.price;
                self.status = TicketStatus::Active;
                self.created = true;
            }
            TicketEvent::TicketScanned(e) => {
                self.status = TicketStatus::Used;
                self.used_at = Some(e.occurred_at);
                self.verified_by = Some(e.verified_by);
            }
            TicketEvent::TicketCancelled(_) => {
                self.status = TicketStatus::Cancelled;
            }
            TicketEvent::TicketExpired(_) => {
                self.status = TicketStatus::Expired;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TicketCommand::IssueTicket(cmd) => self.handle_issue(cmd),
            TicketCommand::VerifyTicket(cmd) => self.handle_verify(cmd),
            TicketCommand::CancelTicket(cmd) => self.handle_cancel(cmd),
            TicketCommand::ExpireTicket(cmd) => self.handle_expire(cmd),
        }
    }
}

impl Ticket {
    fn ensure_ticket_id(&self, ticket_id: TicketId) -> Result<(), DomainError> {
        if self.id != ticket_id {
            return Err(DomainError::invariant("ticket_id mismatch"));
        }
        Ok(())
    }

    fn ensure_issued(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_issue(&self, cmd: &IssueTicket) -> Result<Vec<TicketEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("ticket already issued"));
        }
        Ok(vec![TicketEvent::TicketIssued(TicketIssued {
            ticket_id: cmd.ticket_id,
            order_id: cmd.order_id,
            unit_id: cmd.unit_id,
            label: cmd.label.clone(),
            price: cmd.price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_verify(&self, cmd: &VerifyTicket) -> Result<Vec<TicketEvent>, DomainError> {
        self.ensure_issued()?;
        self.ensure_ticket_id(cmd.ticket_id)?;

        match self.status {
            TicketStatus::Active => Ok(vec![TicketEvent::TicketScanned(TicketScanned {
                ticket_id: cmd.ticket_id,
                verified_by: cmd.verified_by,
                occurred_at: cmd.occurred_at,
            })]),
            TicketStatus::Used => {
                let used_at = self
                    .used_at
                    .ok_or_else(|| DomainError::invariant("used ticket missing used_at"))?;
                Err(DomainError::AlreadyUsed { used_at })
            }
            TicketStatus::Cancelled | TicketStatus::Expired => Err(DomainError::state_conflict(
                "verify ticket",
                self.status.to_string(),
            )),
        }
    }

    fn handle_cancel(&self, cmd: &CancelTicket) -> Result<Vec<TicketEvent>, DomainError> {
        self.ensure_issued()?;
        self.ensure_ticket_id(cmd.ticket_id)?;

        if self.status != TicketStatus::Active {
            return Err(DomainError::state_conflict(
                "cancel ticket",
                self.status.to_string(),
            ));
        }

        Ok(vec![TicketEvent::TicketCancelled(TicketCancelled {
            ticket_id: cmd.ticket_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_expire(&self, cmd: &ExpireTicket) -> Result<Vec<TicketEvent>, DomainError> {
        self.ensure_issued()?;
        self.ensure_ticket_id(cmd.ticket_id)?;

        if self.status != TicketStatus::Active {
            return Err(DomainError::state_conflict(
                "expire ticket",
                self.status.to_string(),
            ));
        }

        Ok(vec![TicketEvent::TicketExpired(TicketExpired {
            ticket_id: cmd.ticket_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
