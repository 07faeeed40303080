use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ticketforge_catalog::UnitKind;
use ticketforge_core::{Aggregate, AggregateRoot, DomainError, OrderId, TicketTypeId, UnitId};
use ticketforge_events::Event;

/// Aggregate root: SellableUnit.
///
/// One inventory row per pricing variant (simple ticket type, tier, day
/// pass, or day+tier cell). Counter rule, checked on every command:
/// `reserved + sold <= total`, all counters non-negative.
///
/// Holds are tracked per order so a redelivered commit or release for an
/// order whose hold is already settled emits nothing instead of double
/// counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellableUnit {
    id: UnitId,
    ticket_type_id: Option<TicketTypeId>,
    kind: UnitKind,
    label: String,
    /// Price in smallest currency unit (e.g., cents).
    price: u64,
    total_quantity: u32,
    reserved_quantity: u32,
    sold_quantity: u32,
    /// Outstanding hold per order; `reserved_quantity` is the sum of values.
    reservations: BTreeMap<OrderId, u32>,
    /// Orders whose hold has been converted to a sale.
    committed_orders: BTreeSet<OrderId>,
    version: u64,
    created: bool,
}

impl SellableUnit {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: UnitId) -> Self {
        Self {
            id,
            ticket_type_id: None,
            kind: UnitKind::SimpleTicket,
            label: String::new(),
            price: 0,
            total_quantity: 0,
            reserved_quantity: 0,
            sold_quantity: 0,
            reservations: BTreeMap::new(),
            committed_orders: BTreeSet::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> UnitId {
        self.id
    }

    pub fn ticket_type_id(&self) -> Option<TicketTypeId> {
        self.ticket_type_id
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn total_quantity(&self) -> u32 {
        self.total_quantity
    }

    pub fn reserved_quantity(&self) -> u32 {
        self.reserved_quantity
    }

    pub fn sold_quantity(&self) -> u32 {
        self.sold_quantity
    }

    /// Quantity currently held for a specific order.
    pub fn reserved_for(&self, order_id: OrderId) -> u32 {
        self.reservations.get(&order_id).copied().unwrap_or(0)
    }

    /// Whether the order's hold has already been converted to a sale.
    pub fn is_committed_for(&self, order_id: OrderId) -> bool {
        self.committed_orders.contains(&order_id)
    }

    /// Capacity still open for reservation.
    pub fn available(&self) -> u32 {
        self.total_quantity - self.reserved_quantity - self.sold_quantity
    }

    pub fn is_sold_out(&self) -> bool {
        self.available() == 0
    }
}

impl AggregateRoot for SellableUnit {
    type Id = UnitId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterUnit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterUnit {
    pub unit_id: UnitId,
    pub ticket_type_id: TicketTypeId,
    pub kind: UnitKind,
    pub label: String,
    pub price: u64,
    pub total_quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveUnits (provisional claim at order creation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveUnits {
    pub unit_id: UnitId,
    pub order_id: OrderId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CommitUnits (reservation becomes a sale on payment success).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitUnits {
    pub unit_id: UnitId,
    pub order_id: OrderId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseUnits (reservation returned on cancel/expire/failure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseUnits {
    pub unit_id: UnitId,
    pub order_id: OrderId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangePrice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePrice {
    pub unit_id: UnitId,
    pub price: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitCommand {
    RegisterUnit(RegisterUnit),
    ReserveUnits(ReserveUnits),
    CommitUnits(CommitUnits),
    ReleaseUnits(ReleaseUnits),
    ChangePrice(ChangePrice),
}

/// Event: UnitRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRegistered {
    pub unit_id: UnitId,
    pub ticket_type_id: TicketTypeId,
    pub kind: UnitKind,
    pub label: String,
    pub price: u64,
    pub total_quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UnitsReserved.
///
/// Carries the binding price snapshot for the order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitsReserved {
    pub unit_id: UnitId,
    pub order_id: OrderId,
    pub quantity: u32,
    pub unit_price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UnitsCommitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitsCommitted {
    pub unit_id: UnitId,
    pub order_id: OrderId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UnitsReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitsReleased {
    pub unit_id: UnitId,
    pub order_id: OrderId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PriceChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChanged {
    pub unit_id: UnitId,
    pub price: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitEvent {
    UnitRegistered(UnitRegistered),
    UnitsReserved(UnitsReserved),
    UnitsCommitted(UnitsCommitted),
    UnitsReleased(UnitsReleased),
    PriceChanged(PriceChanged),
}

impl Event for UnitEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UnitEvent::UnitRegistered(_) => "inventory.unit.registered",
            UnitEvent::UnitsReserved(_) => "inventory.unit.reserved",
            UnitEvent::UnitsCommitted(_) => "inventory.unit.committed",
            UnitEvent::UnitsReleased(_) => "inventory.unit.released",
            UnitEvent::PriceChanged(_) => "inventory.unit.price_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UnitEvent::UnitRegistered(e) => e.occurred_at,
            UnitEvent::UnitsReserved(e) => e.occurred_at,
            UnitEvent::UnitsCommitted(e) => e.occurred_at,
            UnitEvent::UnitsReleased(e) => e.occurred_at,
            UnitEvent::PriceChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SellableUnit {
    type Command = UnitCommand;
    type Event = UnitEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UnitEvent::UnitRegistered(e) => {
                self.id = e.unit_id;
                self.ticket_type_id = Some(e.ticket_type_id);
                self.kind = e.kind;
                self.label = e.label.clone();
                self.price = e.price;
                self.total_quantity = e.total_quantity;
                self.reserved_quantity = 0;
                self.sold_quantity = 0;
                self.reservations.clear();
                self.committed_orders.clear();
                self.created = true;
            }
            UnitEvent::UnitsReserved(e) => {
                *self.reservations.entry(e.order_id).or_insert(0) += e.quantity;
                self.reserved_quantity += e.quantity;
            }
            UnitEvent::UnitsCommitted(e) => {
                self.settle_hold(e.order_id, e.quantity);
                self.committed_orders.insert(e.order_id);
                self.reserved_quantity -= e.quantity;
                self.sold_quantity += e.quantity;
            }
            UnitEvent::UnitsReleased(e) => {
                self.settle_hold(e.order_id, e.quantity);
                self.reserved_quantity -= e.quantity;
            }
            UnitEvent::PriceChanged(e) => {
                self.price = e.price;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UnitCommand::RegisterUnit(cmd) => self.handle_register(cmd),
            UnitCommand::ReserveUnits(cmd) => self.handle_reserve(cmd),
            UnitCommand::CommitUnits(cmd) => self.handle_commit(cmd),
            UnitCommand::ReleaseUnits(cmd) => self.handle_release(cmd),
            UnitCommand::ChangePrice(cmd) => self.handle_change_price(cmd),
        }
    }
}

impl SellableUnit {
    fn settle_hold(&mut self, order_id: OrderId, quantity: u32) {
        if let Some(held) = self.reservations.get_mut(&order_id) {
            *held -= quantity;
            if *held == 0 {
                self.reservations.remove(&order_id);
            }
        }
    }

    fn ensure_unit_id(&self, unit_id: UnitId) -> Result<(), DomainError> {
        if self.id != unit_id {
            return Err(DomainError::invariant("unit_id mismatch"));
        }
        Ok(())
    }

    fn ensure_registered(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterUnit) -> Result<Vec<UnitEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("unit already registered"));
        }
        if cmd.total_quantity == 0 {
            return Err(DomainError::validation("total_quantity must be positive"));
        }
        Ok(vec![UnitEvent::UnitRegistered(UnitRegistered {
            unit_id: cmd.unit_id,
            ticket_type_id: cmd.ticket_type_id,
            kind: cmd.kind,
            label: cmd.label.clone(),
            price: cmd.price,
            total_quantity: cmd.total_quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &ReserveUnits) -> Result<Vec<UnitEvent>, DomainError> {
        self.ensure_registered()?;
        self.ensure_unit_id(cmd.unit_id)?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let available = self.available();
        if cmd.quantity > available {
            return Err(DomainError::insufficient(available, cmd.quantity));
        }

        Ok(vec![UnitEvent::UnitsReserved(UnitsReserved {
            unit_id: cmd.unit_id,
            order_id: cmd.order_id,
            quantity: cmd.quantity,
            unit_price: self.price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_commit(&self, cmd: &CommitUnits) -> Result<Vec<UnitEvent>, DomainError> {
        self.ensure_registered()?;
        self.ensure_unit_id(cmd.unit_id)?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let held = self.reserved_for(cmd.order_id);
        if held == 0 {
            // Redelivered commit for an order already counted as sold.
            if self.committed_orders.contains(&cmd.order_id) {
                return Ok(vec![]);
            }
            return Err(DomainError::invariant(format!(
                "no reservation held for order {}",
                cmd.order_id
            )));
        }

        // Committing more than the order holds means a prior bug; never clamp.
        if cmd.quantity > held {
            return Err(DomainError::invariant(format!(
                "commit of {} exceeds {} held for order {}",
                cmd.quantity, held, cmd.order_id
            )));
        }

        Ok(vec![UnitEvent::UnitsCommitted(UnitsCommitted {
            unit_id: cmd.unit_id,
            order_id: cmd.order_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseUnits) -> Result<Vec<UnitEvent>, DomainError> {
        self.ensure_registered()?;
        self.ensure_unit_id(cmd.unit_id)?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let held = self.reserved_for(cmd.order_id);
        if held == 0 {
            // Sold capacity never goes back on sale through release.
            if self.committed_orders.contains(&cmd.order_id) {
                return Err(DomainError::invariant(format!(
                    "release after commit for order {}",
                    cmd.order_id
                )));
            }
            // Redelivered release with nothing left to return.
            return Ok(vec![]);
        }

        // Releasing more than the order holds means a prior bug; never clamp.
        if cmd.quantity > held {
            return Err(DomainError::invariant(format!(
                "release of {} exceeds {} held for order {}",
                cmd.quantity, held, cmd.order_id
            )));
        }

        Ok(vec![UnitEvent::UnitsReleased(UnitsReleased {
            unit_id: cmd.unit_id,
            order_id: cmd.order_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_price(&self, cmd: &ChangePrice) -> Result<Vec<UnitEvent>, DomainError> {
        self.ensure_registered()?;
        self.ensure_unit_id(cmd.unit_id)?;

        // Reserved orders keep their snapshot regardless; refusing here keeps
        // the advertised price honest for capacity already claimed.
        if self.reserved_quantity > 0 || self.sold_quantity > 0 {
            return Err(DomainError::state_conflict(
                "change price",
                "unit has reservations or sales",
            ));
        }

        Ok(vec![UnitEvent::PriceChanged(PriceChanged {
            unit_id: cmd.unit_id,
            price: cmd.price,
            occurred_at: cmd.occurred_at,
        })])
    }
}
