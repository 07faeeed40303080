//! Sellable-unit descriptors and pricing modes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ticketforge_core::{Entity, TicketTypeId, UnitId, ValueObject};

/// Pricing model of an event, fixed at creation.
///
/// Determines which [`UnitKind`] its ticket types may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    /// One price per ticket type.
    Simple,
    /// Multiple tiers (VIP, General, ...).
    Tiered,
    /// Multiple days (Day 1, Day 2, All Days).
    DayBased,
    /// Matrix: each day has multiple tiers.
    TierAndDay,
}

impl PricingMode {
    /// Unit kind this mode sells.
    pub fn unit_kind(self) -> UnitKind {
        match self {
            PricingMode::Simple => UnitKind::SimpleTicket,
            PricingMode::Tiered => UnitKind::Tier,
            PricingMode::DayBased => UnitKind::DayPass,
            PricingMode::TierAndDay => UnitKind::DayTierCell,
        }
    }

    pub fn allows(self, kind: UnitKind) -> bool {
        self.unit_kind() == kind
    }
}

/// Discriminant of a sellable unit.
///
/// Tier/DayPass/DayTierCell are a closed set of cases over one inventory
/// shape, not a hierarchy; the resolver and ledger match on the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    SimpleTicket,
    Tier,
    DayPass,
    DayTierCell,
}

impl core::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            UnitKind::SimpleTicket => "simple_ticket",
            UnitKind::Tier => "tier",
            UnitKind::DayPass => "day_pass",
            UnitKind::DayTierCell => "day_tier_cell",
        };
        f.write_str(s)
    }
}

impl ValueObject for UnitKind {}

/// Catalog-side view of one sellable unit.
///
/// `price` here is advisory (display, total estimates); the binding price
/// snapshot is the one the inventory aggregate emits when it reserves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    pub unit_id: UnitId,
    pub ticket_type_id: TicketTypeId,
    pub kind: UnitKind,
    /// Variant label, e.g. "VIP", "Day 1", "Day 1 - VIP". Empty for simple.
    pub label: String,
    /// Price in smallest currency unit (e.g., cents).
    pub price: u64,
    pub is_active: bool,
    /// Variant-level sales window, overrides the ticket type's when set.
    pub sales_start: Option<DateTime<Utc>>,
    pub sales_end: Option<DateTime<Utc>>,
}

impl UnitDescriptor {
    pub fn within_sales_window(&self, now: DateTime<Utc>) -> bool {
        if self.sales_start.is_some_and(|start| now < start) {
            return false;
        }
        if self.sales_end.is_some_and(|end| now > end) {
            return false;
        }
        true
    }
}

impl Entity for UnitDescriptor {
    type Id = UnitId;

    fn id(&self) -> &UnitId {
        &self.unit_id
    }
}
