//! Inventory reservation ledger (event-sourced).
//!
//! This crate contains the counter rules for sellable units, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).
//! Atomicity of reserve/commit/release comes from optimistic appends at the
//! event store; the aggregate only decides.

pub mod unit;

pub use unit::{
    ChangePrice, CommitUnits, PriceChanged, RegisterUnit, ReleaseUnits, ReserveUnits,
    SellableUnit, UnitCommand, UnitEvent, UnitRegistered, UnitsCommitted, UnitsReleased,
    UnitsReserved,
};
