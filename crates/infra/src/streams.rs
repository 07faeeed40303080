//! Aggregate stream type names.
//!
//! One stream per aggregate instance, keyed by `(aggregate_type, aggregate_id)`.
//! The type name is persisted with every event and checked on append.

pub const ORDER: &str = "order";
pub const SELLABLE_UNIT: &str = "sellable_unit";
pub const TICKET: &str = "ticket";
