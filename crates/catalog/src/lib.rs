//! Catalog domain: events, ticket types, sellable-unit descriptors, and the
//! pricing variant resolver.
//!
//! Everything here is deterministic domain logic (no IO, no storage). The
//! resolver validates a buyer's selection against an event's pricing mode
//! and resolves advisory prices; the authoritative price snapshot is taken
//! by the inventory ledger at reservation time.

pub mod record;
pub mod resolver;
pub mod store;
pub mod ticket_type;
pub mod unit;

pub use record::EventRecord;
pub use resolver::{ResolvedItem, SelectionItem, resolve_selection};
pub use store::{CatalogStore, InMemoryCatalog};
pub use ticket_type::TicketType;
pub use unit::{PricingMode, UnitDescriptor, UnitKind};
