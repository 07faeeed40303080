//! `ticketforge-infra`: storage, dispatch, projections, and application services.
//!
//! Everything with a side effect lives here: the append-only event store,
//! the command dispatcher with optimistic concurrency, the read-model
//! projections, the payment reconciliation journal, the expiry reaper, and
//! the services that compose domain aggregates into reservation, payment,
//! and ticketing flows.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod external;
pub mod journal;
pub mod projections;
pub mod read_model;
pub mod reaper;
pub mod services;
pub mod streams;
pub mod workers;

#[cfg(test)]
mod integration_tests;
