//! Read-model storage primitives.

pub mod store;

pub use store::InMemoryReadModel;
