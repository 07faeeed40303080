//! Entity contract: identity that survives state changes.

/// A thing with a stable identity.
///
/// Catalog records are entities: an event record keeps being the same
/// event when its title changes, a ticket type keeps being the same type
/// when its sales window moves.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
