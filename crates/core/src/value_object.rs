//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values; two
/// with the same values are the same value. Monetary totals and buyer
/// contact details are value objects, an order is an entity.
///
/// To "modify" a value object, build a new one. Immutability keeps them
/// safe to share across threads and gives them primitive-like semantics.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
