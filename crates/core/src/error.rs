//! Domain error model.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
///
/// `Invariant` is the one fatal variant: it means a counter or state machine
/// reached a configuration the domain forbids, and callers must surface it
/// rather than retry around it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, empty selection).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A pricing-variant selection does not match the event's pricing mode.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// Requested quantity falls outside the per-order bounds of a ticket type.
    #[error("quantity {requested} outside allowed range {min}..={max}")]
    OutOfBounds { requested: u32, min: u32, max: u32 },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// Not enough unreserved, unsold capacity on a sellable unit.
    #[error("insufficient inventory: {available} available, {requested} requested")]
    InsufficientInventory { available: u32, requested: u32 },

    /// An operation is not legal from the current lifecycle state.
    #[error("cannot {operation} while {state}")]
    StateConflict { operation: String, state: String },

    /// A ticket was already redeemed.
    #[error("ticket already used at {used_at}")]
    AlreadyUsed { used_at: DateTime<Utc> },

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A domain invariant was violated. Fatal; never clamped or retried.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_selection(msg: impl Into<String>) -> Self {
        Self::InvalidSelection(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn insufficient(available: u32, requested: u32) -> Self {
        Self::InsufficientInventory {
            available,
            requested,
        }
    }

    pub fn state_conflict(operation: impl Into<String>, state: impl Into<String>) -> Self {
        Self::StateConflict {
            operation: operation.into(),
            state: state.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// True for errors a dispatcher may retry after rehydrating.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
