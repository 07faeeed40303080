//! Event-sourced aggregate contract.
//!
//! An order, a sellable unit, and a ticket are each one stream of events;
//! the aggregate is the fold of that stream plus the rules for extending
//! it. Deciding (`handle`) and evolving (`apply`) are split so that
//! rehydration replays history without re-running any rules.

use crate::error::{DomainError, DomainResult};

/// Identity and revision of an event-sourced root.
pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Number of events applied so far. A freshly constructed, empty
    /// aggregate is at version 0; the first committed event brings it to 1.
    fn version(&self) -> u64;
}

/// Version precondition for an append.
///
/// `Exact` carries the version the caller rehydrated at; the store rejects
/// the append when someone else committed in between, which is what makes
/// reserve/verify races safe to retry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// No precondition.
    Any,
    /// The stream must still be at this version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(expected) => expected == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "version precondition failed (expected {self:?}, stream at {actual})"
            )))
        }
    }
}

/// Pure decide/evolve pair.
///
/// `handle` inspects current state and either emits the events a command
/// produces or rejects it with a domain error; it never mutates. `apply`
/// folds one event into state and bumps the version by one; it never
/// fails, because committed history is beyond argument. Neither side does
/// IO.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
