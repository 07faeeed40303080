use chrono::{DateTime, Utc};

/// A recorded fact.
///
/// Events never change once committed; schema evolution happens through
/// `version`, not through edits. `occurred_at` is business time (when the
/// reservation was made, when the gate scanned the ticket), not storage
/// time.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted name, e.g. `"orders.order.placed"`.
    fn event_type(&self) -> &'static str;

    fn version(&self) -> u32;

    fn occurred_at(&self) -> DateTime<Utc>;
}
