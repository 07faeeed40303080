//! Processed-payment-event journal.
//!
//! Append-only record of every payment processor event the reconciler has
//! seen, keyed by the processor's event id. The journal is the idempotency
//! barrier for webhook delivery: an event id that is already journaled is
//! never applied again. Anomalous events (e.g. a success arriving after the
//! order expired) are journaled with an `Anomaly` outcome and never mutate
//! order state.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use thiserror::Error;

use ticketforge_core::OrderId;

/// Payment processor event kinds the reconciler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    PaymentSucceeded,
    PaymentFailed,
    PaymentCanceled,
    ChargeRefunded,
}

impl PaymentEventKind {
    /// Parse the processor's wire-format event type.
    pub fn from_wire(event_type: &str) -> Option<Self> {
        match event_type {
            "payment_intent.succeeded" => Some(Self::PaymentSucceeded),
            "payment_intent.payment_failed" => Some(Self::PaymentFailed),
            "payment_intent.canceled" => Some(Self::PaymentCanceled),
            "charge.refunded" => Some(Self::ChargeRefunded),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PaymentSucceeded => "payment_succeeded",
            Self::PaymentFailed => "payment_failed",
            Self::PaymentCanceled => "payment_canceled",
            Self::ChargeRefunded => "charge_refunded",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "payment_succeeded" => Some(Self::PaymentSucceeded),
            "payment_failed" => Some(Self::PaymentFailed),
            "payment_canceled" => Some(Self::PaymentCanceled),
            "charge_refunded" => Some(Self::ChargeRefunded),
            _ => None,
        }
    }
}

/// How the reconciler disposed of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessedOutcome {
    /// State transitions were applied.
    Applied,
    /// The order was already in the target terminal state.
    AlreadyApplied,
    /// The event did not match the order's state; journaled, not applied.
    Anomaly,
    /// Unrecognized event type; recorded and skipped.
    Ignored,
}

/// One journal row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedPaymentEvent {
    /// Processor-assigned event id (e.g. `evt_...`). Unique per delivery.
    pub event_id: String,
    pub kind: Option<PaymentEventKind>,
    pub order_id: Option<OrderId>,
    pub outcome: ProcessedOutcome,
    pub detail: Option<String>,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    #[error("journal storage error: {0}")]
    Storage(String),
}

/// Append-only journal keyed by processor event id.
///
/// `record` keeps the first entry for an event id; recording the same id
/// again is a no-op, never an overwrite.
pub trait PaymentJournal: Send + Sync {
    fn find(&self, event_id: &str) -> Result<Option<ProcessedPaymentEvent>, JournalError>;
    fn record(&self, entry: ProcessedPaymentEvent) -> Result<(), JournalError>;
    fn anomalies(&self) -> Result<Vec<ProcessedPaymentEvent>, JournalError>;
}

impl<J> PaymentJournal for Arc<J>
where
    J: PaymentJournal + ?Sized,
{
    fn find(&self, event_id: &str) -> Result<Option<ProcessedPaymentEvent>, JournalError> {
        (**self).find(event_id)
    }

    fn record(&self, entry: ProcessedPaymentEvent) -> Result<(), JournalError> {
        (**self).record(entry)
    }

    fn anomalies(&self) -> Result<Vec<ProcessedPaymentEvent>, JournalError> {
        (**self).anomalies()
    }
}

/// In-memory journal for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryPaymentJournal {
    entries: RwLock<HashMap<String, ProcessedPaymentEvent>>,
}

impl InMemoryPaymentJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PaymentJournal for InMemoryPaymentJournal {
    fn find(&self, event_id: &str) -> Result<Option<ProcessedPaymentEvent>, JournalError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_id)
            .cloned())
    }

    fn record(&self, entry: ProcessedPaymentEvent) -> Result<(), JournalError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(entry.event_id.clone())
            .or_insert(entry);
        Ok(())
    }

    fn anomalies(&self) -> Result<Vec<ProcessedPaymentEvent>, JournalError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|e| e.outcome == ProcessedOutcome::Anomaly)
            .cloned()
            .collect())
    }
}

/// Postgres-backed journal.
///
/// Expected schema:
///
/// ```sql
/// CREATE TABLE processed_payment_events (
///     event_id     TEXT PRIMARY KEY,
///     kind         TEXT,
///     order_id     UUID,
///     outcome      TEXT NOT NULL,
///     detail       TEXT,
///     processed_at TIMESTAMPTZ NOT NULL
/// );
/// ```
#[derive(Debug, Clone)]
pub struct PostgresPaymentJournal {
    pool: Arc<PgPool>,
}

impl PostgresPaymentJournal {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn find_async(
        &self,
        event_id: &str,
    ) -> Result<Option<ProcessedPaymentEvent>, JournalError> {
        let row = sqlx::query(
            r#"
            SELECT event_id, kind, order_id, outcome, detail, processed_at
            FROM processed_payment_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(storage)?;

        row.map(row_to_entry).transpose()
    }

    async fn record_async(&self, entry: &ProcessedPaymentEvent) -> Result<(), JournalError> {
        sqlx::query(
            r#"
            INSERT INTO processed_payment_events (
                event_id, kind, order_id, outcome, detail, processed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&entry.event_id)
        .bind(entry.kind.map(PaymentEventKind::as_str))
        .bind(entry.order_id.map(uuid::Uuid::from))
        .bind(outcome_str(entry.outcome))
        .bind(&entry.detail)
        .bind(entry.processed_at)
        .execute(&*self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn anomalies_async(&self) -> Result<Vec<ProcessedPaymentEvent>, JournalError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, kind, order_id, outcome, detail, processed_at
            FROM processed_payment_events
            WHERE outcome = 'anomaly'
            ORDER BY processed_at ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(row_to_entry).collect()
    }
}

fn storage(err: sqlx::Error) -> JournalError {
    JournalError::Storage(err.to_string())
}

fn outcome_str(outcome: ProcessedOutcome) -> &'static str {
    match outcome {
        ProcessedOutcome::Applied => "applied",
        ProcessedOutcome::AlreadyApplied => "already_applied",
        ProcessedOutcome::Anomaly => "anomaly",
        ProcessedOutcome::Ignored => "ignored",
    }
}

fn parse_outcome(s: &str) -> Result<ProcessedOutcome, JournalError> {
    match s {
        "applied" => Ok(ProcessedOutcome::Applied),
        "already_applied" => Ok(ProcessedOutcome::AlreadyApplied),
        "anomaly" => Ok(ProcessedOutcome::Anomaly),
        "ignored" => Ok(ProcessedOutcome::Ignored),
        other => Err(JournalError::Storage(format!("unknown outcome '{other}'"))),
    }
}

fn row_to_entry(row: sqlx::postgres::PgRow) -> Result<ProcessedPaymentEvent, JournalError> {
    let kind: Option<String> = row.try_get("kind").map_err(storage)?;
    let order_id: Option<uuid::Uuid> = row.try_get("order_id").map_err(storage)?;
    let outcome: String = row.try_get("outcome").map_err(storage)?;
    Ok(ProcessedPaymentEvent {
        event_id: row.try_get("event_id").map_err(storage)?,
        kind: kind.as_deref().and_then(PaymentEventKind::parse),
        order_id: order_id.map(OrderId::from_uuid),
        outcome: parse_outcome(&outcome)?,
        detail: row.try_get("detail").map_err(storage)?,
        processed_at: row.try_get("processed_at").map_err(storage)?,
    })
}

fn runtime_handle() -> Result<tokio::runtime::Handle, JournalError> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        JournalError::Storage("PostgresPaymentJournal requires an ambient tokio runtime".to_string())
    })
}

impl PaymentJournal for PostgresPaymentJournal {
    fn find(&self, event_id: &str) -> Result<Option<ProcessedPaymentEvent>, JournalError> {
        runtime_handle()?.block_on(self.find_async(event_id))
    }

    fn record(&self, entry: ProcessedPaymentEvent) -> Result<(), JournalError> {
        runtime_handle()?.block_on(self.record_async(&entry))
    }

    fn anomalies(&self) -> Result<Vec<ProcessedPaymentEvent>, JournalError> {
        runtime_handle()?.block_on(self.anomalies_async())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(event_id: &str, outcome: ProcessedOutcome) -> ProcessedPaymentEvent {
        ProcessedPaymentEvent {
            event_id: event_id.to_string(),
            kind: Some(PaymentEventKind::PaymentSucceeded),
            order_id: Some(OrderId::new()),
            outcome,
            detail: None,
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn journal_keeps_first_entry_per_event_id() {
        let journal = InMemoryPaymentJournal::new();
        let first = entry("evt_1", ProcessedOutcome::Applied);
        journal.record(first.clone()).unwrap();
        journal
            .record(entry("evt_1", ProcessedOutcome::Anomaly))
            .unwrap();

        assert_eq!(journal.find("evt_1").unwrap(), Some(first));
        assert!(journal.anomalies().unwrap().is_empty());
    }

    #[test]
    fn anomalies_are_listed() {
        let journal = InMemoryPaymentJournal::new();
        journal.record(entry("evt_1", ProcessedOutcome::Applied)).unwrap();
        journal.record(entry("evt_2", ProcessedOutcome::Anomaly)).unwrap();

        let anomalies = journal.anomalies().unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].event_id, "evt_2");
    }

    #[test]
    fn wire_event_types_map_to_kinds() {
        assert_eq!(
            PaymentEventKind::from_wire("payment_intent.succeeded"),
            Some(PaymentEventKind::PaymentSucceeded)
        );
        assert_eq!(
            PaymentEventKind::from_wire("charge.refunded"),
            Some(PaymentEventKind::ChargeRefunded)
        );
        assert_eq!(PaymentEventKind::from_wire("invoice.paid"), None);
    }
}
