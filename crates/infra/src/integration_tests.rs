//! End-to-end flows over the in-memory store and bus.

use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use serde_json::Value as JsonValue;

use ticketforge_catalog::{
    CatalogStore, EventRecord, InMemoryCatalog, PricingMode, SelectionItem, TicketType,
    UnitDescriptor, UnitKind,
};
use ticketforge_core::{CatalogEventId, DomainError, OrderId, TicketTypeId, UnitId, UserId};
use ticketforge_events::{EventEnvelope, InMemoryEventBus};
use ticketforge_inventory::{RegisterUnit, SellableUnit, UnitCommand};
use ticketforge_orders::{BuyerContact, ConfirmPayment, Order, OrderCommand, OrderStatus};
use ticketforge_tickets::TicketStatus;

use crate::command_dispatcher::CommandDispatcher;
use crate::config::EngineConfig;
use crate::event_store::InMemoryEventStore;
use crate::external::{MockPaymentProcessor, TracingNotifier};
use crate::journal::{InMemoryPaymentJournal, PaymentJournal, ProcessedOutcome};
use crate::projections::Projections;
use crate::reaper;
use crate::services::{
    CheckoutRequest, CheckoutService, PaymentWebhookEvent, PaymentsService, ReconcileOutcome,
    ReconciliationService, ServiceError, TicketingService,
};
use crate::streams;
use crate::workers::ProjectionWorker;

type Store = Arc<InMemoryEventStore>;
type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Dispatcher = CommandDispatcher<Store, Bus>;

struct Engine {
    store: Store,
    bus: Bus,
    dispatcher: Arc<Dispatcher>,
    catalog: Arc<InMemoryCatalog>,
    projections: Arc<Projections>,
    journal: Arc<InMemoryPaymentJournal>,
    processor: Arc<MockPaymentProcessor>,
    checkout: CheckoutService<Store, Bus>,
    payments: PaymentsService<Store, Bus, Arc<MockPaymentProcessor>>,
    ticketing: Arc<TicketingService<Store, Bus>>,
    reconciliation: ReconciliationService<Store, Bus>,
    config: EngineConfig,
}

impl Engine {
    fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    fn with_config(config: EngineConfig) -> Self {
        ticketforge_observability::init();

        let store: Store = Arc::new(InMemoryEventStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let dispatcher = Arc::new(CommandDispatcher::new(Arc::clone(&store), Arc::clone(&bus)));
        let catalog = Arc::new(InMemoryCatalog::new());
        let projections = Arc::new(Projections::new(config.scan_secret.clone()));
        let journal = Arc::new(InMemoryPaymentJournal::new());
        let processor = Arc::new(MockPaymentProcessor::new());

        let checkout = CheckoutService::new(
            Arc::clone(&dispatcher),
            Arc::clone(&catalog) as Arc<dyn CatalogStore>,
            Arc::clone(&projections),
            config.clone(),
        );
        let payments = PaymentsService::new(
            Arc::clone(&dispatcher),
            Arc::clone(&processor),
            Arc::clone(&projections),
        );
        let ticketing = Arc::new(TicketingService::new(
            Arc::clone(&dispatcher),
            Arc::clone(&projections),
        ));
        let reconciliation = ReconciliationService::new(
            Arc::clone(&dispatcher),
            Arc::clone(&projections),
            Arc::clone(&journal) as Arc<dyn PaymentJournal>,
            Arc::clone(&ticketing),
            Arc::new(TracingNotifier),
        );

        Self {
            store,
            bus,
            dispatcher,
            catalog,
            projections,
            journal,
            processor,
            checkout,
            payments,
            ticketing,
            reconciliation,
            config,
        }
    }

    fn seed_event(&self, mode: PricingMode) -> (CatalogEventId, TicketTypeId) {
        let event_id = CatalogEventId::new();
        self.catalog.insert_event(EventRecord::new(
            event_id,
            "Lakeside Festival",
            mode,
            Utc::now() + Duration::days(30),
        ));
        let ticket_type = TicketType::new(TicketTypeId::new(), event_id, "Festival Pass");
        let ticket_type_id = ticket_type.id;
        self.catalog.insert_ticket_type(ticket_type);
        (event_id, ticket_type_id)
    }

    fn seed_unit(
        &self,
        ticket_type_id: TicketTypeId,
        kind: UnitKind,
        label: &str,
        price: u64,
        total: u32,
    ) -> UnitId {
        let unit_id = UnitId::new();
        self.catalog.insert_unit(UnitDescriptor {
            unit_id,
            ticket_type_id,
            kind,
            label: label.to_string(),
            price,
            is_active: true,
            sales_start: None,
            sales_end: None,
        });

        let cmd = UnitCommand::RegisterUnit(RegisterUnit {
            unit_id,
            ticket_type_id,
            kind,
            label: label.to_string(),
            price,
            total_quantity: total,
            occurred_at: Utc::now(),
        });
        let committed = self
            .dispatcher
            .dispatch(unit_id.into(), streams::SELLABLE_UNIT, &cmd, || {
                SellableUnit::empty(unit_id)
            })
            .unwrap();
        self.projections.apply_committed(&committed).unwrap();
        unit_id
    }

    fn place(
        &self,
        event_id: CatalogEventId,
        selection: Vec<SelectionItem>,
    ) -> Result<OrderId, ServiceError> {
        self.checkout.place_order(CheckoutRequest {
            event_id,
            buyer: buyer(),
            selection,
            discount: 0,
            currency: "USD".to_string(),
        })
    }

    fn place_one(
        &self,
        event_id: CatalogEventId,
        unit_id: UnitId,
        quantity: u32,
    ) -> Result<OrderId, ServiceError> {
        self.place(event_id, vec![SelectionItem { unit_id, quantity }])
    }

    /// Start the payment and deliver a success webhook for it.
    fn confirm(&self, order_id: OrderId, webhook_event_id: &str) -> String {
        let reference = self.payments.start_payment(order_id).unwrap().reference;
        let outcome = self
            .reconciliation
            .process(&success_webhook(webhook_event_id, &reference))
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied);
        reference
    }
}

fn buyer() -> BuyerContact {
    BuyerContact {
        email: "buyer@example.com".to_string(),
        name: "Alex Buyer".to_string(),
        phone: String::new(),
    }
}

fn webhook(event_id: &str, event_type: &str, reference: &str) -> PaymentWebhookEvent {
    PaymentWebhookEvent {
        event_id: event_id.to_string(),
        event_type: event_type.to_string(),
        payment_reference: reference.to_string(),
        order_id: None,
        refund_reference: None,
        occurred_at: Utc::now(),
    }
}

fn success_webhook(event_id: &str, reference: &str) -> PaymentWebhookEvent {
    webhook(event_id, "payment_intent.succeeded", reference)
}

#[test]
fn checkout_places_pending_order_with_fee_totals() {
    let engine = Engine::new();
    let (event_id, ticket_type_id) = engine.seed_event(PricingMode::Simple);
    let unit_id = engine.seed_unit(ticket_type_id, UnitKind::SimpleTicket, "", 10_000, 10);

    let order_id = engine.place_one(event_id, unit_id, 2).unwrap();

    let order = engine.projections.orders.get(order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.totals.subtotal, 20_000);
    assert_eq!(order.totals.service_fee, 1_000);
    assert_eq!(order.totals.total, 21_000);
    assert_eq!(order.expires_at, order.placed_at + Duration::minutes(15));
    assert_eq!(order.items[0].label, "Festival Pass");

    let unit = engine.projections.availability.get(unit_id).unwrap();
    assert_eq!(unit.reserved, 2);
    assert_eq!(unit.sold, 0);
    assert_eq!(unit.available(), 8);
}

#[test]
fn insufficient_inventory_reports_availability() {
    let engine = Engine::new();
    let (event_id, ticket_type_id) = engine.seed_event(PricingMode::Simple);
    let unit_id = engine.seed_unit(ticket_type_id, UnitKind::SimpleTicket, "", 10_000, 3);

    let err = engine.place_one(event_id, unit_id, 5).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Domain(DomainError::InsufficientInventory {
            available: 3,
            requested: 5
        })
    ));

    let unit = engine.projections.availability.get(unit_id).unwrap();
    assert_eq!(unit.reserved, 0);
    assert_eq!(unit.available(), 3);
}

#[test]
fn failed_multi_unit_checkout_rolls_back_reservations() {
    let engine = Engine::new();
    let (event_id, ticket_type_id) = engine.seed_event(PricingMode::Tiered);
    let vip = engine.seed_unit(ticket_type_id, UnitKind::Tier, "VIP", 15_000, 5);
    let general = engine.seed_unit(ticket_type_id, UnitKind::Tier, "General", 5_000, 1);

    let err = engine
        .place(
            event_id,
            vec![
                SelectionItem {
                    unit_id: vip,
                    quantity: 2,
                },
                SelectionItem {
                    unit_id: general,
                    quantity: 2,
                },
            ],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Domain(DomainError::InsufficientInventory {
            available: 1,
            requested: 2
        })
    ));

    // All-or-nothing: nothing stays reserved.
    assert_eq!(engine.projections.availability.get(vip).unwrap().reserved, 0);
    assert_eq!(
        engine.projections.availability.get(general).unwrap().reserved,
        0
    );
}

#[test]
fn concurrent_checkouts_never_oversell() {
    let engine = Engine::new();
    let (event_id, ticket_type_id) = engine.seed_event(PricingMode::Simple);
    let unit_id = engine.seed_unit(ticket_type_id, UnitKind::SimpleTicket, "", 10_000, 5);

    let results: Vec<Result<OrderId, ServiceError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    // Retry until inventory answers; exhausting the optimistic
                    // retry budget under contention is not an inventory verdict.
                    loop {
                        match engine.place_one(event_id, unit_id, 1) {
                            Err(ServiceError::Dispatch(err)) if err.is_concurrency() => continue,
                            other => break other,
                        }
                    }
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 5);
    for result in &results {
        if let Err(err) = result {
            assert!(matches!(
                err,
                ServiceError::Domain(DomainError::InsufficientInventory { .. })
            ));
        }
    }

    let unit = engine.projections.availability.get(unit_id).unwrap();
    assert_eq!(unit.reserved, 5);
    assert_eq!(unit.available(), 0);
}

#[test]
fn payment_success_confirms_order_and_issues_tickets() {
    let engine = Engine::new();
    let (event_id, ticket_type_id) = engine.seed_event(PricingMode::Simple);
    let unit_id = engine.seed_unit(ticket_type_id, UnitKind::SimpleTicket, "", 10_000, 10);

    let order_id = engine.place_one(event_id, unit_id, 3).unwrap();
    engine.confirm(order_id, "evt_1");

    let order = engine.projections.orders.get(order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert!(order.paid_at.is_some());

    let unit = engine.projections.availability.get(unit_id).unwrap();
    assert_eq!(unit.reserved, 0);
    assert_eq!(unit.sold, 3);

    // One ticket per admission, each carrying a derived scan token.
    let tickets = engine.projections.tickets.tickets_for_order(order_id);
    assert_eq!(tickets.len(), 3);
    for ticket in &tickets {
        assert_eq!(ticket.status, TicketStatus::Active);
        assert_eq!(ticket.price, 10_000);
        assert_eq!(ticket.scan_token.len(), 64);
        assert!(ticket.scan_token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    // The intent was opened for the grand total.
    let intents = engine.processor.intent_requests();
    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].amount, order.totals.total);
}

#[test]
fn reprocessing_the_same_webhook_event_is_a_noop() {
    let engine = Engine::new();
    let (event_id, ticket_type_id) = engine.seed_event(PricingMode::Simple);
    let unit_id = engine.seed_unit(ticket_type_id, UnitKind::SimpleTicket, "", 10_000, 10);

    let order_id = engine.place_one(event_id, unit_id, 2).unwrap();
    let reference = engine.confirm(order_id, "evt_1");

    let outcome = engine
        .reconciliation
        .process(&success_webhook("evt_1", &reference))
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Duplicate);

    assert_eq!(engine.projections.tickets.tickets_for_order(order_id).len(), 2);
    assert_eq!(engine.projections.availability.get(unit_id).unwrap().sold, 2);
}

#[test]
fn redelivered_success_finishes_commits_and_issuance_after_partial_apply() {
    let engine = Engine::new();
    let (event_id, ticket_type_id) = engine.seed_event(PricingMode::Simple);
    let unit_id = engine.seed_unit(ticket_type_id, UnitKind::SimpleTicket, "", 10_000, 10);

    let order_id = engine.place_one(event_id, unit_id, 2).unwrap();
    let reference = engine.payments.start_payment(order_id).unwrap().reference;

    // Confirm the order directly, as if the first delivery crashed right
    // after ConfirmPayment and before committing units or issuing tickets.
    let committed = engine
        .dispatcher
        .dispatch(
            order_id.into(),
            streams::ORDER,
            &OrderCommand::ConfirmPayment(ConfirmPayment {
                order_id,
                payment_reference: reference.clone(),
                occurred_at: Utc::now(),
            }),
            || Order::empty(order_id),
        )
        .unwrap();
    engine.projections.apply_committed(&committed).unwrap();

    let unit = engine.projections.availability.get(unit_id).unwrap();
    assert_eq!(unit.reserved, 2);
    assert_eq!(unit.sold, 0);

    // The redelivery lands on the Confirmed order and must settle the rest.
    let outcome = engine
        .reconciliation
        .process(&success_webhook("evt_retry", &reference))
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::AlreadyApplied);

    let unit = engine.projections.availability.get(unit_id).unwrap();
    assert_eq!(unit.reserved, 0);
    assert_eq!(unit.sold, 2);
    assert_eq!(engine.projections.tickets.tickets_for_order(order_id).len(), 2);

    // A further redelivery is a journal duplicate and changes nothing.
    let outcome = engine
        .reconciliation
        .process(&success_webhook("evt_retry", &reference))
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Duplicate);
    assert_eq!(engine.projections.availability.get(unit_id).unwrap().sold, 2);
}

#[test]
fn payment_failure_releases_the_reservation() {
    let engine = Engine::new();
    let (event_id, ticket_type_id) = engine.seed_event(PricingMode::Simple);
    let unit_id = engine.seed_unit(ticket_type_id, UnitKind::SimpleTicket, "", 10_000, 10);

    let order_id = engine.place_one(event_id, unit_id, 4).unwrap();
    let reference = engine.payments.start_payment(order_id).unwrap().reference;

    let outcome = engine
        .reconciliation
        .process(&webhook("evt_1", "payment_intent.payment_failed", &reference))
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let order = engine.projections.orders.get(order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Failed);

    let unit = engine.projections.availability.get(unit_id).unwrap();
    assert_eq!(unit.reserved, 0);
    assert_eq!(unit.available(), 10);
    assert!(engine.projections.tickets.tickets_for_order(order_id).is_empty());
}

#[test]
fn start_payment_is_idempotent_per_order() {
    let engine = Engine::new();
    let (event_id, ticket_type_id) = engine.seed_event(PricingMode::Simple);
    let unit_id = engine.seed_unit(ticket_type_id, UnitKind::SimpleTicket, "", 10_000, 10);
    let order_id = engine.place_one(event_id, unit_id, 1).unwrap();

    let first = engine.payments.start_payment(order_id).unwrap();
    let second = engine.payments.start_payment(order_id).unwrap();

    assert_eq!(first.reference, second.reference);
    assert!(second.client_secret.is_none());
    assert_eq!(engine.processor.intent_requests().len(), 1);
}

#[test]
fn late_success_after_expiry_is_journaled_as_anomaly() {
    let mut config = EngineConfig::default();
    config.reservation_ttl_minutes = 0;
    let engine = Engine::with_config(config);

    let (event_id, ticket_type_id) = engine.seed_event(PricingMode::Simple);
    let unit_id = engine.seed_unit(ticket_type_id, UnitKind::SimpleTicket, "", 10_000, 10);

    let order_id = engine.place_one(event_id, unit_id, 2).unwrap();
    let reference = engine.payments.start_payment(order_id).unwrap().reference;

    thread::sleep(StdDuration::from_millis(10));
    let expired = reaper::sweep(&engine.dispatcher, &engine.projections);
    assert_eq!(expired, 1);

    let order = engine.projections.orders.get(order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Expired);
    assert_eq!(engine.projections.availability.get(unit_id).unwrap().reserved, 0);

    // The processor's success arrives after the reaper won.
    let outcome = engine
        .reconciliation
        .process(&success_webhook("evt_late", &reference))
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Anomaly);

    // Order untouched, nothing sold, anomaly journaled for review.
    let order = engine.projections.orders.get(order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Expired);
    assert_eq!(engine.projections.availability.get(unit_id).unwrap().sold, 0);
    assert!(engine.projections.tickets.tickets_for_order(order_id).is_empty());

    let anomalies = engine.journal.anomalies().unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].event_id, "evt_late");
    assert_eq!(anomalies[0].outcome, ProcessedOutcome::Anomaly);
}

#[test]
fn second_scan_reports_first_use() {
    let engine = Engine::new();
    let (event_id, ticket_type_id) = engine.seed_event(PricingMode::Simple);
    let unit_id = engine.seed_unit(ticket_type_id, UnitKind::SimpleTicket, "", 10_000, 10);

    let order_id = engine.place_one(event_id, unit_id, 1).unwrap();
    engine.confirm(order_id, "evt_1");

    let token = engine.projections.tickets.tickets_for_order(order_id)[0]
        .scan_token
        .clone();
    let gate_staff = UserId::new();

    let scanned = engine.ticketing.verify(&token, gate_staff).unwrap();
    assert_eq!(scanned.status, TicketStatus::Used);
    assert_eq!(scanned.verified_by, Some(gate_staff));
    let first_used_at = scanned.used_at.unwrap();

    let err = engine.ticketing.verify(&token, UserId::new()).unwrap_err();
    match err {
        ServiceError::Domain(DomainError::AlreadyUsed { used_at }) => {
            assert_eq!(used_at, first_used_at);
        }
        other => panic!("expected AlreadyUsed, got {other:?}"),
    }
}

#[test]
fn unknown_token_is_not_found() {
    let engine = Engine::new();
    let err = engine
        .ticketing
        .verify("deadbeef".repeat(8).as_str(), UserId::new())
        .unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::NotFound)));
}

#[test]
fn refund_cancels_tickets_but_keeps_units_sold() {
    let engine = Engine::new();
    let (event_id, ticket_type_id) = engine.seed_event(PricingMode::Simple);
    let unit_id = engine.seed_unit(ticket_type_id, UnitKind::SimpleTicket, "", 10_000, 10);

    let order_id = engine.place_one(event_id, unit_id, 2).unwrap();
    let reference = engine.confirm(order_id, "evt_1");

    engine.payments.request_refund(order_id).unwrap();
    assert_eq!(engine.processor.refund_requests(), vec![reference.clone()]);

    let mut refunded = webhook("evt_2", "charge.refunded", &reference);
    refunded.refund_reference = Some("re_1".to_string());
    let outcome = engine.reconciliation.process(&refunded).unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let order = engine.projections.orders.get(order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Refunded);

    // Refunded inventory is not returned to sale.
    let unit = engine.projections.availability.get(unit_id).unwrap();
    assert_eq!(unit.sold, 2);
    assert_eq!(unit.available(), 8);

    for ticket in engine.projections.tickets.tickets_for_order(order_id) {
        assert_eq!(ticket.status, TicketStatus::Cancelled);
    }
}

#[test]
fn unrecognized_webhook_event_is_ignored() {
    let engine = Engine::new();
    let outcome = engine
        .reconciliation
        .process(&webhook("evt_1", "invoice.paid", "pi_1"))
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Ignored);

    // And journaled, so a redelivery is a duplicate.
    let outcome = engine
        .reconciliation
        .process(&webhook("evt_1", "invoice.paid", "pi_1"))
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Duplicate);
}

#[test]
fn day_tier_cell_sells_through_confirm_and_expiry() {
    let mut config = EngineConfig::default();
    config.reservation_ttl_minutes = 0;
    let engine = Engine::with_config(config);

    let (event_id, ticket_type_id) = engine.seed_event(PricingMode::TierAndDay);
    let cell = engine.seed_unit(ticket_type_id, UnitKind::DayTierCell, "Day 1 - VIP", 25_000, 2);

    let order_a = engine.place_one(event_id, cell, 1).unwrap();
    let order_b = engine.place_one(event_id, cell, 1).unwrap();

    // The cell is exhausted; a third buyer is turned away.
    let err = engine.place_one(event_id, cell, 1).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Domain(DomainError::InsufficientInventory {
            available: 0,
            requested: 1
        })
    ));

    // Order A pays before any sweep; expiry is reaper-only, so the elapsed
    // TTL alone does not block confirmation.
    engine.confirm(order_a, "evt_a");
    let unit = engine.projections.availability.get(cell).unwrap();
    assert_eq!(unit.sold, 1);
    assert_eq!(unit.reserved, 1);

    // Order B is swept and its reservation returns to the pool.
    thread::sleep(StdDuration::from_millis(10));
    reaper::sweep(&engine.dispatcher, &engine.projections);

    assert_eq!(
        engine.projections.orders.get(order_b).unwrap().status,
        OrderStatus::Expired
    );
    let unit = engine.projections.availability.get(cell).unwrap();
    assert_eq!(unit.sold, 1);
    assert_eq!(unit.reserved, 0);
    assert_eq!(unit.available(), 1);
    assert_eq!(
        engine.projections.orders.get(order_a).unwrap().status,
        OrderStatus::Confirmed
    );
}

#[test]
fn projection_worker_catches_up_from_the_bus() {
    let engine = Engine::new();
    let shadow = Arc::new(Projections::new(engine.config.scan_secret.clone()));
    let worker =
        ProjectionWorker::spawn("shadow-projections", &engine.bus, Arc::clone(&shadow)).unwrap();

    let (_, ticket_type_id) = engine.seed_event(PricingMode::Simple);
    let unit_id = engine.seed_unit(ticket_type_id, UnitKind::SimpleTicket, "", 10_000, 7);

    let mut caught_up = false;
    for _ in 0..100 {
        if shadow.availability.get(unit_id).is_some() {
            caught_up = true;
            break;
        }
        thread::sleep(StdDuration::from_millis(20));
    }
    worker.shutdown();

    assert!(caught_up, "worker never applied the published envelope");
    assert_eq!(shadow.availability.get(unit_id).unwrap().total, 7);
}

#[test]
fn projections_rebuild_from_the_event_store() {
    let engine = Engine::new();
    let (event_id, ticket_type_id) = engine.seed_event(PricingMode::Simple);
    let unit_id = engine.seed_unit(ticket_type_id, UnitKind::SimpleTicket, "", 10_000, 10);

    let order_id = engine.place_one(event_id, unit_id, 2).unwrap();
    engine.confirm(order_id, "evt_1");

    let rebuilt = Projections::new(engine.config.scan_secret.clone());
    rebuilt
        .rebuild_from_scratch(engine.store.all_events().unwrap())
        .unwrap();

    assert_eq!(
        rebuilt.orders.get(order_id),
        engine.projections.orders.get(order_id)
    );
    assert_eq!(
        rebuilt.availability.get(unit_id),
        engine.projections.availability.get(unit_id)
    );
    assert_eq!(
        rebuilt.tickets.tickets_for_order(order_id),
        engine.projections.tickets.tickets_for_order(order_id)
    );
}
