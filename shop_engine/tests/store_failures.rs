use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::{DateTime, Duration, Utc};
use shop_common::{CurrencyCode, MinorUnits, Quantity};
use shop_engine::{
    db_types::{
        Cart,
        NewOrder,
        NewPaymentEvent,
        NewProduct,
        Order,
        OrderId,
        OrderNumber,
        OrderStatusType,
        OwnerId,
        PaymentEvent,
        PaymentEventType,
        Product,
        ProductId,
    },
    events::EventProducers,
    order_objects::CheckoutRequest,
    payment_objects::{DispatchOutcome, IngestOutcome, WebhookPayload},
    traits::{OrderQueryFilter, OrderStatistics, Page},
    CartApi,
    CartManagement,
    EngineConfig,
    OrderManagement,
    PaymentEventManagement,
    ProductCatalog,
    ReconciliationApi,
    ShopDatabase,
    SqliteDatabase,
    StoreError,
};

use crate::support::prepare_env::{prepare_test_env, random_db_path, seed_products, tear_down};

mod support;

/// A backend whose payment-outcome writes can be made to fail on demand.
#[derive(Clone)]
struct FlakyDatabase {
    inner: SqliteDatabase,
    failing_commits: Arc<AtomicBool>,
    failing_updates: Arc<AtomicBool>,
}

impl FlakyDatabase {
    fn new(inner: SqliteDatabase) -> Self {
        Self { inner, failing_commits: Arc::default(), failing_updates: Arc::default() }
    }

    fn fail_commits(&self, failing: bool) {
        self.failing_commits.store(failing, Ordering::SeqCst);
    }

    fn fail_updates(&self, failing: bool) {
        self.failing_updates.store(failing, Ordering::SeqCst);
    }

    fn outage(&self, flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::DatabaseError("disk I/O error".into()));
        }
        Ok(())
    }
}

impl ProductCatalog for FlakyDatabase {
    async fn upsert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        self.inner.upsert_product(product).await
    }

    async fn fetch_product(&self, product_id: &ProductId) -> Result<Option<Product>, StoreError> {
        self.inner.fetch_product(product_id).await
    }

    async fn fetch_products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        self.inner.fetch_products(product_ids).await
    }

    async fn get_stock(&self, product_id: &ProductId) -> Result<i64, StoreError> {
        self.inner.get_stock(product_id).await
    }

    async fn decrement_stock(&self, product_id: &ProductId, quantity: Quantity) -> Result<bool, StoreError> {
        self.inner.decrement_stock(product_id, quantity).await
    }

    async fn restock(&self, product_id: &ProductId, quantity: Quantity) -> Result<Product, StoreError> {
        self.inner.restock(product_id, quantity).await
    }
}

impl CartManagement for FlakyDatabase {
    async fn fetch_cart(&self, owner_id: &OwnerId) -> Result<Option<Cart>, StoreError> {
        self.inner.fetch_cart(owner_id).await
    }

    async fn save_cart(&self, cart: &Cart) -> Result<Cart, StoreError> {
        self.inner.save_cart(cart).await
    }

    async fn sweep_empty_carts(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        self.inner.sweep_empty_carts(older_than).await
    }
}

impl OrderManagement for FlakyDatabase {
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.inner.fetch_order(id).await
    }

    async fn fetch_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        self.inner.fetch_order_by_number(order_number).await
    }

    async fn fetch_order_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Order>, StoreError> {
        self.inner.fetch_order_by_payment_ref(payment_ref).await
    }

    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Page<Order>, StoreError> {
        self.inner.search_orders(filter).await
    }

    async fn update_order(&self, order: &Order) -> Result<Order, StoreError> {
        self.inner.update_order(order).await
    }

    async fn order_statistics(&self, owner_id: Option<&OwnerId>) -> Result<OrderStatistics, StoreError> {
        self.inner.order_statistics(owner_id).await
    }
}

impl PaymentEventManagement for FlakyDatabase {
    async fn insert_payment_event(&self, event: NewPaymentEvent) -> Result<PaymentEvent, StoreError> {
        self.inner.insert_payment_event(event).await
    }

    async fn fetch_payment_event(&self, id: i64) -> Result<Option<PaymentEvent>, StoreError> {
        self.inner.fetch_payment_event(id).await
    }

    async fn update_payment_event(&self, event: &PaymentEvent) -> Result<PaymentEvent, StoreError> {
        self.outage(&self.failing_updates)?;
        self.inner.update_payment_event(event).await
    }

    async fn fetch_unprocessed_events(&self, retry_limit: i64) -> Result<Vec<PaymentEvent>, StoreError> {
        self.inner.fetch_unprocessed_events(retry_limit).await
    }

    async fn fetch_abandoned_events(&self, retry_limit: i64) -> Result<Vec<PaymentEvent>, StoreError> {
        self.inner.fetch_abandoned_events(retry_limit).await
    }

    async fn fetch_events_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentEvent>, StoreError> {
        self.inner.fetch_events_for_order(order_id).await
    }
}

impl ShopDatabase for FlakyDatabase {
    fn url(&self) -> &str {
        self.inner.url()
    }

    async fn checkout(&self, order: NewOrder, cart: &Cart) -> Result<Order, StoreError> {
        self.inner.checkout(order, cart).await
    }

    async fn cancel_order(&self, order: &Order) -> Result<Order, StoreError> {
        self.inner.cancel_order(order).await
    }

    async fn commit_reconciliation(
        &self,
        order: Option<&Order>,
        event: &PaymentEvent,
    ) -> Result<(Option<Order>, PaymentEvent), StoreError> {
        self.outage(&self.failing_commits)?;
        self.inner.commit_reconciliation(order, event).await
    }
}

fn succeeded(external_id: &str, order_id: OrderId, amount: MinorUnits) -> WebhookPayload {
    WebhookPayload::new("stripe", external_id, PaymentEventType::IntentSucceeded, order_id)
        .with_amount(amount, CurrencyCode::default())
}

#[tokio::test]
async fn a_notification_survives_a_store_outage() {
    let db = prepare_test_env(&random_db_path()).await;
    seed_products(&db).await;
    let flaky = FlakyDatabase::new(db.clone());
    CartApi::new(db.clone()).add_item(&"alice".into(), &ProductId::from("tshirt"), 1).await.unwrap();
    let config = EngineConfig { stranded_event_grace: Duration::zero(), ..Default::default() };
    let api = ReconciliationApi::new(flaky.clone(), EventProducers::default(), config);
    let receipt = api.checkout(CheckoutRequest::new("alice")).await.unwrap();

    flaky.fail_commits(true);
    flaky.fail_updates(true);
    let outcome = api.ingest_webhook(succeeded("evt_1", receipt.order_id, receipt.total_minor)).await.unwrap();
    match outcome {
        IngestOutcome::Dispatched(DispatchOutcome::Failed { reason, .. }) => {
            assert!(reason.contains("disk I/O error"), "{reason}");
        },
        other => panic!("Expected the dispatch to fail, got {other:?}"),
    }
    // Neither the order change nor the failure could be written
    let events = db.fetch_events_for_order(receipt.order_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(!events[0].processed);
    assert!(events[0].error_message.is_none());
    // A retry sweep during the outage fails per event and carries on
    let report = api.retry_failed_events().await.unwrap();
    assert_eq!((report.retried, report.failed), (1, 1));

    flaky.fail_commits(false);
    flaky.fail_updates(false);
    let redelivered = api.ingest_webhook(succeeded("evt_1", receipt.order_id, receipt.total_minor)).await.unwrap();
    assert!(redelivered.is_duplicate());
    let report = api.retry_failed_events().await.unwrap();
    assert_eq!((report.retried, report.succeeded), (1, 1));
    let order = db.fetch_order(receipt.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    let event = db.fetch_events_for_order(receipt.order_id).await.unwrap().remove(0);
    assert!(event.processed);
    // The attempt made during the outage was never saved
    assert_eq!(event.retry_count, 1);
    tear_down(db).await;
}

#[tokio::test]
async fn failed_outcomes_are_recorded_when_the_commit_fails() {
    let db = prepare_test_env(&random_db_path()).await;
    seed_products(&db).await;
    let flaky = FlakyDatabase::new(db.clone());
    CartApi::new(db.clone()).add_item(&"bob".into(), &ProductId::from("mug"), 1).await.unwrap();
    let api = ReconciliationApi::new(flaky.clone(), EventProducers::default(), EngineConfig::default());
    let receipt = api.checkout(CheckoutRequest::new("bob")).await.unwrap();

    // Only the combined order and event write is down
    flaky.fail_commits(true);
    let outcome = api.ingest_webhook(succeeded("evt_2", receipt.order_id, receipt.total_minor)).await.unwrap();
    flaky.fail_commits(false);
    assert!(matches!(outcome, IngestOutcome::Dispatched(DispatchOutcome::Failed { .. })));
    let event = db.fetch_events_for_order(receipt.order_id).await.unwrap().remove(0);
    assert!(!event.processed);
    assert!(event.can_retry());
    let report = api.retry_failed_events().await.unwrap();
    assert_eq!(report.succeeded, 1);
    tear_down(db).await;
}

#[tokio::test]
async fn events_left_without_an_outcome_are_retried() {
    let db = prepare_test_env(&random_db_path()).await;
    seed_products(&db).await;
    CartApi::new(db.clone()).add_item(&"carol".into(), &ProductId::from("mug"), 2).await.unwrap();
    let api = ReconciliationApi::new(db.clone(), EventProducers::default(), EngineConfig::default());
    let receipt = api.checkout(CheckoutRequest::new("carol")).await.unwrap();
    let two_minutes_ago = Utc::now() - Duration::minutes(2);
    let interrupted =
        NewPaymentEvent::new(receipt.order_id, "stripe", PaymentEventType::IntentSucceeded, "evt_3", two_minutes_ago)
            .with_amount(receipt.total_minor, CurrencyCode::default());
    db.insert_payment_event(interrupted).await.unwrap();
    let just_now = NewPaymentEvent::new(receipt.order_id, "stripe", PaymentEventType::IntentCreated, "evt_4", Utc::now());
    db.insert_payment_event(just_now).await.unwrap();

    let redelivered = api.ingest_webhook(succeeded("evt_3", receipt.order_id, receipt.total_minor)).await.unwrap();
    assert!(redelivered.is_duplicate());
    let report = api.retry_failed_events().await.unwrap();
    assert_eq!((report.retried, report.succeeded), (1, 1));
    let order = db.fetch_order(receipt.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    let events = db.fetch_events_for_order(receipt.order_id).await.unwrap();
    let fresh = events.iter().find(|e| e.external_id == "evt_4").unwrap();
    assert!(!fresh.processed);
    assert_eq!(fresh.retry_count, 0);
    tear_down(db).await;
}
