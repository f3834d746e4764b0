use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
    Mutex,
};

use log::*;
use shop_common::{CurrencyCode, MinorUnits};
use shop_engine::{
    db_types::{OrderStatusType, PaymentEventType, ProductId},
    events::{EventHandlers, EventHooks},
    order_objects::CheckoutRequest,
    payment_objects::WebhookPayload,
    CartApi,
    EngineConfig,
    OrderFlowApi,
    ReconciliationApi,
    StatusContext,
};

use crate::support::prepare_env::{prepare_test_env, random_db_path, seed_products, tear_down};

mod support;

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::Relaxed)
    }
}

#[tokio::test]
async fn hooks_fire_for_every_lifecycle_event() {
    let db = prepare_test_env(&random_db_path()).await;
    seed_products(&db).await;
    let created = HookCalled::default();
    let abandoned = HookCalled::default();
    let transitions = Arc::new(Mutex::new(Vec::new()));

    let mut hooks = EventHooks::default();
    let created_copy = created.clone();
    let abandoned_copy = abandoned.clone();
    let transitions_copy = transitions.clone();
    hooks
        .on_order_created(move |ev| {
            info!("🪝️ Order created: {}", ev.order.order_number);
            created_copy.called();
            Box::pin(async {})
        })
        .on_order_status_changed(move |ev| {
            let transitions = transitions_copy.clone();
            Box::pin(async move {
                let mut log = transitions.lock().unwrap();
                log.push((ev.old_status, ev.new_status()));
            })
        })
        .on_payment_event_abandoned(move |ev| {
            info!("🪝️ Payment event abandoned: {}", ev.event.external_id);
            abandoned_copy.called();
            Box::pin(async {})
        });
    let config = EngineConfig { event_buffer_size: 8, ..Default::default() };
    let handlers = EventHandlers::from_config(&config, hooks);
    let producers = handlers.producers();
    let tasks = handlers.start_handlers();

    let carts = CartApi::new(db.clone());
    let api = ReconciliationApi::new(db.clone(), producers.clone(), config);
    let flow = OrderFlowApi::new(db.clone(), producers);
    carts.add_item(&"alice".into(), &ProductId::from("tshirt"), 1).await.unwrap();
    let paid = api.checkout(CheckoutRequest::new("alice")).await.unwrap();
    carts.add_item(&"bob".into(), &ProductId::from("mug"), 1).await.unwrap();
    let short = api.checkout(CheckoutRequest::new("bob")).await.unwrap();

    let payload = WebhookPayload::new("stripe", "evt_1", PaymentEventType::IntentSucceeded, paid.order_id)
        .with_amount(paid.total_minor, CurrencyCode::default());
    api.ingest_webhook(payload).await.unwrap();
    flow.update_status(paid.order_id, OrderStatusType::Processing, &StatusContext::new(chrono::Utc::now()).as_admin())
        .await
        .unwrap();

    let underpaid = WebhookPayload::new("stripe", "evt_2", PaymentEventType::IntentSucceeded, short.order_id)
        .with_amount(MinorUnits::from(1), CurrencyCode::default());
    api.ingest_webhook(underpaid).await.unwrap();
    for _ in 0..5 {
        api.retry_failed_events().await.unwrap();
    }

    // Dropping the APIs drops the last producers, which lets the handlers finish.
    drop(api);
    drop(flow);
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(created.count(), 2);
    assert_eq!(abandoned.count(), 1);
    // Each event is handled on its own task, so arrival order is not guaranteed
    let transitions = transitions.lock().unwrap().clone();
    assert_eq!(transitions.len(), 2);
    assert!(transitions.contains(&(OrderStatusType::Pending, OrderStatusType::Paid)));
    assert!(transitions.contains(&(OrderStatusType::Paid, OrderStatusType::Processing)));
    tear_down(db).await;
    info!("🪝️ test complete");
}
