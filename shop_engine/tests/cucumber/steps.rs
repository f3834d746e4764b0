use std::str::FromStr;

use chrono::{Duration, Utc};
use cucumber::{then, when};
use shop_common::{CurrencyCode, MinorUnits};
use shop_engine::{
    db_types::{OrderStatusType, PaymentEventType, ProductId},
    order_objects::CheckoutRequest,
    payment_objects::{IngestOutcome, WebhookPayload},
    PaymentEventManagement,
    ProductCatalog,
    StatusContext,
};

use crate::cucumber::ShopWorld;

fn status(s: &str) -> OrderStatusType {
    OrderStatusType::from_str(s).expect("Not a valid order status")
}

#[when(expr = "'{word}' adds {int} of '{word}' to their cart")]
async fn add_to_cart(world: &mut ShopWorld, customer: String, quantity: u32, product: String) {
    let result = world.system().carts.add_item(&customer.into(), &ProductId::from(product), quantity).await;
    world.record(result);
}

#[when(expr = "'{word}' checks out")]
async fn checkout(world: &mut ShopWorld, customer: String) {
    let result = world.system().reconciliation.checkout(CheckoutRequest::new(customer.as_str())).await;
    if let Some(receipt) = world.record(result) {
        world.orders.insert(customer, receipt.order_id);
    }
}

#[when(expr = "the provider reports a payment of {int} for the order of '{word}' with event id '{word}'")]
async fn payment_succeeded(world: &mut ShopWorld, amount: i64, customer: String, external_id: String) {
    let order_id = world.order_id(&customer);
    let payload = WebhookPayload::new("stripe", external_id, PaymentEventType::IntentSucceeded, order_id)
        .with_amount(MinorUnits::from(amount), CurrencyCode::default());
    let result = world.system().reconciliation.ingest_webhook(payload).await;
    world.record(result);
}

#[when(expr = "the provider reports a failed payment for the order of '{word}' with event id '{word}'")]
async fn payment_failed(world: &mut ShopWorld, customer: String, external_id: String) {
    let order_id = world.order_id(&customer);
    let payload = WebhookPayload::new("stripe", external_id, PaymentEventType::IntentFailed, order_id);
    let result = world.system().reconciliation.ingest_webhook(payload).await;
    world.record(result);
}

#[when("the failed payment events are retried")]
async fn retry_events(world: &mut ShopWorld) {
    let result = world.system().reconciliation.retry_failed_events().await;
    world.record(result);
}

#[when(expr = "'{word}' cancels their order {int} minutes after paying")]
async fn customer_cancels(world: &mut ShopWorld, customer: String, minutes: i64) {
    let order = world.order(&customer).await;
    let paid_at = order.paid_at.unwrap_or_else(Utc::now);
    let ctx = StatusContext::new(paid_at + Duration::minutes(minutes)).with_actor(customer.as_str());
    let result = world.system().flow.cancel(order.id, "Customer request", &ctx).await;
    world.record(result);
}

#[when(expr = "an admin cancels the order of '{word}' {int} minutes after payment")]
async fn admin_cancels(world: &mut ShopWorld, customer: String, minutes: i64) {
    let order = world.order(&customer).await;
    let paid_at = order.paid_at.unwrap_or_else(Utc::now);
    let ctx = StatusContext::new(paid_at + Duration::minutes(minutes)).with_actor("admin").as_admin();
    let result = world.system().flow.cancel(order.id, "Admin override", &ctx).await;
    world.record(result);
}

#[when(expr = "an admin moves the order of '{word}' to {word}")]
async fn admin_moves(world: &mut ShopWorld, customer: String, new_status: String) {
    let order_id = world.order_id(&customer);
    let ctx = StatusContext::new(Utc::now()).with_actor("admin").as_admin();
    let result = world.system().flow.update_status(order_id, status(&new_status), &ctx).await;
    world.record(result);
}

#[when(expr = "an admin ships the order of '{word}' with tracking number '{word}'")]
async fn admin_ships(world: &mut ShopWorld, customer: String, tracking: String) {
    let order_id = world.order_id(&customer);
    let ctx = StatusContext::new(Utc::now()).with_actor("admin").as_admin();
    let result = world.system().flow.ship(order_id, &tracking, None, &ctx).await;
    world.record(result);
}

#[then(expr = "the cart of '{word}' holds {int} of '{word}' with a subtotal of {int}")]
async fn cart_contents(world: &mut ShopWorld, customer: String, quantity: u32, product: String, subtotal: i64) {
    let cart = world.system().carts.cart(&customer.into()).await.expect("Error fetching cart");
    let line = cart.lines().iter().find(|l| l.product_id().as_str() == product).expect("Product is not in the cart");
    assert_eq!(line.quantity(), quantity, "Quantity is incorrect");
    assert_eq!(cart.subtotal_minor().expect("Invalid subtotal"), MinorUnits::from(subtotal), "Subtotal is incorrect");
}

#[then(expr = "the cart of '{word}' is empty")]
async fn cart_is_empty(world: &mut ShopWorld, customer: String) {
    let cart = world.system().carts.cart(&customer.into()).await.expect("Error fetching cart");
    assert!(cart.is_empty(), "Cart is not empty");
}

#[then(expr = "the order of '{word}' has status {word}")]
async fn order_status(world: &mut ShopWorld, customer: String, expected: String) {
    let order = world.order(&customer).await;
    assert_eq!(order.status, status(&expected), "Status is incorrect");
}

#[then(expr = "the order of '{word}' has a total of {int}")]
async fn order_total(world: &mut ShopWorld, customer: String, total: i64) {
    let order = world.order(&customer).await;
    assert_eq!(order.total_minor, MinorUnits::from(total), "Total is incorrect");
}

#[then(expr = "the order of '{word}' has {int} history entries")]
async fn order_history(world: &mut ShopWorld, customer: String, entries: usize) {
    let order = world.order(&customer).await;
    assert_eq!(order.status_history.len(), entries, "History length is incorrect");
    let last = order.status_history.last().expect("History is empty");
    assert_eq!(last.status, order.status, "The last history entry does not match the status");
}

#[then(expr = "the order of '{word}' has {int} processed payment event(s)")]
async fn processed_events(world: &mut ShopWorld, customer: String, count: usize) {
    let order_id = world.order_id(&customer);
    let events = world.system().db.fetch_events_for_order(order_id).await.expect("Error fetching events");
    assert_eq!(events.iter().filter(|e| e.processed).count(), count, "Processed event count is incorrect");
}

#[then(expr = "the order of '{word}' has {int} abandoned payment event(s)")]
async fn abandoned_events(world: &mut ShopWorld, customer: String, count: usize) {
    let order_id = world.order_id(&customer);
    let events = world.system().queries.abandoned_events().await.expect("Error fetching events");
    assert_eq!(events.iter().filter(|e| e.order_id == order_id).count(), count, "Abandoned event count is incorrect");
}

#[then(expr = "the stock of '{word}' is {int}")]
async fn stock_level(world: &mut ShopWorld, product: String, expected: i64) {
    let stock = world.system().db.get_stock(&ProductId::from(product)).await.expect("Error fetching stock");
    assert_eq!(stock, expected, "Stock is incorrect");
}

#[then(expr = "the operation fails with {string}")]
async fn operation_fails(world: &mut ShopWorld, message: String) {
    let error = world.last_error.as_deref().expect("The last operation succeeded");
    assert!(error.contains(&message), "Expected an error containing '{message}', got '{error}'");
}

#[then("the operation succeeds")]
async fn operation_succeeds(world: &mut ShopWorld) {
    assert!(world.last_error.is_none(), "The last operation failed: {:?}", world.last_error);
}

#[then(expr = "a repeat of the notification for the order of '{word}' with event id '{word}' is acknowledged as a duplicate")]
async fn duplicate_acknowledged(world: &mut ShopWorld, customer: String, external_id: String) {
    let order_id = world.order_id(&customer);
    let payload = WebhookPayload::new("stripe", external_id, PaymentEventType::IntentSucceeded, order_id);
    let outcome = world.system().reconciliation.ingest_webhook(payload).await.expect("Notification was rejected");
    assert!(matches!(outcome, IngestOutcome::Duplicate { .. }), "Expected a duplicate, got {outcome:?}");
}
