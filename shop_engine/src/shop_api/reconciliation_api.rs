//! `ReconciliationApi` is the primary API for turning carts into orders, and for applying payment provider
//! notifications to those orders.
//!
//! ## Checkout
//! The owner's cart is checked against the stock ledger, snapshotted into a new order and handed to the backend,
//! which inserts the order, reserves the stock and empties the cart in one transaction.
//!
//! ## Webhooks
//! Every notification is first written to the payment event log. The `(provider, external_id)` pair is unique, so a
//! redelivered notification is recognised and acknowledged without being applied a second time. The event is then
//! dispatched against its order. A dispatch that fails is recorded on the event and left for
//! [`ReconciliationApi::retry_failed_events`]; the transport is never told to redeliver.
use std::{collections::HashMap, fmt::Debug};

use chrono::{DateTime, Utc};
use log::*;
use shop_common::Money;

use crate::{
    config::EngineConfig,
    db_types::{Cart, NewOrder, Order, OrderStatusType, PaymentEvent, PaymentEventType, ProductId},
    events::{EventProducers, OrderCreatedEvent, OrderStatusChangedEvent, PaymentEventAbandonedEvent},
    helpers::generate_order_number,
    order_lifecycle::StatusContext,
    payment_ledger::SOFT_RETRY_LIMIT,
    shop_api::{
        errors::{OrderError, ReconciliationError},
        order_objects::{CheckoutReceipt, CheckoutRequest},
        payment_objects::{DispatchOutcome, IngestOutcome, RetryReport, WebhookPayload},
    },
    traits::{ShopDatabase, StoreError},
};

/// How many order numbers are tried before checkout gives up.
pub const MAX_ORDER_NUMBER_ATTEMPTS: usize = 5;

pub struct ReconciliationApi<B> {
    db: B,
    producers: EventProducers,
    config: EngineConfig,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers, config: EngineConfig) -> Self {
        Self { db, producers, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> ReconciliationApi<B>
where B: ShopDatabase
{
    /// Turns the owner's cart into a `Pending` order.
    ///
    /// Fails with `InsufficientStock` if any line cannot be fulfilled, either when the cart is checked up front or
    /// because a concurrent checkout took the stock first. In both cases nothing has been written.
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt, ReconciliationError> {
        let now = Utc::now();
        let cart =
            self.db.fetch_cart(&request.owner_id).await?.unwrap_or_else(|| Cart::new(request.owner_id.clone(), now));
        if cart.is_empty() {
            return Err(OrderError::EmptyOrder.into());
        }
        let ids = cart.lines().iter().map(|l| l.product_id().clone()).collect::<Vec<ProductId>>();
        let catalog = self.db.fetch_products(&ids).await?;
        let stock = catalog.iter().map(|p| (p.id.clone(), p.stock)).collect::<HashMap<_, _>>();
        if let Some(missing) = ids.iter().find(|id| !stock.contains_key(*id)) {
            return Err(OrderError::ProductNotFound(missing.clone()).into());
        }
        let validation = cart.stock_validation(&stock);
        if !validation.is_valid {
            info!("📦️ Checkout for {} refused. {} line(s) are short", request.owner_id, validation.shortfalls.len());
            return Err(ReconciliationError::InsufficientStock(validation.shortfalls));
        }
        for attempt in 1..=MAX_ORDER_NUMBER_ATTEMPTS {
            let order = NewOrder::from_cart(
                generate_order_number(now),
                &cart,
                &catalog,
                request.shipping_minor,
                self.config.currency.clone(),
                request.shipping_address.clone(),
                now,
            )?;
            match self.db.checkout(order, &cart).await {
                Ok(order) => {
                    info!("📦️ Order {} created for {}. Total: {}", order.order_number, order.owner_id, order.total());
                    let receipt = CheckoutReceipt::from(&order);
                    self.producers.publish_order_created(OrderCreatedEvent::new(order)).await;
                    return Ok(receipt);
                },
                Err(StoreError::DuplicateOrderNumber(number)) => {
                    warn!("📦️ Order number {number} is already taken (attempt {attempt}). Generating another.");
                },
                Err(StoreError::InsufficientStock(shortfalls)) => {
                    return Err(ReconciliationError::InsufficientStock(shortfalls));
                },
                Err(e) => return Err(e.into()),
            }
        }
        error!("📦️ Could not allocate an order number for {} after {MAX_ORDER_NUMBER_ATTEMPTS} attempts", request.owner_id);
        Err(ReconciliationError::OrderNumberExhausted(MAX_ORDER_NUMBER_ATTEMPTS))
    }

    /// Records a payment provider notification and applies it to its order.
    ///
    /// An `Err` result means the payload itself was rejected (it is malformed, or refers to an order that does not
    /// exist) and nothing was recorded. Every `Ok` result means the notification was accepted.
    pub async fn ingest_webhook(&self, payload: WebhookPayload) -> Result<IngestOutcome, ReconciliationError> {
        let now = Utc::now();
        let order_id = payload.order_id;
        let new_event = payload.into_new_event(now)?;
        if self.db.fetch_order(order_id).await?.is_none() {
            warn!("💳️ {} event {} refers to unknown order {order_id}", new_event.provider, new_event.external_id);
            return Err(ReconciliationError::OrderNotFound(order_id));
        }
        let event = match self.db.insert_payment_event(new_event).await {
            Ok(event) => event,
            Err(StoreError::DuplicateEvent { provider, external_id }) => {
                info!("💳️ {provider} event {external_id} has been seen before. Acknowledging without applying it.");
                return Ok(IngestOutcome::Duplicate { provider, external_id });
            },
            Err(e) => return Err(e.into()),
        };
        debug!("💳️ {} event {} recorded as #{}", event.event_type, event.external_id, event.id);
        let outcome = self.dispatch(event, now).await;
        Ok(IngestOutcome::Dispatched(outcome))
    }

    /// Re-dispatches every failed event that still has automatic retries left, oldest first.
    ///
    /// Events whose earlier dispatch never got as far as saving an outcome are picked up too, once they are older
    /// than the configured grace period. Each retried event has its retry counter bumped before the attempt, whatever
    /// the outcome. A failure on one event does not stop the sweep. Events that have run out of retries are listed in
    /// the report, and the payment-event-abandoned hook is fired for each of them.
    pub async fn retry_failed_events(&self) -> Result<RetryReport, ReconciliationError> {
        let now = Utc::now();
        let mut report = RetryReport::default();
        for mut event in self.db.fetch_unprocessed_events(SOFT_RETRY_LIMIT).await? {
            let stranded = event.is_stranded(now, self.config.stranded_event_grace);
            if !event.can_retry() && !stranded {
                continue;
            }
            if stranded {
                warn!(
                    "💳️ Event #{} for order {} has no recorded outcome. Dispatching it again.",
                    event.id,
                    event.order_id
                );
            }
            if let Err(e) = event.increment_retry() {
                error!("💳️ Event #{} cannot be retried. {e}", event.id);
                report.failed += 1;
                continue;
            }
            report.retried += 1;
            debug!("💳️ Retrying event #{} (attempt {})", event.id, event.retry_count);
            match self.dispatch(event, now).await {
                DispatchOutcome::Processed { .. } => report.succeeded += 1,
                DispatchOutcome::Failed { .. } => report.failed += 1,
            }
        }
        report.abandoned = self.db.fetch_abandoned_events(SOFT_RETRY_LIMIT).await?;
        for event in &report.abandoned {
            warn!(
                "💳️ Event #{} ({} {}) for order {} has been abandoned after {} retries. Last error: {}",
                event.id,
                event.provider,
                event.external_id,
                event.order_id,
                event.retry_count,
                event.error_message.as_deref().unwrap_or("none")
            );
            self.producers.publish_payment_event_abandoned(PaymentEventAbandonedEvent::new(event.clone())).await;
        }
        info!(
            "💳️ Retry sweep complete. {} retried, {} succeeded, {} failed, {} abandoned",
            report.retried,
            report.succeeded,
            report.failed,
            report.abandoned.len()
        );
        Ok(report)
    }

    /// Applies an event to its order and stores the outcome.
    ///
    /// On success the order change and the processed flag are committed together. On any failure, including a store
    /// error or a failed commit, the event as it was handed in is marked failed and saved on its own. If even that
    /// write fails, the event is left without an outcome and the retry sweep picks it up after the grace period.
    async fn dispatch(&self, mut event: PaymentEvent, now: DateTime<Utc>) -> DispatchOutcome {
        let original = event.clone();
        let applied = match self.db.fetch_order(event.order_id).await {
            Ok(Some(mut order)) => self.apply_event(&mut order, &event, now).map(|change| change.map(|old| (old, order))),
            Ok(None) => Err(ReconciliationError::OrderNotFound(event.order_id)),
            Err(e) => Err(e.into()),
        };
        let reason = match applied {
            Ok(change) => {
                event.mark_as_processed(now);
                match self.db.commit_reconciliation(change.as_ref().map(|(_, order)| order), &event).await {
                    Ok((order, event)) => {
                        if let (Some((old_status, _)), Some(updated)) = (&change, &order) {
                            info!("💳️ Order {} moved from {old_status} to {}", updated.order_number, updated.status);
                            let hook = OrderStatusChangedEvent::new(*old_status, updated.clone());
                            self.producers.publish_order_status_changed(hook).await;
                        }
                        return DispatchOutcome::Processed { event, order };
                    },
                    Err(e) => e.to_string(),
                }
            },
            Err(e) => e.to_string(),
        };
        warn!("💳️ Event #{} could not be applied to order {}. {reason}", original.id, original.order_id);
        let mut failed = original;
        failed.mark_as_failed(&reason);
        match self.db.update_payment_event(&failed).await {
            Ok(event) => DispatchOutcome::Failed { event, reason },
            Err(e) => {
                error!("💳️ The failure of event #{} could not be recorded. {e}", failed.id);
                DispatchOutcome::Failed { event: failed, reason }
            },
        }
    }

    /// Works out what `event` means for `order` and applies it in memory. Returns the previous status if the order
    /// changed, or `None` if there is nothing to do.
    fn apply_event(
        &self,
        order: &mut Order,
        event: &PaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<Option<OrderStatusType>, ReconciliationError> {
        use OrderStatusType::*;
        let ctx = StatusContext::new(now)
            .with_actor(event.provider.as_str())
            .with_note(format!("{} {}", event.event_type, event.external_id))
            .with_cancellation_window(self.config.cancellation_window);
        let old_status = order.status;
        match event.event_type {
            PaymentEventType::IntentSucceeded => {
                if matches!(old_status, Paid | Processing | Shipped | Delivered) {
                    debug!("💳️ Order {} is already {old_status}. Nothing to do for {}", order.order_number, event.external_id);
                    return Ok(None);
                }
                self.verify_amount(order, event)?;
                if old_status == Failed {
                    order.retry_payment(&ctx)?;
                }
                order.update_status(Paid, &ctx)?;
                order.payment_ref = Some(event.payment_ref.clone().unwrap_or_else(|| event.external_id.clone()));
                Ok(Some(old_status))
            },
            PaymentEventType::IntentFailed => {
                if old_status != Pending {
                    debug!("💳️ Order {} is {old_status}. Ignoring payment failure {}", order.order_number, event.external_id);
                    return Ok(None);
                }
                order.update_status(Failed, &ctx)?;
                Ok(Some(old_status))
            },
            other => {
                info!("💳️ {other} event {} for order {} recorded. No action required.", event.external_id, order.order_number);
                Ok(None)
            },
        }
    }

    /// A missing currency on the event is taken to be the order currency. A missing amount cannot be checked, and is
    /// let through.
    fn verify_amount(&self, order: &Order, event: &PaymentEvent) -> Result<(), ReconciliationError> {
        if !self.config.verify_amounts {
            return Ok(());
        }
        let Some(amount) = event.amount_minor else {
            warn!("💳️ Event {} carries no amount. Order {} will be marked paid unchecked", event.external_id, order.order_number);
            return Ok(());
        };
        let currency = event.currency.clone().unwrap_or_else(|| order.currency.clone());
        if amount != order.total_minor || currency != order.currency {
            return Err(ReconciliationError::AmountMismatch {
                expected: order.total(),
                received: Money::new(amount, currency),
            });
        }
        Ok(())
    }
}
