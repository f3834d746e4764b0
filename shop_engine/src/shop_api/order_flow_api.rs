use std::fmt::Debug;

use chrono::Duration;
use log::*;

use crate::{
    db_types::{Order, OrderId, OrderStatusType},
    events::{EventProducers, OrderStatusChangedEvent},
    order_lifecycle::{StatusContext, DEFAULT_CANCELLATION_WINDOW},
    shop_api::errors::OrderError,
    traits::ShopDatabase,
};

/// `OrderFlowApi` moves orders through their lifecycle on behalf of customers and admins.
///
/// Each call loads the order, applies the transition in memory and writes it back with a compare-and-swap on the
/// order version. Cancellations return the order's stock in the same transaction. Subscribers to the status-changed
/// hook are notified after the write succeeds.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    cancellation_window: Duration,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, cancellation_window: DEFAULT_CANCELLATION_WINDOW }
    }

    pub fn with_cancellation_window(mut self, window: Duration) -> Self {
        self.cancellation_window = window;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> OrderFlowApi<B>
where B: ShopDatabase
{
    pub async fn update_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatusType,
        ctx: &StatusContext,
    ) -> Result<Order, OrderError> {
        let ctx = self.context(ctx);
        self.apply(order_id, |order| order.update_status(new_status, &ctx)).await
    }

    pub async fn cancel(&self, order_id: OrderId, reason: &str, ctx: &StatusContext) -> Result<Order, OrderError> {
        let ctx = self.context(ctx);
        self.apply(order_id, |order| order.cancel(reason, &ctx)).await
    }

    pub async fn ship(
        &self,
        order_id: OrderId,
        tracking_number: &str,
        carrier: Option<&str>,
        ctx: &StatusContext,
    ) -> Result<Order, OrderError> {
        let ctx = self.context(ctx);
        self.apply(order_id, |order| order.ship(tracking_number, carrier, &ctx)).await
    }

    pub async fn mark_delivered(&self, order_id: OrderId, ctx: &StatusContext) -> Result<Order, OrderError> {
        let ctx = self.context(ctx);
        self.apply(order_id, |order| order.mark_delivered(&ctx)).await
    }

    /// Puts a `Failed` order back to `Pending`. The stock reserved at checkout is still held, so nothing is
    /// decremented again.
    pub async fn retry_payment(&self, order_id: OrderId, ctx: &StatusContext) -> Result<Order, OrderError> {
        let ctx = self.context(ctx);
        self.apply(order_id, |order| order.retry_payment(&ctx)).await
    }

    fn context(&self, ctx: &StatusContext) -> StatusContext {
        ctx.clone().with_cancellation_window(self.cancellation_window)
    }

    async fn apply<F>(&self, order_id: OrderId, transition: F) -> Result<Order, OrderError>
    where F: FnOnce(&mut Order) -> Result<(), OrderError> {
        let mut order = self.db.fetch_order(order_id).await?.ok_or(OrderError::OrderNotFound(order_id))?;
        let old_status = order.status;
        transition(&mut order)?;
        let order = if order.status == OrderStatusType::Cancelled {
            self.db.cancel_order(&order).await?
        } else {
            self.db.update_order(&order).await?
        };
        info!("📦️ Order {} is now {} (was {old_status})", order.order_number, order.status);
        self.producers.publish_order_status_changed(OrderStatusChangedEvent::new(old_status, order.clone())).await;
        Ok(order)
    }
}
