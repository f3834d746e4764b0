//! Read-only queries over orders and payment events.
use std::fmt::Debug;

use chrono::{Duration, Utc};

use crate::{
    db_types::{Order, OrderId, OrderNumber, OrderStatusType, OwnerId, PaymentEvent},
    payment_ledger::SOFT_RETRY_LIMIT,
    traits::{
        OrderManagement,
        OrderQueryFilter,
        OrderStatistics,
        Page,
        Pagination,
        PaymentEventManagement,
        StoreError,
    },
};

pub struct OrderQueryApi<B> {
    db: B,
}

impl<B: Debug> Debug for OrderQueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderQueryApi ({:?})", self.db)
    }
}

impl<B> OrderQueryApi<B>
where B: OrderManagement + PaymentEventManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// One page of an owner's orders, newest first. `page` is 1-based and `limit` is clamped to `1..=100`.
    pub async fn orders_for_owner(
        &self,
        owner_id: &OwnerId,
        status: Option<OrderStatusType>,
        page: u32,
        limit: u32,
    ) -> Result<Page<Order>, StoreError> {
        let mut filter = OrderQueryFilter::default()
            .with_owner_id(owner_id.clone())
            .newest_first()
            .with_pagination(Pagination::new(page, limit));
        if let Some(status) = status {
            filter = filter.with_status(status);
        }
        self.db.search_orders(filter).await
    }

    pub async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        self.db.fetch_order(order_id).await
    }

    pub async fn order_by_number(&self, order_number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        self.db.fetch_order_by_number(order_number).await
    }

    pub async fn order_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Order>, StoreError> {
        self.db.fetch_order_by_payment_ref(payment_ref).await
    }

    /// Order counts and revenue, for one owner or for the whole shop.
    pub async fn order_statistics(&self, owner_id: Option<&OwnerId>) -> Result<OrderStatistics, StoreError> {
        self.db.order_statistics(owner_id).await
    }

    /// Orders that have been waiting for payment for longer than `older_than`, oldest first.
    pub async fn pending_orders(&self, older_than: Duration) -> Result<Vec<Order>, StoreError> {
        let filter = OrderQueryFilter::default()
            .with_status(OrderStatusType::Pending)
            .with_created_before(Utc::now() - older_than);
        let page = self.db.search_orders(filter).await?;
        Ok(page.items)
    }

    /// The payment event audit trail of an order, oldest first.
    pub async fn events_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentEvent>, StoreError> {
        self.db.fetch_events_for_order(order_id).await
    }

    pub async fn unprocessed_events(&self) -> Result<Vec<PaymentEvent>, StoreError> {
        self.db.fetch_unprocessed_events(SOFT_RETRY_LIMIT).await
    }

    /// Events that have used up their automatic retries and need manual handling.
    pub async fn abandoned_events(&self) -> Result<Vec<PaymentEvent>, StoreError> {
        self.db.fetch_abandoned_events(SOFT_RETRY_LIMIT).await
    }
}
