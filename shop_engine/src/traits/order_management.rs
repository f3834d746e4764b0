use crate::{
    db_types::{Order, OrderId, OrderNumber, OwnerId},
    traits::{OrderQueryFilter, OrderStatistics, Page, StoreError},
};

#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn fetch_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<Order>, StoreError>;

    /// The most recent order carrying the given provider payment reference.
    async fn fetch_order_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Order>, StoreError>;

    /// Fetches orders matching the filter. `total` is the number of matching orders, regardless of pagination.
    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Page<Order>, StoreError>;

    /// Writes every mutable field of the order, guarded by a compare-and-swap on `order.version`.
    /// Returns the stored copy with the incremented version.
    async fn update_order(&self, order: &Order) -> Result<Order, StoreError>;

    /// Order counts and revenue, optionally restricted to one owner.
    async fn order_statistics(&self, owner_id: Option<&OwnerId>) -> Result<OrderStatistics, StoreError>;
}
