use crate::{
    db_types::{NewPaymentEvent, OrderId, PaymentEvent},
    traits::StoreError,
};

/// The payment event log. Events are never deleted.
#[allow(async_fn_in_trait)]
pub trait PaymentEventManagement {
    /// Appends an event. Fails with `DuplicateEvent` if `(provider, external_id)` has been seen before.
    async fn insert_payment_event(&self, event: NewPaymentEvent) -> Result<PaymentEvent, StoreError>;

    async fn fetch_payment_event(&self, id: i64) -> Result<Option<PaymentEvent>, StoreError>;

    /// Persists the processing fields of the event (`processed`, `processed_at`, `error_message`, `retry_count`),
    /// guarded by a compare-and-swap on `version`.
    async fn update_payment_event(&self, event: &PaymentEvent) -> Result<PaymentEvent, StoreError>;

    /// Unprocessed events with fewer than `retry_limit` retries, oldest first.
    async fn fetch_unprocessed_events(&self, retry_limit: i64) -> Result<Vec<PaymentEvent>, StoreError>;

    /// Unprocessed events that have been retried at least `retry_limit` times, oldest first.
    async fn fetch_abandoned_events(&self, retry_limit: i64) -> Result<Vec<PaymentEvent>, StoreError>;

    /// Every event for the order, oldest first.
    async fn fetch_events_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentEvent>, StoreError>;
}
