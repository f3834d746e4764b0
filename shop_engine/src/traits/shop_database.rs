use thiserror::Error;

use crate::{
    db_types::{Cart, NewOrder, Order, OwnerId, PaymentEvent, ProductId},
    traits::{CartManagement, OrderManagement, PaymentEventManagement, ProductCatalog, StockShortfall},
};

/// This trait defines the highest level of behaviour for backends supporting the shop engine.
///
/// On top of the single-aggregate traits, it provides the operations that touch several records and must therefore
/// be atomic.
#[allow(async_fn_in_trait)]
pub trait ShopDatabase: Clone + ProductCatalog + CartManagement + OrderManagement + PaymentEventManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Turns the cart into an order in a single transaction:
    /// * the order snapshot is inserted,
    /// * the stock of every line is decremented, provided enough is available,
    /// * the cart is emptied, provided its version still matches `cart.version`.
    ///
    /// If any decrement fails, the transaction is rolled back, and `InsufficientStock` is returned with the shortfalls
    /// as they are at that moment. An order number collision fails with `DuplicateOrderNumber`, and nothing is
    /// written.
    async fn checkout(&self, order: NewOrder, cart: &Cart) -> Result<Order, StoreError>;

    /// Writes the cancelled order (compare-and-swap on `version`) and returns every line's quantity to stock, in one
    /// transaction.
    async fn cancel_order(&self, order: &Order) -> Result<Order, StoreError>;

    /// Saves the outcome of dispatching a payment event. When the dispatch changed the order, the order write and the
    /// event write share a transaction, so the event is only ever marked processed together with the order change.
    async fn commit_reconciliation(
        &self,
        order: Option<&Order>,
        event: &PaymentEvent,
    ) -> Result<(Option<Order>, PaymentEvent), StoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("A payment event from {provider} with external id {external_id} has already been recorded")]
    DuplicateEvent { provider: String, external_id: String },
    #[error("Order number {0} is already in use")]
    DuplicateOrderNumber(String),
    #[error("Insufficient stock for {} product(s)", .0.len())]
    InsufficientStock(Vec<StockShortfall>),
    #[error("{entity} {id} was modified by someone else (expected version {expected})")]
    VersionConflict { entity: &'static str, id: String, expected: i64 },
    #[error("The requested order {0} does not exist")]
    OrderNotFound(String),
    #[error("There is no cart for {0}")]
    CartNotFound(OwnerId),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(ProductId),
    #[error("The requested payment event {0} does not exist")]
    PaymentEventNotFound(i64),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}
