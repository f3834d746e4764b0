use shop_common::{Money, MoneyError, Quantity};
use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderNumber, OrderStatusType, ProductId},
    traits::{StockShortfall, StoreError},
};

#[derive(Debug, Clone, Error)]
pub enum CartError {
    #[error("Quantity {0} is invalid. Quantities must be between 1 and 100")]
    InvalidQuantity(Quantity),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Adding to {product_id} would take the line to {requested} units, over the limit of {limit}")]
    LimitExceeded { product_id: ProductId, requested: Quantity, limit: Quantity },
    #[error("Product {0} is not in the cart")]
    NotFound(ProductId),
    #[error("Product {0} does not exist")]
    ProductNotFound(ProductId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<MoneyError> for CartError {
    fn from(e: MoneyError) -> Self {
        Self::InvalidAmount(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderError {
    #[error("An order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("The cancellation window has expired. Payment was {elapsed_minutes} minutes ago; the window is {window_minutes} minutes")]
    WindowExpired { elapsed_minutes: i64, window_minutes: i64 },
    #[error("Order {0} has already been cancelled")]
    AlreadyCancelled(OrderNumber),
    #[error("Orders with status {0} cannot be cancelled")]
    NotCancellable(OrderStatusType),
    #[error("A tracking number is required to ship an order")]
    MissingTrackingNumber,
    #[error("An order must contain at least one line")]
    EmptyOrder,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Product {0} does not exist")]
    ProductNotFound(ProductId),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<MoneyError> for OrderError {
    fn from(e: MoneyError) -> Self {
        Self::InvalidAmount(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentEventError {
    #[error("The event metadata is {size} bytes, which exceeds the limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("Payment event {event_id} has already been retried {retries} times")]
    RetryLimitExceeded { event_id: i64, retries: i64 },
    #[error("Invalid payment event payload: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("Insufficient stock for {} product(s)", .0.len())]
    InsufficientStock(Vec<StockShortfall>),
    #[error("Payment of {received} does not match the order total of {expected}")]
    AmountMismatch { expected: Money, received: Money },
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Could not allocate a unique order number after {0} attempts")]
    OrderNumberExhausted(usize),
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    PaymentEvent(#[from] PaymentEventError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<MoneyError> for ReconciliationError {
    fn from(e: MoneyError) -> Self {
        Self::Order(OrderError::InvalidAmount(e.to_string()))
    }
}
