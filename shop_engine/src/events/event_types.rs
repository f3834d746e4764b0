use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, PaymentEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub old_status: OrderStatusType,
    pub order: Order,
}

impl OrderStatusChangedEvent {
    pub fn new(old_status: OrderStatusType, order: Order) -> Self {
        Self { old_status, order }
    }

    pub fn new_status(&self) -> OrderStatusType {
        self.order.status
    }
}

/// Emitted when a payment event has run out of automatic retries and needs manual handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEventAbandonedEvent {
    pub event: PaymentEvent,
}

impl PaymentEventAbandonedEvent {
    pub fn new(event: PaymentEvent) -> Self {
        Self { event }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    OrderCreated(OrderCreatedEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
    PaymentEventAbandoned(PaymentEventAbandonedEvent),
}
