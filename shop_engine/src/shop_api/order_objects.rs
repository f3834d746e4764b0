use serde::{Deserialize, Serialize};
use shop_common::MinorUnits;

use crate::db_types::{Order, OrderId, OrderNumber, OwnerId, ShippingAddress};

/// What a customer submits to turn their cart into an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub owner_id: OwnerId,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    pub shipping_minor: MinorUnits,
}

impl CheckoutRequest {
    pub fn new<S: Into<OwnerId>>(owner_id: S) -> Self {
        Self { owner_id: owner_id.into(), shipping_address: None, shipping_minor: MinorUnits::ZERO }
    }

    pub fn with_shipping(mut self, shipping_minor: MinorUnits) -> Self {
        self.shipping_minor = shipping_minor;
        self
    }

    pub fn with_address(mut self, address: ShippingAddress) -> Self {
        self.shipping_address = Some(address);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub total_minor: MinorUnits,
}

impl From<&Order> for CheckoutReceipt {
    fn from(order: &Order) -> Self {
        Self { order_id: order.id, order_number: order.order_number.clone(), total_minor: order.total_minor }
    }
}
