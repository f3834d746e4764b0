use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use shop_common::{line_subtotal, CurrencyCode, MinorUnits, MoneyError, Quantity};
use sqlx::{FromRow, Type};
use thiserror::Error;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

//--------------------------------------     Identifiers     ---------------------------------------------------------
string_id!(OwnerId);
string_id!(ProductId);
string_id!(OrderNumber);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<i64> for OrderId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been created from a cart and is awaiting payment.
    Pending,
    /// The payment provider has confirmed payment in full.
    Paid,
    /// The merchant is preparing the order for shipment.
    Processing,
    /// The order has been handed to a carrier.
    Shipped,
    /// The order has reached the customer. Terminal.
    Delivered,
    /// The order was cancelled by the customer or an admin. Terminal.
    Cancelled,
    /// The payment attempt failed. The order may be moved back to `Pending` for another attempt.
    Failed,
}

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 7] = [
        OrderStatusType::Pending,
        OrderStatusType::Paid,
        OrderStatusType::Processing,
        OrderStatusType::Shipped,
        OrderStatusType::Delivered,
        OrderStatusType::Cancelled,
        OrderStatusType::Failed,
    ];
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Processing => write!(f, "Processing"),
            OrderStatusType::Shipped => write!(f, "Shipped"),
            OrderStatusType::Delivered => write!(f, "Delivered"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
            OrderStatusType::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------   PaymentEventType    ---------------------------------------------------------
/// The kind of notification a payment provider sent us. Unknown provider types map to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventType {
    IntentCreated,
    IntentSucceeded,
    IntentFailed,
    IntentCanceled,
    ChargeRefunded,
    ChargeDisputed,
    #[serde(other)]
    Other,
}

impl Display for PaymentEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentEventType::IntentCreated => "intent_created",
            PaymentEventType::IntentSucceeded => "intent_succeeded",
            PaymentEventType::IntentFailed => "intent_failed",
            PaymentEventType::IntentCanceled => "intent_canceled",
            PaymentEventType::ChargeRefunded => "charge_refunded",
            PaymentEventType::ChargeDisputed => "charge_disputed",
            PaymentEventType::Other => "other",
        };
        f.write_str(s)
    }
}

impl From<&str> for PaymentEventType {
    fn from(value: &str) -> Self {
        match value {
            "intent_created" => Self::IntentCreated,
            "intent_succeeded" => Self::IntentSucceeded,
            "intent_failed" => Self::IntentFailed,
            "intent_canceled" => Self::IntentCanceled,
            "charge_refunded" => Self::ChargeRefunded,
            "charge_disputed" => Self::ChargeDisputed,
            _ => Self::Other,
        }
    }
}

//--------------------------------------       Product         ---------------------------------------------------------
/// A row in the stock ledger. `stock` is the authoritative available quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price_minor: MinorUnits,
    pub stock: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub id: ProductId,
    pub name: String,
    pub price_minor: MinorUnits,
    pub stock: i64,
}

impl NewProduct {
    pub fn new<P: Into<ProductId>, S: Into<String>>(id: P, name: S, price_minor: MinorUnits, stock: i64) -> Self {
        Self { id: id.into(), name: name.into(), price_minor, stock }
    }
}

//--------------------------------------         Cart          ---------------------------------------------------------
/// A single product entry in a cart. The subtotal is recomputed by every call that changes the quantity or price,
/// so the fields are read-only outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredCartLine")]
pub struct CartLine {
    pub(crate) product_id: ProductId,
    pub(crate) quantity: Quantity,
    pub(crate) unit_price_minor: MinorUnits,
    pub(crate) line_subtotal_minor: MinorUnits,
}

/// A cart line as read from storage. The stored subtotal is ignored and recomputed.
#[derive(Deserialize)]
struct StoredCartLine {
    product_id: ProductId,
    quantity: Quantity,
    unit_price_minor: MinorUnits,
    #[serde(default)]
    line_subtotal_minor: Option<MinorUnits>,
}

impl TryFrom<StoredCartLine> for CartLine {
    type Error = MoneyError;

    fn try_from(stored: StoredCartLine) -> Result<Self, Self::Error> {
        let line = CartLine::new(stored.product_id, stored.quantity, stored.unit_price_minor)?;
        if stored.line_subtotal_minor.is_some_and(|s| s != line.line_subtotal_minor) {
            warn!("🛒️ Stored subtotal for {} was stale. Recomputed as {}", line.product_id, line.line_subtotal_minor);
        }
        Ok(line)
    }
}

impl CartLine {
    pub(crate) fn new(product_id: ProductId, quantity: Quantity, unit_price: MinorUnits) -> Result<Self, MoneyError> {
        let line_subtotal_minor = line_subtotal(quantity, unit_price)?;
        Ok(Self { product_id, quantity, unit_price_minor: unit_price, line_subtotal_minor })
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn unit_price_minor(&self) -> MinorUnits {
        self.unit_price_minor
    }

    pub fn line_subtotal_minor(&self) -> MinorUnits {
        self.line_subtotal_minor
    }
}

/// The per-owner shopping cart. A cart with `version == 0` has not been saved yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Cart {
    pub owner_id: OwnerId,
    #[sqlx(json)]
    pub(crate) lines: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Cart {
    pub fn new(owner_id: OwnerId, now: DateTime<Utc>) -> Self {
        Self { owner_id, lines: Vec::new(), created_at: now, updated_at: now, version: 0 }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    pub unit_price_minor: MinorUnits,
    pub line_subtotal_minor: MinorUnits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatusType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub actor_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub owner_id: OwnerId,
    pub status: OrderStatusType,
    #[sqlx(json)]
    pub lines: Vec<OrderLine>,
    pub currency: CurrencyCode,
    pub subtotal_minor: MinorUnits,
    pub shipping_minor: MinorUnits,
    pub total_minor: MinorUnits,
    #[sqlx(json)]
    pub shipping_address: Option<ShippingAddress>,
    pub payment_ref: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    #[sqlx(json)]
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl Order {
    pub fn total(&self) -> shop_common::Money {
        shop_common::Money::new(self.total_minor, self.currency.clone())
    }
}

/// An order snapshot that has not been stored yet. Built from a cart by [`NewOrder::from_cart`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub owner_id: OwnerId,
    pub lines: Vec<OrderLine>,
    pub currency: CurrencyCode,
    pub subtotal_minor: MinorUnits,
    pub shipping_minor: MinorUnits,
    pub total_minor: MinorUnits,
    pub shipping_address: Option<ShippingAddress>,
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     PaymentEvent      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PaymentEvent {
    pub id: i64,
    pub order_id: OrderId,
    pub provider: String,
    pub event_type: PaymentEventType,
    pub external_id: String,
    pub amount_minor: Option<MinorUnits>,
    pub currency: Option<CurrencyCode>,
    pub provider_status: Option<String>,
    /// The provider's reference for the payment itself (e.g. a payment intent id), as opposed to this notification.
    pub payment_ref: Option<String>,
    #[sqlx(json)]
    pub meta: serde_json::Value,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: i64,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPaymentEvent {
    pub order_id: OrderId,
    pub provider: String,
    pub event_type: PaymentEventType,
    pub external_id: String,
    pub amount_minor: Option<MinorUnits>,
    pub currency: Option<CurrencyCode>,
    pub provider_status: Option<String>,
    pub payment_ref: Option<String>,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NewPaymentEvent {
    pub fn new<S: Into<String>>(
        order_id: OrderId,
        provider: S,
        event_type: PaymentEventType,
        external_id: S,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            provider: provider.into(),
            event_type,
            external_id: external_id.into(),
            amount_minor: None,
            currency: None,
            provider_status: None,
            payment_ref: None,
            meta: serde_json::Value::Null,
            created_at,
        }
    }

    pub fn with_amount(mut self, amount: MinorUnits, currency: CurrencyCode) -> Self {
        self.amount_minor = Some(amount);
        self.currency = Some(currency);
        self
    }

    pub fn with_payment_ref<S: Into<String>>(mut self, payment_ref: S) -> Self {
        self.payment_ref = Some(payment_ref.into());
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }
}
