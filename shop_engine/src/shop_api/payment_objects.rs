use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shop_common::{CurrencyCode, MinorUnits};

use crate::{
    db_types::{NewPaymentEvent, Order, OrderId, PaymentEvent, PaymentEventType},
    shop_api::errors::PaymentEventError,
};

/// A payment provider notification, as delivered by the webhook transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub provider: String,
    pub external_id: String,
    #[serde(rename = "type")]
    pub event_type: PaymentEventType,
    pub order_id: OrderId,
    #[serde(default)]
    pub amount_minor: Option<MinorUnits>,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
    #[serde(default)]
    pub status: Option<String>,
    /// The provider's id for the payment. When absent, `external_id` is recorded on the order instead.
    #[serde(default)]
    pub payment_ref: Option<String>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

impl WebhookPayload {
    pub fn new<P, E>(provider: P, external_id: E, event_type: PaymentEventType, order_id: OrderId) -> Self
    where
        P: Into<String>,
        E: Into<String>,
    {
        Self {
            provider: provider.into(),
            external_id: external_id.into(),
            event_type,
            order_id,
            amount_minor: None,
            currency: None,
            status: None,
            payment_ref: None,
            meta: None,
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
        self.meta = Some(meta);
        self
    }

    /// Converts the payload into an event ready for the log, rejecting it if it is malformed.
    pub fn into_new_event(self, now: DateTime<Utc>) -> Result<NewPaymentEvent, PaymentEventError> {
        let mut event = NewPaymentEvent::new(self.order_id, self.provider, self.event_type, self.external_id, now);
        event.amount_minor = self.amount_minor;
        event.currency = self.currency;
        event.provider_status = self.status;
        event.payment_ref = self.payment_ref;
        event.meta = self.meta.unwrap_or(serde_json::Value::Null);
        event.validate()?;
        Ok(event)
    }
}

/// The result of one attempt at applying a payment event to its order.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The event was applied. `order` is the updated order if its status changed.
    Processed { event: PaymentEvent, order: Option<Order> },
    /// The event could not be applied. The reason has been stored on the event, which can be retried.
    Failed { event: PaymentEvent, reason: String },
}

impl DispatchOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed { .. })
    }
}

/// What the webhook transport is told. Every variant means the notification was accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Dispatched(DispatchOutcome),
    /// The `(provider, external_id)` pair had been seen before, so nothing was done.
    Duplicate { provider: String, external_id: String },
}

impl IngestOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryReport {
    pub retried: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Events that have used up their automatic retries, oldest first.
    pub abandoned: Vec<PaymentEvent>,
}
