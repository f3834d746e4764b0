//! The order state machine.
//!
//! All functions in this module are pure: they operate on an in-memory [`Order`] and take the current time from the
//! caller. A transition is validated in full before anything on the order is touched, so a failed call leaves the
//! order exactly as it was. Persisting the result is left to the [`crate::traits::OrderManagement`] backend, which
//! writes the whole row with a compare-and-swap on `version`.
//!
//! ```text
//! Pending    -> {Paid, Cancelled, Failed}
//! Paid       -> {Processing, Cancelled}
//! Processing -> {Shipped, Cancelled}
//! Shipped    -> {Delivered}
//! Delivered  -> {}
//! Cancelled  -> {}
//! Failed     -> {Pending}
//! ```
use chrono::{DateTime, Duration, Utc};
use log::*;
use shop_common::{line_subtotal, sum, CurrencyCode, MinorUnits};

use crate::{
    db_types::{
        Cart,
        NewOrder,
        Order,
        OrderLine,
        OrderNumber,
        OrderStatusType,
        Product,
        ShippingAddress,
        StatusChange,
    },
    shop_api::errors::OrderError,
};

pub const DEFAULT_CANCELLATION_WINDOW: Duration = Duration::hours(1);

impl OrderStatusType {
    pub fn allowed_transitions(&self) -> &'static [OrderStatusType] {
        use OrderStatusType::*;
        match self {
            Pending => &[Paid, Cancelled, Failed],
            Paid => &[Processing, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered],
            Delivered => &[],
            Cancelled => &[],
            Failed => &[Pending],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Who is asking for a status change, and when.
#[derive(Debug, Clone)]
pub struct StatusContext {
    pub is_admin: bool,
    pub actor_id: Option<String>,
    pub note: Option<String>,
    pub now: DateTime<Utc>,
    /// How long after payment a non-admin may still cancel.
    pub cancellation_window: Duration,
}

impl StatusContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { is_admin: false, actor_id: None, note: None, now, cancellation_window: DEFAULT_CANCELLATION_WINDOW }
    }

    pub fn as_admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    pub fn with_actor<S: Into<String>>(mut self, actor_id: S) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_cancellation_window(mut self, window: Duration) -> Self {
        self.cancellation_window = window;
        self
    }
}

impl Order {
    /// Moves the order to `new_status`.
    ///
    /// Rules, checked in order:
    /// * `new_status` must be reachable from the current status (`InvalidTransition`).
    /// * Cancelling a `Processing` order requires an admin (`Forbidden`).
    /// * Cancelling a `Paid` order more than `cancellation_window` after `paid_at` requires an admin
    ///   (`WindowExpired`).
    ///
    /// On success the status, the relevant lifecycle timestamp, `updated_at` and the history are updated together.
    /// Stamps never go backwards: if `ctx.now` is earlier than the last change, the last change time is used.
    pub fn update_status(&mut self, new_status: OrderStatusType, ctx: &StatusContext) -> Result<(), OrderError> {
        use OrderStatusType::*;
        let from = self.status;
        if !from.can_transition_to(new_status) {
            return Err(OrderError::InvalidTransition { from, to: new_status });
        }
        if new_status == Cancelled {
            match from {
                Processing if !ctx.is_admin => {
                    return Err(OrderError::Forbidden("Only an admin can cancel an order that is being processed".into()));
                },
                Paid if !ctx.is_admin => {
                    let paid_at = self.paid_at.unwrap_or(self.updated_at);
                    let elapsed = ctx.now - paid_at;
                    if elapsed > ctx.cancellation_window {
                        return Err(OrderError::WindowExpired {
                            elapsed_minutes: elapsed.num_minutes(),
                            window_minutes: ctx.cancellation_window.num_minutes(),
                        });
                    }
                },
                _ => {},
            }
        }
        let stamp = ctx.now.max(self.updated_at);
        self.status = new_status;
        match new_status {
            Paid => self.paid_at = Some(stamp),
            Shipped => self.shipped_at = Some(stamp),
            Delivered => self.delivered_at = Some(stamp),
            Cancelled => self.cancelled_at = Some(stamp),
            Pending | Processing | Failed => {},
        }
        self.updated_at = stamp;
        self.status_history.push(StatusChange {
            status: new_status,
            timestamp: stamp,
            note: ctx.note.clone(),
            actor_id: ctx.actor_id.clone(),
        });
        trace!("📦️ Order {} moved from {from} to {new_status}", self.order_number);
        Ok(())
    }

    /// Cancels a `Pending` or `Paid` order. The reason is recorded on the history entry.
    pub fn cancel(&mut self, reason: &str, ctx: &StatusContext) -> Result<(), OrderError> {
        match self.status {
            OrderStatusType::Cancelled => Err(OrderError::AlreadyCancelled(self.order_number.clone())),
            OrderStatusType::Pending | OrderStatusType::Paid => {
                let ctx = ctx.clone().with_note(reason);
                self.update_status(OrderStatusType::Cancelled, &ctx)
            },
            status => Err(OrderError::NotCancellable(status)),
        }
    }

    /// Hands a `Processing` order to a carrier.
    pub fn ship(&mut self, tracking_number: &str, carrier: Option<&str>, ctx: &StatusContext) -> Result<(), OrderError> {
        let tracking_number = tracking_number.trim();
        if tracking_number.is_empty() {
            return Err(OrderError::MissingTrackingNumber);
        }
        if self.status != OrderStatusType::Processing {
            return Err(OrderError::InvalidTransition { from: self.status, to: OrderStatusType::Shipped });
        }
        self.update_status(OrderStatusType::Shipped, ctx)?;
        self.tracking_number = Some(tracking_number.to_string());
        self.carrier = carrier.map(String::from);
        Ok(())
    }

    pub fn mark_delivered(&mut self, ctx: &StatusContext) -> Result<(), OrderError> {
        self.update_status(OrderStatusType::Delivered, ctx)
    }

    /// Returns a `Failed` order to `Pending` so that payment can be attempted again. The stock reserved at checkout is
    /// kept.
    pub fn retry_payment(&mut self, ctx: &StatusContext) -> Result<(), OrderError> {
        if self.status != OrderStatusType::Failed {
            return Err(OrderError::InvalidTransition { from: self.status, to: OrderStatusType::Pending });
        }
        self.update_status(OrderStatusType::Pending, ctx)
    }
}

impl NewOrder {
    /// Snapshots the cart into a new order.
    ///
    /// Product names are copied from `catalog`. Unit prices are taken from the cart lines, which hold the price the
    /// customer saw. Line subtotals and totals are recomputed from quantities and unit prices.
    pub fn from_cart(
        order_number: OrderNumber,
        cart: &Cart,
        catalog: &[Product],
        shipping_minor: MinorUnits,
        currency: CurrencyCode,
        shipping_address: Option<ShippingAddress>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if cart.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        if shipping_minor.is_negative() {
            return Err(OrderError::InvalidAmount(format!("Shipping cannot be negative ({shipping_minor})")));
        }
        let lines = cart
            .lines()
            .iter()
            .map(|line| {
                let product = catalog
                    .iter()
                    .find(|p| &p.id == line.product_id())
                    .ok_or_else(|| OrderError::ProductNotFound(line.product_id().clone()))?;
                Ok(OrderLine {
                    product_id: line.product_id().clone(),
                    product_name: product.name.clone(),
                    quantity: line.quantity(),
                    unit_price_minor: line.unit_price_minor(),
                    line_subtotal_minor: line_subtotal(line.quantity(), line.unit_price_minor())?,
                })
            })
            .collect::<Result<Vec<OrderLine>, OrderError>>()?;
        let subtotal_minor = sum(lines.iter().map(|l| l.line_subtotal_minor))?;
        let total_minor = subtotal_minor.checked_add(shipping_minor)?;
        let status_history = vec![StatusChange {
            status: OrderStatusType::Pending,
            timestamp: now,
            note: Some("Order created".into()),
            actor_id: Some(cart.owner_id.to_string()),
        }];
        Ok(Self {
            order_number,
            owner_id: cart.owner_id.clone(),
            lines,
            currency,
            subtotal_minor,
            shipping_minor,
            total_minor,
            shipping_address,
            status_history,
            created_at: now,
        })
    }
}
