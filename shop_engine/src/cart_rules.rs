//! In-memory cart operations.
//!
//! Every operation validates its input before it changes the cart, recomputes the affected line subtotal, and bumps
//! `updated_at`. Saving the result is done by [`crate::CartApi`].
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use shop_common::{sum, MinorUnits, MoneyError, Quantity, MAX_LINE_QUANTITY};

use crate::{
    db_types::{Cart, CartLine, ProductId},
    shop_api::errors::CartError,
    traits::{StockShortfall, StockValidation},
};

impl Cart {
    /// Adds `quantity` units of a product. If the product is already in the cart the quantities are summed and the
    /// unit price is replaced with `unit_price`.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        quantity: Quantity,
        unit_price: MinorUnits,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        check_quantity(quantity)?;
        if !unit_price.is_positive() {
            return Err(CartError::InvalidAmount(format!("Unit price must be positive ({unit_price})")));
        }
        match self.lines.iter().position(|l| l.product_id == product_id) {
            Some(idx) => {
                let total = self.lines[idx].quantity + quantity;
                if total > MAX_LINE_QUANTITY {
                    return Err(CartError::LimitExceeded { product_id, requested: total, limit: MAX_LINE_QUANTITY });
                }
                self.lines[idx] = CartLine::new(product_id, total, unit_price)?;
            },
            None => self.lines.push(CartLine::new(product_id, quantity, unit_price)?),
        }
        self.touch(now);
        Ok(())
    }

    /// Sets the quantity of a line. A quantity of zero removes it.
    pub fn update_quantity(
        &mut self,
        product_id: &ProductId,
        quantity: Quantity,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        if quantity > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity(quantity));
        }
        let idx = self.position(product_id)?;
        if quantity == 0 {
            self.lines.remove(idx);
        } else {
            let line = &self.lines[idx];
            self.lines[idx] = CartLine::new(line.product_id.clone(), quantity, line.unit_price_minor)?;
        }
        self.touch(now);
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: &ProductId, now: DateTime<Utc>) -> Result<(), CartError> {
        let idx = self.position(product_id)?;
        self.lines.remove(idx);
        self.touch(now);
        Ok(())
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.lines.clear();
        self.touch(now);
    }

    /// Σ of the line subtotals.
    pub fn subtotal_minor(&self) -> Result<MinorUnits, MoneyError> {
        sum(self.lines.iter().map(|l| l.line_subtotal_minor))
    }

    /// Compares every line against the supplied stock levels. Products missing from `stock` count as zero available.
    pub fn stock_validation(&self, stock: &HashMap<ProductId, i64>) -> StockValidation {
        let shortfalls = self
            .lines
            .iter()
            .filter_map(|line| {
                let available = stock.get(&line.product_id).copied().unwrap_or(0).max(0);
                let requested = i64::from(line.quantity);
                (requested > available).then(|| StockShortfall::new(line.product_id.clone(), requested, available))
            })
            .collect();
        StockValidation::new(shortfalls)
    }

    fn position(&self, product_id: &ProductId) -> Result<usize, CartError> {
        self.lines.iter().position(|l| &l.product_id == product_id).ok_or_else(|| CartError::NotFound(product_id.clone()))
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.updated_at);
    }
}

fn check_quantity(quantity: Quantity) -> Result<(), CartError> {
    if (1..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(CartError::InvalidQuantity(quantity))
    }
}
