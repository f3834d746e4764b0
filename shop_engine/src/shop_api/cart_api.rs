//! Unified API for customer carts.
//!
//! Every mutation loads the owner's cart (or starts a new one), applies the change in memory and saves it with a
//! compare-and-swap on the cart version. If someone else saved the cart in the meantime the call fails with
//! [`StoreError::VersionConflict`](crate::traits::StoreError::VersionConflict) and nothing is written.
use std::{collections::HashMap, fmt::Debug};

use chrono::{Duration, Utc};
use log::*;
use shop_common::Quantity;

use crate::{
    db_types::{Cart, OwnerId, ProductId},
    shop_api::errors::CartError,
    traits::{CartManagement, ProductCatalog, StockValidation},
};

pub struct CartApi<B> {
    db: B,
}

impl<B: Debug> Debug for CartApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CartApi ({:?})", self.db)
    }
}

impl<B> CartApi<B>
where B: ProductCatalog + CartManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// The owner's cart. An owner that has never added anything gets an empty, unsaved cart.
    pub async fn cart(&self, owner_id: &OwnerId) -> Result<Cart, CartError> {
        let cart = self.db.fetch_cart(owner_id).await?;
        Ok(cart.unwrap_or_else(|| Cart::new(owner_id.clone(), Utc::now())))
    }

    /// Adds a product at its current catalog price.
    pub async fn add_item(&self, owner_id: &OwnerId, product_id: &ProductId, quantity: Quantity) -> Result<Cart, CartError> {
        let product =
            self.db.fetch_product(product_id).await?.ok_or_else(|| CartError::ProductNotFound(product_id.clone()))?;
        let mut cart = self.cart(owner_id).await?;
        cart.add_item(product.id, quantity, product.price_minor, Utc::now())?;
        let cart = self.db.save_cart(&cart).await?;
        debug!("🛒️ {quantity} x {product_id} added to the cart of {owner_id}");
        Ok(cart)
    }

    pub async fn update_quantity(
        &self,
        owner_id: &OwnerId,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<Cart, CartError> {
        let mut cart = self.cart(owner_id).await?;
        cart.update_quantity(product_id, quantity, Utc::now())?;
        let cart = self.db.save_cart(&cart).await?;
        debug!("🛒️ Quantity of {product_id} in the cart of {owner_id} set to {quantity}");
        Ok(cart)
    }

    pub async fn remove_item(&self, owner_id: &OwnerId, product_id: &ProductId) -> Result<Cart, CartError> {
        let mut cart = self.cart(owner_id).await?;
        cart.remove_item(product_id, Utc::now())?;
        let cart = self.db.save_cart(&cart).await?;
        debug!("🛒️ {product_id} removed from the cart of {owner_id}");
        Ok(cart)
    }

    pub async fn clear(&self, owner_id: &OwnerId) -> Result<Cart, CartError> {
        let mut cart = self.cart(owner_id).await?;
        cart.clear(Utc::now());
        let cart = self.db.save_cart(&cart).await?;
        debug!("🛒️ Cart of {owner_id} cleared");
        Ok(cart)
    }

    /// Compares each line of the owner's cart with the current stock. Nothing is reserved or changed.
    pub async fn validate_stock_availability(&self, owner_id: &OwnerId) -> Result<StockValidation, CartError> {
        let cart = self.cart(owner_id).await?;
        let ids = cart.lines().iter().map(|l| l.product_id().clone()).collect::<Vec<_>>();
        let stock = self.db.fetch_products(&ids).await?.into_iter().map(|p| (p.id, p.stock)).collect::<HashMap<_, _>>();
        let validation = cart.stock_validation(&stock);
        if !validation.is_valid {
            info!("🛒️ The cart of {owner_id} has {} line(s) that cannot be fulfilled", validation.shortfalls.len());
        }
        Ok(validation)
    }

    /// Deletes carts that are empty and have not been touched for `older_than`.
    pub async fn sweep_empty_carts(&self, older_than: Duration) -> Result<u64, CartError> {
        let cutoff = Utc::now() - older_than;
        let removed = self.db.sweep_empty_carts(cutoff).await?;
        Ok(removed)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
