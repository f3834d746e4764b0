use shop_common::Quantity;

use crate::{
    db_types::{NewProduct, Product, ProductId},
    traits::StoreError,
};

/// The stock ledger.
#[allow(async_fn_in_trait)]
pub trait ProductCatalog {
    /// Inserts the product, or replaces its name, price and stock level if it already exists.
    async fn upsert_product(&self, product: NewProduct) -> Result<Product, StoreError>;

    async fn fetch_product(&self, product_id: &ProductId) -> Result<Option<Product>, StoreError>;

    /// Fetches several products at once. Unknown ids are silently skipped.
    async fn fetch_products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    /// The currently available quantity. Fails with `ProductNotFound` for unknown products.
    async fn get_stock(&self, product_id: &ProductId) -> Result<i64, StoreError>;

    /// Decrements the stock by `quantity`, but only if at least that many units are available.
    /// Returns `false`, leaving the stock untouched, otherwise.
    async fn decrement_stock(&self, product_id: &ProductId, quantity: Quantity) -> Result<bool, StoreError>;

    /// Returns `quantity` units to stock.
    async fn restock(&self, product_id: &ProductId, quantity: Quantity) -> Result<Product, StoreError>;
}
