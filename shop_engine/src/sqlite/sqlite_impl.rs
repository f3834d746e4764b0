//! `SqliteDatabase` is a concrete implementation of a shop engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use shop_common::Quantity;
use sqlx::SqlitePool;

use super::db::{carts, new_pool, orders, payment_events, products, run_migrations};
use crate::{
    config::EngineConfig,
    db_types::{
        Cart,
        NewOrder,
        NewPaymentEvent,
        NewProduct,
        Order,
        OrderId,
        OrderNumber,
        OwnerId,
        PaymentEvent,
        Product,
        ProductId,
    },
    traits::{
        CartManagement,
        OrderManagement,
        OrderQueryFilter,
        OrderStatistics,
        Page,
        PaymentEventManagement,
        ProductCatalog,
        ShopDatabase,
        StockShortfall,
        StoreError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl ShopDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn checkout(&self, order: NewOrder, cart: &Cart) -> Result<Order, StoreError> {
        let now = order.created_at;
        let reservations: Vec<(ProductId, Quantity)> =
            order.lines.iter().map(|l| (l.product_id.clone(), l.quantity)).collect();
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        trace!("🗃️ Order {} inserted with id {}. Reserving stock.", order.order_number, order.id);
        let mut failed = Vec::new();
        for (product_id, quantity) in &reservations {
            if !products::decrement_stock(product_id, *quantity, now, &mut tx).await? {
                failed.push((product_id.clone(), *quantity));
            }
        }
        if !failed.is_empty() {
            tx.rollback().await?;
            info!("🗃️ Checkout for {} rolled back. {} line(s) could not be reserved", order.owner_id, failed.len());
            let mut conn = self.pool.acquire().await?;
            let mut shortfalls = Vec::with_capacity(failed.len());
            for (product_id, quantity) in failed {
                let available = products::fetch_stock(&product_id, &mut conn).await?.unwrap_or(0);
                shortfalls.push(StockShortfall::new(product_id, i64::from(quantity), available));
            }
            return Err(StoreError::InsufficientStock(shortfalls));
        }
        if cart.is_persisted() {
            let mut emptied = cart.clone();
            emptied.clear(now);
            carts::update_cart(&emptied, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ Checkout complete. Order {} for {} saved", order.order_number, order.owner_id);
        Ok(order)
    }

    async fn cancel_order(&self, order: &Order) -> Result<Order, StoreError> {
        let now = order.cancelled_at.unwrap_or(order.updated_at);
        let mut tx = self.pool.begin().await?;
        let updated = orders::update_order(order, &mut tx).await?;
        for line in &updated.lines {
            products::restock(&line.product_id, line.quantity, now, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ Order {} cancelled and {} line(s) returned to stock", updated.order_number, updated.lines.len());
        Ok(updated)
    }

    async fn commit_reconciliation(
        &self,
        order: Option<&Order>,
        event: &PaymentEvent,
    ) -> Result<(Option<Order>, PaymentEvent), StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = match order {
            Some(order) => Some(orders::update_order(order, &mut tx).await?),
            None => None,
        };
        let event = payment_events::update_payment_event(event, &mut tx).await?;
        tx.commit().await?;
        trace!("🗃️ Payment event {} committed (processed: {})", event.id, event.processed);
        Ok((order, event))
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl ProductCatalog for SqliteDatabase {
    async fn upsert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::upsert_product(product, Utc::now(), &mut conn).await?;
        debug!("🗃️ Product {} saved with stock {}", product.id, product.stock);
        Ok(product)
    }

    async fn fetch_product(&self, product_id: &ProductId) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::fetch_products(product_ids, &mut conn).await?;
        Ok(products)
    }

    async fn get_stock(&self, product_id: &ProductId) -> Result<i64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_stock(product_id, &mut conn).await?.ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))
    }

    async fn decrement_stock(&self, product_id: &ProductId, quantity: Quantity) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let ok = products::decrement_stock(product_id, quantity, Utc::now(), &mut conn).await?;
        Ok(ok)
    }

    async fn restock(&self, product_id: &ProductId, quantity: Quantity) -> Result<Product, StoreError> {
        let mut conn = self.pool.acquire().await?;
        products::restock(product_id, quantity, Utc::now(), &mut conn).await
    }
}

impl CartManagement for SqliteDatabase {
    async fn fetch_cart(&self, owner_id: &OwnerId) -> Result<Option<Cart>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let cart = carts::fetch_cart(owner_id, &mut conn).await?;
        Ok(cart)
    }

    async fn save_cart(&self, cart: &Cart) -> Result<Cart, StoreError> {
        let mut conn = self.pool.acquire().await?;
        if cart.is_persisted() {
            carts::update_cart(cart, &mut conn).await
        } else {
            carts::insert_cart(cart, &mut conn).await
        }
    }

    async fn sweep_empty_carts(&self, older_than: chrono::DateTime<Utc>) -> Result<u64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let removed = carts::sweep_empty_carts(older_than, &mut conn).await?;
        if removed > 0 {
            info!("🗃️ Swept {removed} empty cart(s) last touched before {older_than}");
        }
        Ok(removed)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(order_number, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_payment_ref(payment_ref, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Page<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let page = orders::search_orders(&filter, &mut conn).await?;
        Ok(page)
    }

    async fn update_order(&self, order: &Order) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order(order, &mut conn).await
    }

    async fn order_statistics(&self, owner_id: Option<&OwnerId>) -> Result<OrderStatistics, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let stats = orders::order_statistics(owner_id, &mut conn).await?;
        Ok(stats)
    }
}

impl PaymentEventManagement for SqliteDatabase {
    async fn insert_payment_event(&self, event: NewPaymentEvent) -> Result<PaymentEvent, StoreError> {
        let mut conn = self.pool.acquire().await?;
        payment_events::insert_payment_event(event, &mut conn).await
    }

    async fn fetch_payment_event(&self, id: i64) -> Result<Option<PaymentEvent>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let event = payment_events::fetch_payment_event(id, &mut conn).await?;
        Ok(event)
    }

    async fn update_payment_event(&self, event: &PaymentEvent) -> Result<PaymentEvent, StoreError> {
        let mut conn = self.pool.acquire().await?;
        payment_events::update_payment_event(event, &mut conn).await
    }

    async fn fetch_unprocessed_events(&self, retry_limit: i64) -> Result<Vec<PaymentEvent>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let events = payment_events::fetch_unprocessed_events(retry_limit, &mut conn).await?;
        Ok(events)
    }

    async fn fetch_abandoned_events(&self, retry_limit: i64) -> Result<Vec<PaymentEvent>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let events = payment_events::fetch_abandoned_events(retry_limit, &mut conn).await?;
        Ok(events)
    }

    async fn fetch_events_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentEvent>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let events = payment_events::fetch_events_for_order(order_id, &mut conn).await?;
        Ok(events)
    }
}

impl SqliteDatabase {
    /// Connects to the database named in the configuration.
    pub async fn from_config(config: &EngineConfig) -> Result<Self, sqlx::Error> {
        SqliteDatabase::new_with_url(&config.database_url, config.max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        run_migrations(&self.pool).await
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
