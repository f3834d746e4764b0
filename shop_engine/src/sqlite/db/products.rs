use chrono::{DateTime, Utc};
use log::*;
use shop_common::Quantity;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewProduct, Product, ProductId},
    traits::StoreError,
};

pub async fn upsert_product(
    product: NewProduct,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Product, StoreError> {
    let product = sqlx::query_as(
        r#"
            INSERT INTO products (id, name, price_minor, stock, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                price_minor = excluded.price_minor,
                stock = excluded.stock,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(product.id)
    .bind(product.name)
    .bind(product.price_minor)
    .bind(product.stock)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

pub async fn fetch_product(id: &ProductId, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    Ok(product)
}

pub async fn fetch_products(ids: &[ProductId], conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new("SELECT * FROM products WHERE id IN (");
    let mut list = builder.separated(", ");
    for id in ids {
        list.push_bind(id.as_str());
    }
    builder.push(") ORDER BY id");
    let products = builder.build_query_as::<Product>().fetch_all(conn).await?;
    Ok(products)
}

pub async fn fetch_stock(id: &ProductId, conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    let stock =
        sqlx::query_scalar("SELECT stock FROM products WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    Ok(stock)
}

/// Conditionally decrements the stock. The `stock >= quantity` guard and the decrement are one statement, so two
/// concurrent checkouts can never both take the last unit.
pub async fn decrement_stock(
    id: &ProductId,
    quantity: Quantity,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let quantity = i64::from(quantity);
    let result =
        sqlx::query("UPDATE products SET stock = stock - $1, updated_at = $2 WHERE id = $3 AND stock >= $1")
            .bind(quantity)
            .bind(now)
            .bind(id.as_str())
            .execute(conn)
            .await?;
    let ok = result.rows_affected() == 1;
    trace!("🗃️ Decrement of {id} by {quantity}: {}", if ok { "done" } else { "not enough stock" });
    Ok(ok)
}

pub async fn restock(
    id: &ProductId,
    quantity: Quantity,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Product, StoreError> {
    let product: Option<Product> =
        sqlx::query_as("UPDATE products SET stock = stock + $1, updated_at = $2 WHERE id = $3 RETURNING *")
            .bind(i64::from(quantity))
            .bind(now)
            .bind(id.as_str())
            .fetch_optional(conn)
            .await?;
    let product = product.ok_or_else(|| StoreError::ProductNotFound(id.clone()))?;
    trace!("🗃️ Restocked {quantity} x {id}. Stock is now {}", product.stock);
    Ok(product)
}
