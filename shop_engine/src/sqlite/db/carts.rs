use chrono::{DateTime, Utc};
use log::*;
use sqlx::{types::Json, SqliteConnection};

use super::is_unique_violation;
use crate::{
    db_types::{Cart, OwnerId},
    traits::StoreError,
};

pub async fn fetch_cart(owner_id: &OwnerId, conn: &mut SqliteConnection) -> Result<Option<Cart>, sqlx::Error> {
    let cart =
        sqlx::query_as("SELECT * FROM carts WHERE owner_id = $1").bind(owner_id.as_str()).fetch_optional(conn).await?;
    Ok(cart)
}

/// Inserts a cart that has never been saved. If another writer created the owner's cart first, this fails with
/// `VersionConflict`.
pub async fn insert_cart(cart: &Cart, conn: &mut SqliteConnection) -> Result<Cart, StoreError> {
    let result: Result<Cart, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO carts (owner_id, lines, created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, 1)
            RETURNING *;
        "#,
    )
    .bind(cart.owner_id.as_str())
    .bind(Json(cart.lines().to_vec()))
    .bind(cart.created_at)
    .bind(cart.updated_at)
    .fetch_one(conn)
    .await;
    match result {
        Ok(cart) => Ok(cart),
        Err(e) if is_unique_violation(&e) => {
            debug!("🗃️ Cart for {} was created concurrently", cart.owner_id);
            Err(StoreError::VersionConflict { entity: "Cart", id: cart.owner_id.to_string(), expected: 0 })
        },
        Err(e) => Err(e.into()),
    }
}

/// Overwrites the cart's lines if, and only if, the stored version equals `cart.version`.
pub async fn update_cart(cart: &Cart, conn: &mut SqliteConnection) -> Result<Cart, StoreError> {
    let updated: Option<Cart> = sqlx::query_as(
        r#"
            UPDATE carts SET lines = $1, updated_at = $2, version = version + 1
            WHERE owner_id = $3 AND version = $4
            RETURNING *;
        "#,
    )
    .bind(Json(cart.lines().to_vec()))
    .bind(cart.updated_at)
    .bind(cart.owner_id.as_str())
    .bind(cart.version)
    .fetch_optional(conn)
    .await?;
    updated.ok_or_else(|| StoreError::VersionConflict {
        entity: "Cart",
        id: cart.owner_id.to_string(),
        expected: cart.version,
    })
}

pub async fn sweep_empty_carts(older_than: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM carts WHERE lines = '[]' AND updated_at < $1").bind(older_than).execute(conn).await?;
    Ok(result.rows_affected())
}
