use log::*;
use sqlx::{types::Json, QueryBuilder, Sqlite, SqliteConnection};

use super::is_unique_violation;
use crate::{
    db_types::{NewOrder, Order, OrderId, OrderNumber, OrderStatusType, OwnerId},
    traits::{OrderQueryFilter, OrderStatistics, Page, SortOrder, StoreError},
};

/// Inserts a new order into the database using the given connection. This is not atomic. Embed this call inside a
/// transaction when it must succeed or fail together with other writes.
///
/// A clash on `order_number` fails with `DuplicateOrderNumber`.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    let order_number = order.order_number.clone();
    let result: Result<Order, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                owner_id,
                status,
                lines,
                currency,
                subtotal_minor,
                shipping_minor,
                total_minor,
                shipping_address,
                status_history,
                created_at,
                updated_at,
                version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11, 1)
            RETURNING *;
        "#,
    )
    .bind(order.order_number)
    .bind(order.owner_id)
    .bind(OrderStatusType::Pending)
    .bind(Json(order.lines))
    .bind(order.currency)
    .bind(order.subtotal_minor)
    .bind(order.shipping_minor)
    .bind(order.total_minor)
    .bind(Json(order.shipping_address))
    .bind(Json(order.status_history))
    .bind(order.created_at)
    .fetch_one(conn)
    .await;
    match result {
        Ok(order) => Ok(order),
        Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateOrderNumber(order_number.to_string())),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_order(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_number(
    order_number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
        .bind(order_number.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_by_payment_ref(
    payment_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE payment_ref = $1 ORDER BY created_at DESC, id DESC LIMIT 1")
        .bind(payment_ref)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filter: &'a OrderQueryFilter) {
    let mut has_where = false;
    let mut and = |builder: &mut QueryBuilder<'a, Sqlite>| {
        builder.push(if has_where { " AND " } else { " WHERE " });
        has_where = true;
    };
    if let Some(owner_id) = &filter.owner_id {
        and(builder);
        builder.push("owner_id = ").push_bind(owner_id.as_str());
    }
    if let Some(status) = filter.status {
        and(builder);
        builder.push("status = ").push_bind(status);
    }
    if let Some(before) = filter.created_before {
        and(builder);
        builder.push("created_at < ").push_bind(before);
    }
}

/// Fetches orders according to the criteria in the `OrderQueryFilter`.
pub async fn search_orders(filter: &OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Page<Order>, sqlx::Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM orders");
    push_filters(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut builder = QueryBuilder::new("SELECT * FROM orders");
    push_filters(&mut builder, filter);
    builder.push(match filter.sort {
        SortOrder::OldestFirst => " ORDER BY created_at ASC, id ASC",
        SortOrder::NewestFirst => " ORDER BY created_at DESC, id DESC",
    });
    if let Some(p) = filter.pagination {
        builder.push(" LIMIT ").push_bind(i64::from(p.limit));
        builder.push(" OFFSET ").push_bind(p.offset());
    }
    trace!("🗃️ Executing query: {}", builder.sql());
    let items = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {} of {total}", items.len());
    let (page, limit) = match filter.pagination {
        Some(p) => (p.page, p.limit),
        None => (1, u32::try_from(items.len()).unwrap_or(u32::MAX)),
    };
    Ok(Page { items, total, page, limit })
}

/// Writes every mutable column of the order if, and only if, the stored version matches `order.version`.
/// The identity, lines and totals are a snapshot and are never rewritten.
pub async fn update_order(order: &Order, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    let updated: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = $1,
                payment_ref = $2,
                tracking_number = $3,
                carrier = $4,
                status_history = $5,
                updated_at = $6,
                paid_at = $7,
                shipped_at = $8,
                delivered_at = $9,
                cancelled_at = $10,
                version = version + 1
            WHERE id = $11 AND version = $12
            RETURNING *;
        "#,
    )
    .bind(order.status)
    .bind(order.payment_ref.as_deref())
    .bind(order.tracking_number.as_deref())
    .bind(order.carrier.as_deref())
    .bind(Json(order.status_history.clone()))
    .bind(order.updated_at)
    .bind(order.paid_at)
    .bind(order.shipped_at)
    .bind(order.delivered_at)
    .bind(order.cancelled_at)
    .bind(order.id)
    .bind(order.version)
    .fetch_optional(conn)
    .await?;
    let updated = updated.ok_or_else(|| StoreError::VersionConflict {
        entity: "Order",
        id: order.order_number.to_string(),
        expected: order.version,
    })?;
    trace!("🗃️ Order {} saved at version {}", updated.order_number, updated.version);
    Ok(updated)
}

pub async fn order_statistics(
    owner_id: Option<&OwnerId>,
    conn: &mut SqliteConnection,
) -> Result<OrderStatistics, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT status, COUNT(*), COALESCE(SUM(total_minor), 0) FROM orders");
    if let Some(owner_id) = owner_id {
        builder.push(" WHERE owner_id = ").push_bind(owner_id.as_str());
    }
    builder.push(" GROUP BY status");
    let rows: Vec<(OrderStatusType, i64, i64)> = builder.build_query_as().fetch_all(conn).await?;
    Ok(OrderStatistics::from_status_totals(rows))
}
