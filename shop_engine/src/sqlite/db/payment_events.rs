use log::*;
use sqlx::{types::Json, SqliteConnection};

use super::is_unique_violation;
use crate::{
    db_types::{NewPaymentEvent, OrderId, PaymentEvent},
    traits::StoreError,
};

/// Appends a payment event. The `(provider, external_id)` unique index is the deduplication mechanism: a replayed
/// event fails with `DuplicateEvent` without any prior lookup.
pub async fn insert_payment_event(
    event: NewPaymentEvent,
    conn: &mut SqliteConnection,
) -> Result<PaymentEvent, StoreError> {
    let provider = event.provider.clone();
    let external_id = event.external_id.clone();
    let result: Result<PaymentEvent, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO payment_events (
                order_id,
                provider,
                event_type,
                external_id,
                amount_minor,
                currency,
                provider_status,
                payment_ref,
                meta,
                processed,
                retry_count,
                created_at,
                version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE, 0, $10, 1)
            RETURNING *;
        "#,
    )
    .bind(event.order_id)
    .bind(event.provider)
    .bind(event.event_type)
    .bind(event.external_id)
    .bind(event.amount_minor)
    .bind(event.currency)
    .bind(event.provider_status)
    .bind(event.payment_ref)
    .bind(Json(event.meta))
    .bind(event.created_at)
    .fetch_one(conn)
    .await;
    match result {
        Ok(event) => {
            debug!("🗃️ Payment event {} [{provider}:{external_id}] recorded", event.id);
            Ok(event)
        },
        Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateEvent { provider, external_id }),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_payment_event(id: i64, conn: &mut SqliteConnection) -> Result<Option<PaymentEvent>, sqlx::Error> {
    let event = sqlx::query_as("SELECT * FROM payment_events WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(event)
}

/// Saves the processing outcome of the event, guarded by its version.
pub async fn update_payment_event(event: &PaymentEvent, conn: &mut SqliteConnection) -> Result<PaymentEvent, StoreError> {
    let updated: Option<PaymentEvent> = sqlx::query_as(
        r#"
            UPDATE payment_events SET
                processed = $1,
                processed_at = $2,
                error_message = $3,
                retry_count = $4,
                version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING *;
        "#,
    )
    .bind(event.processed)
    .bind(event.processed_at)
    .bind(event.error_message.as_deref())
    .bind(event.retry_count)
    .bind(event.id)
    .bind(event.version)
    .fetch_optional(conn)
    .await?;
    updated.ok_or_else(|| StoreError::VersionConflict {
        entity: "PaymentEvent",
        id: event.id.to_string(),
        expected: event.version,
    })
}

pub async fn fetch_unprocessed_events(
    retry_limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentEvent>, sqlx::Error> {
    let events = sqlx::query_as(
        "SELECT * FROM payment_events WHERE processed = FALSE AND retry_count < $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(retry_limit)
    .fetch_all(conn)
    .await?;
    Ok(events)
}

pub async fn fetch_abandoned_events(
    retry_limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentEvent>, sqlx::Error> {
    let events = sqlx::query_as(
        "SELECT * FROM payment_events WHERE processed = FALSE AND retry_count >= $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(retry_limit)
    .fetch_all(conn)
    .await?;
    Ok(events)
}

pub async fn fetch_events_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentEvent>, sqlx::Error> {
    let events = sqlx::query_as("SELECT * FROM payment_events WHERE order_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(events)
}
