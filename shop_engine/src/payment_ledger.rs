//! Rules for the payment event log.
//!
//! A payment event is only ever mutated to record the outcome of a dispatch attempt. `processed` and `error_message`
//! are mutually exclusive, and `retry_count` only grows.
use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    db_types::{NewPaymentEvent, PaymentEvent},
    shop_api::errors::PaymentEventError,
};

/// Largest serialized size of the `meta` document, in bytes.
pub const MAX_META_BYTES: usize = 10_240;
/// Error messages longer than this are truncated before they are stored.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 1_000;
/// Events that have been retried this many times are no longer picked up by the retry sweep.
pub const SOFT_RETRY_LIMIT: i64 = 5;
/// Hard ceiling on `retry_count`.
pub const HARD_RETRY_LIMIT: i64 = 10;
/// How old an event with no recorded outcome must be before the retry sweep takes it over.
pub const DEFAULT_STRANDED_EVENT_GRACE: Duration = Duration::minutes(1);

impl NewPaymentEvent {
    pub fn validate(&self) -> Result<(), PaymentEventError> {
        let size = serde_json::to_vec(&self.meta).map_err(|e| PaymentEventError::InvalidPayload(e.to_string()))?.len();
        if size > MAX_META_BYTES {
            return Err(PaymentEventError::PayloadTooLarge { size, limit: MAX_META_BYTES });
        }
        if self.provider.trim().is_empty() || self.external_id.trim().is_empty() {
            return Err(PaymentEventError::InvalidPayload("provider and external id are required".into()));
        }
        if let Some(amount) = self.amount_minor {
            if amount.is_negative() {
                return Err(PaymentEventError::InvalidPayload(format!("Amount cannot be negative ({amount})")));
            }
        }
        Ok(())
    }
}

impl PaymentEvent {
    pub fn mark_as_processed(&mut self, now: DateTime<Utc>) {
        self.processed = true;
        self.processed_at = Some(now);
        self.error_message = None;
    }

    /// Records a failed dispatch. The retry counter is left alone; [`Self::increment_retry`] is called by the retry
    /// sweep before each new attempt.
    pub fn mark_as_failed(&mut self, message: &str) {
        self.processed = false;
        self.processed_at = None;
        let truncated = message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect::<String>();
        if truncated.len() < message.len() {
            debug!("💳️ Error message for event {} truncated to {MAX_ERROR_MESSAGE_CHARS} characters", self.id);
        }
        self.error_message = Some(truncated);
    }

    pub fn increment_retry(&mut self) -> Result<(), PaymentEventError> {
        if self.retry_count >= HARD_RETRY_LIMIT {
            return Err(PaymentEventError::RetryLimitExceeded { event_id: self.id, retries: self.retry_count });
        }
        self.retry_count += 1;
        Ok(())
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < SOFT_RETRY_LIMIT && !self.processed && self.error_message.is_some()
    }

    /// An unprocessed event with no recorded outcome that is older than `grace`. Its dispatch was cut short before
    /// the outcome could be saved.
    pub fn is_stranded(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        !self.processed &&
            self.error_message.is_none() &&
            self.retry_count < SOFT_RETRY_LIMIT &&
            self.created_at + grace <= now
    }

    /// Unprocessed events that have exhausted their automatic retries, and need manual attention.
    pub fn is_abandoned(&self) -> bool {
        !self.processed && self.retry_count >= SOFT_RETRY_LIMIT
    }
}
