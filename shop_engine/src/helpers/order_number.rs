//! # Order numbers
//!
//! Order numbers are the customer-facing order reference, formatted as
//!
//! ```text
//!    ORD-{YYYYMMDD}-{XXXXXXXX}
//! ```
//!
//! where the date is the UTC creation date and the suffix is eight random uppercase alphanumeric characters.
//! Uniqueness is not checked here; the store's unique index rejects collisions, and checkout retries with a fresh
//! number.
use chrono::{DateTime, Utc};
use rand::{distributions::Uniform, Rng};

use crate::db_types::OrderNumber;

pub const ORDER_NUMBER_PREFIX: &str = "ORD";
pub const ORDER_NUMBER_SUFFIX_LEN: usize = 8;
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn generate_order_number(now: DateTime<Utc>) -> OrderNumber {
    generate_order_number_with(&mut rand::thread_rng(), now)
}

pub fn generate_order_number_with<R: Rng>(rng: &mut R, now: DateTime<Utc>) -> OrderNumber {
    let dist = Uniform::from(0..ALPHABET.len());
    let suffix: String = (0..ORDER_NUMBER_SUFFIX_LEN).map(|_| ALPHABET[rng.sample(dist)] as char).collect();
    OrderNumber(format!("{ORDER_NUMBER_PREFIX}-{}-{suffix}", now.format("%Y%m%d")))
}
