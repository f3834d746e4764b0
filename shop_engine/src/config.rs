use std::{env, fmt::Display, str::FromStr};

use chrono::Duration;
use log::*;
use shop_common::CurrencyCode;

use crate::{order_lifecycle::DEFAULT_CANCELLATION_WINDOW, payment_ledger::DEFAULT_STRANDED_EVENT_GRACE};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/shop.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 25;
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// The currency every order is priced in.
    pub currency: CurrencyCode,
    /// How long after payment a customer may still cancel without an admin.
    pub cancellation_window: Duration,
    /// When true, a successful payment whose amount or currency differs from the order total is not applied.
    pub verify_amounts: bool,
    /// Channel capacity for each event hook.
    pub event_buffer_size: usize,
    /// How long an event with no recorded outcome is left alone before the retry sweep dispatches it again.
    pub stranded_event_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            currency: CurrencyCode::default(),
            cancellation_window: DEFAULT_CANCELLATION_WINDOW,
            verify_amounts: true,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            stranded_event_grace: DEFAULT_STRANDED_EVENT_GRACE,
        }
    }
}

impl EngineConfig {
    pub fn with_database_url<S: Into<String>>(mut self, url: S) -> Self {
        self.database_url = url.into();
        self
    }

    /// Reads the configuration from `SHOP_*` environment variables. Missing or invalid values are logged, and the
    /// default is used instead.
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let database_url = env::var("SHOP_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ SHOP_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            defaults.database_url.clone()
        });
        let max_connections = parse_var("SHOP_DB_MAX_CONNECTIONS", defaults.max_connections);
        let currency = parse_var("SHOP_CURRENCY", defaults.currency.clone());
        let window_minutes = parse_var("SHOP_CANCEL_WINDOW_MINUTES", defaults.cancellation_window.num_minutes());
        let cancellation_window = if window_minutes < 0 {
            warn!("🪛️ SHOP_CANCEL_WINDOW_MINUTES cannot be negative. Using the default instead.");
            defaults.cancellation_window
        } else {
            Duration::minutes(window_minutes)
        };
        let verify_amounts = parse_flag("SHOP_VERIFY_PAYMENT_AMOUNTS", defaults.verify_amounts);
        if !verify_amounts {
            warn!("🪛️ Payment amount verification is DISABLED. Successful payments will be applied regardless of amount.");
        }
        let event_buffer_size = parse_var("SHOP_EVENT_BUFFER_SIZE", defaults.event_buffer_size).max(1);
        let grace_seconds = parse_var("SHOP_STRANDED_EVENT_GRACE_SECONDS", defaults.stranded_event_grace.num_seconds());
        let stranded_event_grace = Duration::seconds(grace_seconds.max(0));
        Self {
            database_url,
            max_connections,
            currency,
            cancellation_window,
            verify_amounts,
            event_buffer_size,
            stranded_event_grace,
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}

/// Reads a boolean flag. `1/true/yes/on` and `0/false/no/off` are accepted in any case.
fn parse_flag(name: &str, default: bool) -> bool {
    let Ok(value) = env::var(name) else {
        debug!("🪛️ {name} is not set. Using the default, {default}.");
        return default;
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            error!("🪛️ {value} is not a valid flag for {name}. Using the default, {default}, instead.");
            default
        },
    }
}
