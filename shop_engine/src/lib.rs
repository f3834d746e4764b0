//! Shop Engine
//!
//! The shop engine owns the order lifecycle of an online shop: carts, checkout with stock reservation, the order
//! state machine and the reconciliation of payment provider notifications against orders. It is provider-agnostic;
//! the embedding application supplies authentication and the webhook transport.
//!
//! The library is divided into three main sections:
//! 1. The domain rules ([`mod@cart_rules`], [`mod@order_lifecycle`], [`mod@payment_ledger`]). These are pure
//!    in-memory operations on the types in [`mod@db_types`] and take the current time as an argument.
//! 2. Storage. The [`mod@traits`] module defines what a backend must provide, and [`SqliteDatabase`] is the bundled
//!    SQLite implementation. You should never need to access the database directly.
//! 3. The public API ([`mod@shop_api`]). Each API is generic over the backend traits it needs.
//!
//! The engine also emits events that can be subscribed to, for example when an order changes status. See
//! [`mod@events`] for how to register hooks.
pub mod cart_rules;
pub mod config;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod order_lifecycle;
pub mod payment_ledger;
pub mod shop_api;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::EngineConfig;
pub use order_lifecycle::StatusContext;
pub use shop_api::{
    cart_api::CartApi,
    errors::{CartError, OrderError, PaymentEventError, ReconciliationError},
    order_flow_api::OrderFlowApi,
    order_objects,
    order_query_api::OrderQueryApi,
    payment_objects,
    reconciliation_api::ReconciliationApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    CartManagement,
    OrderManagement,
    PaymentEventManagement,
    ProductCatalog,
    ShopDatabase,
    StoreError,
};
