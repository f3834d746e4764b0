//! # Shop engine public API
//!
//! The `shop_api` module exposes the programmatic API for the shop engine. The API is modular, so that clients can
//! pick the parts they need.
//!
//! * [`cart_api`] loads, mutates and saves per-owner carts, and checks them against the stock ledger.
//! * [`reconciliation_api`] is the primary API for turning carts into orders and for applying payment provider
//!   webhooks to those orders.
//! * [`order_flow_api`] drives the order state machine on behalf of customers and admins.
//! * [`order_query_api`] provides the read side: order searches, statistics and the payment event audit trail.
//!
//! The other submodules are the request and response types, and the error types.
//!
//! # API usage
//!
//! Every API is created by supplying a database backend that implements the backend traits the API needs.
//!
//! ```rust,ignore
//! use shop_engine::{OrderQueryApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/shop.db", 5).await?;
//! let api = OrderQueryApi::new(db);
//! let page = api.orders_for_owner(&"alice".into(), None, 1, 20).await?;
//! ```
pub mod cart_api;
pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
pub mod order_query_api;
pub mod payment_objects;
pub mod reconciliation_api;
