//! # Backend contracts
//!
//! This module defines the behaviour a storage backend must expose so that the shop engine APIs can run on top of it.
//! The APIs in [`crate::shop_api`] are generic over these traits, and [`crate::SqliteDatabase`] is the bundled
//! implementation.
//!
//! * [`ProductCatalog`] is the stock ledger. Stock decrements are conditional and atomic.
//! * [`CartManagement`] stores carts, one per owner, with compare-and-swap writes.
//! * [`OrderManagement`] stores orders and serves the read queries.
//! * [`PaymentEventManagement`] is the append-mostly payment event log.
//! * [`ShopDatabase`] ties them together and adds the multi-record operations that must run in a single transaction:
//!   checkout, cancellation with restock, and committing a reconciled payment event.
mod cart_management;
mod data_objects;
mod order_management;
mod payment_event_management;
mod product_catalog;
mod shop_database;

pub use cart_management::CartManagement;
pub use data_objects::{
    OrderQueryFilter,
    OrderStatistics,
    Page,
    Pagination,
    SortOrder,
    StockShortfall,
    StockValidation,
    MAX_PAGE_SIZE,
};
pub use order_management::OrderManagement;
pub use payment_event_management::PaymentEventManagement;
pub use product_catalog::ProductCatalog;
pub use shop_database::{ShopDatabase, StoreError};
