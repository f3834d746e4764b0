//! Primitive types shared across the shop workspace.
//!
//! Every monetary value in the system is an integer count of currency *minor units* (e.g. cents). There is no
//! floating point anywhere in the calculation path; conversion to major units only happens when a [`Money`] value
//! is displayed.
mod money;

pub mod op;

pub use money::{
    line_subtotal,
    sum,
    CurrencyCode,
    MinorUnits,
    Money,
    MoneyError,
    Quantity,
    MAX_LINE_QUANTITY,
};
