mod order_number;

pub use order_number::{generate_order_number, generate_order_number_with, ORDER_NUMBER_PREFIX};
