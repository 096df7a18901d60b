//! Orders and their payment lifecycle.

pub mod order_service;

pub use order_service::OrderService;
