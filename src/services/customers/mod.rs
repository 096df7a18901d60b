//! Marketplace customers: sign-up and profile.

pub mod customer_service;

pub use customer_service::CustomerService;
