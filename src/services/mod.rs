//! Business services and provider adapters.
//!
//! Services take their collaborators as constructor arguments and are shared
//! with handlers through `web::Data`. Provider adapters sit behind traits so
//! tests can substitute mocks.

pub mod auth;
pub mod callers;
pub mod catalog;
pub mod collaborators;
pub mod customers;
pub mod events;
pub mod health_units;
pub mod identity;
pub mod invoicing;
pub mod mail;
pub mod orchestration;
pub mod orders;
pub mod patients;
pub mod payments;
pub mod reviews;
