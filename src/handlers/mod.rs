//! # HTTP handlers
//!
//! Thin actix handlers: extract, call one service method, wrap the result
//! in the `{statusCode, data}` envelope. Services arrive as `web::Data`,
//! the caller as [`AuthenticatedUser`](crate::domain::models::auth::AuthenticatedUser)
//! on routes behind [`AuthMiddleware`](crate::middlewares::AuthMiddleware).
//! Errors render through `AppError`'s `ResponseError` impl.

pub mod catalog;
pub mod collaborators;
pub mod customers;
pub mod events;
pub mod health_units;
pub mod orders;
pub mod patients;
pub mod reviews;
pub mod webhooks;
