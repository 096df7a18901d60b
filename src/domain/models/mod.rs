//! # Domain Models
//!
//! Request-scoped values that are not persisted. Entities live in
//! [`crate::domain::entities`], wire shapes in [`crate::domain::dto`].

pub mod auth;

pub use auth::{AuthenticatedUser, ClientKind, ClientRegistry};
