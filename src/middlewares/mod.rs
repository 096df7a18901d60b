//! # Middlewares
//!
//! [`AuthMiddleware`] guards route scopes by client application; the
//! rest of the stack (CORS, rate limiting, access log, path
//! normalisation) is assembled in `main`.

pub mod auth_middleware;
mod auth_inner;

pub use auth_middleware::{AuthMiddleware, CLIENT_ID_HEADER};
