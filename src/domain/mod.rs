//! # Domain Layer
//!
//! - [`entities`] - persisted documents and their validation rules
//! - [`dto`] - request bodies, query strings and response envelopes
//! - [`models`] - caller identity and client applications

pub mod dto;
pub mod entities;
pub mod models;

pub use entities::*;
pub use models::*;
