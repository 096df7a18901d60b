//! # Core Module
//!
//! Cross-cutting building blocks shared by every layer.
//!
//! - [`errors`] - `AppError`, the four-kind `ErrorKind` taxonomy and the
//!   HTTP error envelope
//! - [`taxonomy`] - static tables translating storage faults and provider
//!   codes into `ErrorKind`
//!
//! Repositories and adapters are plain values constructed in `main` and
//! shared through `actix_web::web::Data`; there is no global registry.

pub mod errors;
pub mod taxonomy;

pub use errors::*;
