//! # Configuration Module
//!
//! Environment-driven settings, read once at start-up by `main` and on
//! demand by the adapters.
//!
//! - [`data_config`] - environment, server binding, MongoDB, repository
//!   behaviour, rate limiting, CORS
//! - [`provider_config`] - Cognito, SES, Stripe, Vendus, frontend URL
//!
//! `dotenv` loads the profile file selected by `PROFILE` before any of
//! these are read:
//!
//! | `PROFILE` | File |
//! |-----------|------|
//! | `dev` | `.env.dev` |
//! | `prod` | `.env.prod` |
//! | anything else | `.env` |
//!
//! ```rust,ignore
//! use crate::config::{RepositoryConfig, ServerConfig};
//!
//! let bind = (ServerConfig::host(), ServerConfig::port());
//! let policy = RepositoryConfig::deletion_policy();
//! ```

pub mod data_config;
pub mod provider_config;

pub use data_config::*;
pub use provider_config::*;
