//! Care marketplace backend
//!
//! Multi-tenant marketplace connecting customers who need home or
//! residential care with the health units that provide it. Customers
//! register patients and place orders; health units accept them, get paid
//! through Stripe Connect and invoice through Vendus. Identities live in
//! Cognito and notifications go out through SES.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   HTTP Routes   │ ← /api/v1 scopes, AuthMiddleware per client app
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Handlers     │ ← extract, call, wrap in {statusCode, data}
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Services     │ ← orchestration, compensation, provider adapters
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  Repositories   │ ← generic Repository<T>, pages, transaction scopes
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  DocumentStore  │ ← MongoDB, or in memory for tests
//! └─────────────────┘
//! ```

pub mod config;
pub mod core;
pub mod db;
pub mod domain;
pub mod handlers;
pub mod middlewares;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod utils;
