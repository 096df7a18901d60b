//! Customer reviews and health unit ratings.

pub mod review_service;

pub use review_service::ReviewService;
