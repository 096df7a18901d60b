//! Health units: onboarding with Stripe Connect, public listing, profile.

pub mod health_unit_service;

pub use health_unit_service::HealthUnitService;
