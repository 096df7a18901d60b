//! Server, database and repository settings.
//!
//! Every value is read from the environment on demand; defaults are safe
//! for local development only.

use std::env;

use crate::repositories::DeletionPolicy;

/// Runtime environment.
#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl Environment {
    /// Reads `ENVIRONMENT`, defaulting to `Production`.
    pub fn current() -> Self {
        Self::from_str(&env::var("ENVIRONMENT").unwrap_or_else(|_| "production".to_string()))
    }

    /// Parses an environment name, case-insensitively. Unknown names are `Production`.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" | "testing" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Production,
        }
    }

    pub fn is_production(&self) -> bool {
        *self == Environment::Production
    }
}

/// Server binding.
pub struct ServerConfig;

impl ServerConfig {
    /// `PORT`, default 8080.
    pub fn port() -> u16 {
        env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080)
    }

    /// `HOST`, default `0.0.0.0`.
    pub fn host() -> String {
        env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string())
    }
}

/// MongoDB connection settings.
pub struct DatabaseConfig;

impl DatabaseConfig {
    pub fn uri() -> String {
        env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
    }

    pub fn name() -> String {
        env::var("DATABASE_NAME").unwrap_or_else(|_| "care_marketplace_dev".to_string())
    }

    /// Reported to the server in the handshake.
    pub fn app_name() -> String {
        "care_marketplace".to_string()
    }
}

/// Behaviour shared by every repository.
pub struct RepositoryConfig;

impl RepositoryConfig {
    pub const DEFAULT_MAX_PAGE_SIZE: i64 = 1000;

    /// `REPOSITORY_DELETION_POLICY` (`hard` | `tombstone`), default `hard`.
    pub fn deletion_policy() -> DeletionPolicy {
        Self::deletion_policy_from(
            &env::var("REPOSITORY_DELETION_POLICY").unwrap_or_default(),
            &Self::tombstone_collection(),
        )
    }

    pub fn deletion_policy_from(policy: &str, tombstone_collection: &str) -> DeletionPolicy {
        match policy.trim().to_lowercase().as_str() {
            "tombstone" | "soft" => DeletionPolicy::Tombstone {
                collection: tombstone_collection.to_string(),
            },
            _ => DeletionPolicy::Hard,
        }
    }

    /// `REPOSITORY_TOMBSTONE_COLLECTION`, default `deletions`.
    pub fn tombstone_collection() -> String {
        env::var("REPOSITORY_TOMBSTONE_COLLECTION").unwrap_or_else(|_| "deletions".to_string())
    }

    /// Upper bound applied to list queries that ask for no page size.
    pub fn max_page_size() -> i64 {
        env::var("REPOSITORY_MAX_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(Self::DEFAULT_MAX_PAGE_SIZE)
    }
}

/// Request rate limiting (actix-governor).
pub struct RateLimitConfig;

impl RateLimitConfig {
    pub fn per_second() -> u64 {
        env::var("RATE_LIMIT_PER_SECOND")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100)
    }

    pub fn burst_size() -> u32 {
        env::var("RATE_LIMIT_BURST_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(200)
    }
}

/// CORS origins.
pub struct CorsConfig;

impl CorsConfig {
    /// Comma-separated `CORS_ALLOWED_ORIGINS`.
    pub fn allowed_origins() -> Vec<String> {
        Self::parse_origins(&env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| {
            "http://localhost:3000,http://localhost:3001,http://localhost:3002".to_string()
        }))
    }

    pub fn parse_origins(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }
}
