//! # Provider Configuration
//!
//! Credentials and endpoints for the external collaborators: AWS Cognito
//! and SES, Stripe, Vendus, plus the frontend URL used in Stripe
//! onboarding links.
//!
//! Required values return [`AppResult`] so `main` can log the missing
//! variable and exit instead of panicking deep inside a handler.
//!
//! ```bash
//! export AWS_REGION="eu-west-1"
//! export COGNITO_USER_POOL_ID="eu-west-1_AbCdEf123"
//! export ADMIN_CLIENT_ID="..."
//! export BUSINESS_CLIENT_ID="..."
//! export MARKETPLACE_CLIENT_ID="..."
//! export SES_FROM_ADDRESS="no-reply@example.pt"
//! export STRIPE_SECRET_KEY="sk_test_..."
//! export STRIPE_WEBHOOK_SECRET="whsec_..."
//! export VENDUS_API_KEY="..."
//! ```

use std::env;

use crate::core::errors::{AppError, AppResult};

fn required(name: &str) -> AppResult<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::InternalError(format!("{} must be set", name)))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub struct AwsConfig;

impl AwsConfig {
    /// `AWS_REGION`, default `eu-west-1`.
    pub fn region() -> String {
        optional("AWS_REGION").unwrap_or_else(|| "eu-west-1".to_string())
    }

    /// Shared SDK configuration (credentials chain + region) for the
    /// Cognito and SES clients.
    pub async fn load() -> aws_config::SdkConfig {
        aws_config::from_env()
            .region(aws_config::Region::new(Self::region()))
            .load()
            .await
    }
}

/// Cognito user pool and app clients.
pub struct CognitoConfig;

impl CognitoConfig {
    pub fn user_pool_id() -> AppResult<String> {
        required("COGNITO_USER_POOL_ID")
    }

    /// Token issuer for the configured pool.
    pub fn issuer() -> AppResult<String> {
        Ok(Self::issuer_for(&AwsConfig::region(), &Self::user_pool_id()?))
    }

    pub fn issuer_for(region: &str, user_pool_id: &str) -> String {
        format!("https://cognito-idp.{}.amazonaws.com/{}", region, user_pool_id)
    }

    pub fn jwks_url() -> AppResult<String> {
        Ok(format!("{}/.well-known/jwks.json", Self::issuer()?))
    }

    pub fn admin_client_id() -> Option<String> {
        optional("ADMIN_CLIENT_ID")
    }

    pub fn business_client_id() -> Option<String> {
        optional("BUSINESS_CLIENT_ID")
    }

    pub fn marketplace_client_id() -> Option<String> {
        optional("MARKETPLACE_CLIENT_ID")
    }
}

pub struct SesConfig;

impl SesConfig {
    pub fn from_address() -> AppResult<String> {
        required("SES_FROM_ADDRESS")
    }
}

pub struct StripeConfig;

impl StripeConfig {
    pub const DEFAULT_FEE_PERCENT: u32 = 10;

    pub fn secret_key() -> AppResult<String> {
        required("STRIPE_SECRET_KEY")
    }

    pub fn webhook_secret() -> AppResult<String> {
        required("STRIPE_WEBHOOK_SECRET")
    }

    pub fn api_base() -> String {
        optional("STRIPE_API_BASE").unwrap_or_else(|| "https://api.stripe.com".to_string())
    }

    /// Marketplace application fee, 0-100.
    pub fn fee_percent() -> u32 {
        optional("MARKETPLACE_FEE_PERCENT")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v <= 100)
            .unwrap_or(Self::DEFAULT_FEE_PERCENT)
    }
}

pub struct VendusConfig;

impl VendusConfig {
    pub fn api_key() -> AppResult<String> {
        required("VENDUS_API_KEY")
    }

    pub fn api_base() -> String {
        optional("VENDUS_API_BASE").unwrap_or_else(|| "https://www.vendus.pt/ws/v1.1".to_string())
    }
}

pub struct FrontendConfig;

impl FrontendConfig {
    pub fn base_url() -> String {
        optional("FRONTEND_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string()
    }
}
