//! Payments (Stripe Connect).
//!
//! Health units are Express connected accounts; customers pay through
//! destination charges, so the marketplace keeps the application fee and
//! Stripe transfers the rest to the health unit.

pub mod stripe;
pub mod webhook;

pub use stripe::StripePaymentProvider;
pub use webhook::{StripeEvent, WebhookEvent, WebhookVerifier};

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::errors::AppResult;

/// Destination charge for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    /// Stripe customer id.
    pub customer: Option<String>,
    /// Connected account receiving the funds.
    pub destination: String,
    pub application_fee: i64,
    pub order_id: String,
    /// Repeating a request with the same key returns the first intent.
    pub idempotency_key: String,
}

impl PaymentRequest {
    /// `percent` of `amount`, rounded half up.
    pub fn application_fee_for(amount: i64, percent: u32) -> i64 {
        (amount * percent as i64 + 50) / 100
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub status: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates an Express account and returns its id.
    async fn create_connected_account(&self, email: &str, business_type: &str) -> AppResult<String>;

    /// Onboarding URL for `account`.
    async fn create_account_link(&self, account: &str) -> AppResult<String>;

    async fn delete_connected_account(&self, account: &str) -> AppResult<()>;

    /// Creates a customer and returns its id.
    async fn create_customer(&self, email: &str, name: &str) -> AppResult<String>;

    async fn create_payment_intent(&self, request: PaymentRequest) -> AppResult<PaymentIntent>;

    async fn cancel_payment_intent(&self, id: &str) -> AppResult<()>;

    /// Checks the `Stripe-Signature` header and decodes the event.
    /// `now` is in Unix seconds.
    fn verify_webhook(&self, payload: &[u8], signature: &str, now: i64) -> AppResult<WebhookEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_fee_rounds_half_up() {
        assert_eq!(PaymentRequest::application_fee_for(10_000, 10), 1_000);
        assert_eq!(PaymentRequest::application_fee_for(4_555, 10), 456);
        assert_eq!(PaymentRequest::application_fee_for(4_554, 10), 455);
        assert_eq!(PaymentRequest::application_fee_for(5_000, 0), 0);
    }
}
