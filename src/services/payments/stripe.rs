//! Stripe REST adapter (form-encoded requests over reqwest).

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::webhook::WebhookVerifier;
use super::{PaymentIntent, PaymentProvider, PaymentRequest, WebhookEvent};
use crate::config::{FrontendConfig, StripeConfig};
use crate::core::errors::{AppError, AppResult};
use crate::core::taxonomy::{provider_error, Provider};

#[derive(Debug, Default, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    error: StripeErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct StripeErrorDetail {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AccountLink {
    url: String,
}

/// Maps a non-2xx Stripe answer through the Stripe code table.
async fn stripe_error(operation: &str, response: Response) -> AppError {
    let status = response.status();
    let body: StripeErrorBody = response.json().await.unwrap_or_default();
    let detail = body.error;
    let message = if detail.message.is_empty() {
        format!("{} failed with HTTP {}", operation, status)
    } else {
        format!("{} failed: {}", operation, detail.message)
    };
    provider_error(Provider::Stripe, &[detail.code.as_str(), detail.kind.as_str()], message)
}

pub struct StripePaymentProvider {
    http: Client,
    secret_key: String,
    api_base: String,
    frontend_url: String,
    webhook: WebhookVerifier,
}

impl StripePaymentProvider {
    pub fn new(secret_key: String, webhook_secret: String, api_base: String, frontend_url: String) -> Self {
        Self {
            http: Client::new(),
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            frontend_url,
            webhook: WebhookVerifier::new(webhook_secret),
        }
    }

    pub fn from_env() -> AppResult<Self> {
        Ok(Self::new(
            StripeConfig::secret_key()?,
            StripeConfig::webhook_secret()?,
            StripeConfig::api_base(),
            FrontendConfig::base_url(),
        ))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/v1/{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
    }

    async fn send<T: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> AppResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::InternalError(format!("Stripe {} request failed: {}", operation, e)))?;

        if !response.status().is_success() {
            return Err(stripe_error(operation, response).await);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::InternalError(format!("Stripe {} response parse failed: {}", operation, e)))
    }
}

/// Form fields of a destination charge.
fn payment_intent_form(request: &PaymentRequest) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("amount", request.amount.to_string()),
        ("currency", request.currency.to_lowercase()),
        ("automatic_payment_methods[enabled]", "true".to_string()),
        ("application_fee_amount", request.application_fee.to_string()),
        ("transfer_data[destination]", request.destination.clone()),
        ("metadata[order_id]", request.order_id.clone()),
    ];
    if let Some(customer) = &request.customer {
        form.push(("customer", customer.clone()));
    }
    form
}

#[async_trait]
impl PaymentProvider for StripePaymentProvider {
    async fn create_connected_account(&self, email: &str, business_type: &str) -> AppResult<String> {
        let form = [
            ("type", "express"),
            ("country", "PT"),
            ("email", email),
            ("business_type", business_type),
            ("capabilities[card_payments][requested]", "true"),
            ("capabilities[transfers][requested]", "true"),
        ];
        let account: Created = self
            .send("create account", self.request(Method::POST, "accounts").form(&form))
            .await?;

        log::info!("Stripe connected account created: {} for {}", account.id, email);
        Ok(account.id)
    }

    async fn create_account_link(&self, account: &str) -> AppResult<String> {
        let refresh_url = format!("{}/business/onboarding/refresh", self.frontend_url);
        let return_url = format!("{}/business/onboarding/complete", self.frontend_url);
        let form = [
            ("account", account),
            ("refresh_url", refresh_url.as_str()),
            ("return_url", return_url.as_str()),
            ("type", "account_onboarding"),
        ];
        let link: AccountLink = self
            .send("create account link", self.request(Method::POST, "account_links").form(&form))
            .await?;
        Ok(link.url)
    }

    async fn delete_connected_account(&self, account: &str) -> AppResult<()> {
        let path = format!("accounts/{}", urlencoding::encode(account));
        let _: Created = self
            .send("delete account", self.request(Method::DELETE, &path))
            .await?;

        log::info!("Stripe connected account deleted: {}", account);
        Ok(())
    }

    async fn create_customer(&self, email: &str, name: &str) -> AppResult<String> {
        let form = [("email", email), ("name", name)];
        let customer: Created = self
            .send("create customer", self.request(Method::POST, "customers").form(&form))
            .await?;

        log::info!("Stripe customer created: {} for {}", customer.id, email);
        Ok(customer.id)
    }

    async fn create_payment_intent(&self, request: PaymentRequest) -> AppResult<PaymentIntent> {
        let builder = self
            .request(Method::POST, "payment_intents")
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&payment_intent_form(&request));
        let intent: PaymentIntent = self.send("create payment intent", builder).await?;

        log::info!(
            "Stripe payment intent {} created for order {} ({} {})",
            intent.id,
            request.order_id,
            request.amount,
            request.currency
        );
        Ok(intent)
    }

    async fn cancel_payment_intent(&self, id: &str) -> AppResult<()> {
        let path = format!("payment_intents/{}/cancel", urlencoding::encode(id));
        let _: PaymentIntent = self
            .send("cancel payment intent", self.request(Method::POST, &path))
            .await?;

        log::info!("Stripe payment intent cancelled: {}", id);
        Ok(())
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str, now: i64) -> AppResult<WebhookEvent> {
        self.webhook.verify(payload, signature, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_intent_form_is_a_destination_charge() {
        let request = PaymentRequest {
            amount: 4500,
            currency: "EUR".to_string(),
            customer: Some("cus_1".to_string()),
            destination: "acct_1".to_string(),
            application_fee: 450,
            order_id: "65f0".to_string(),
            idempotency_key: "order-65f0".to_string(),
        };
        let form = payment_intent_form(&request);

        assert!(form.contains(&("currency", "eur".to_string())));
        assert!(form.contains(&("transfer_data[destination]", "acct_1".to_string())));
        assert!(form.contains(&("application_fee_amount", "450".to_string())));
        assert!(form.contains(&("metadata[order_id]", "65f0".to_string())));
        assert!(form.contains(&("customer", "cus_1".to_string())));
    }

    #[test]
    fn test_error_body_tolerates_missing_fields() {
        let body: StripeErrorBody =
            serde_json::from_str(r#"{"error":{"type":"invalid_request_error"}}"#).unwrap();
        assert_eq!(body.error.kind, "invalid_request_error");
        assert!(body.error.code.is_empty());
    }

    #[test]
    fn test_api_base_trailing_slash_is_trimmed() {
        let provider = StripePaymentProvider::new(
            "sk_test".to_string(),
            "whsec".to_string(),
            "http://localhost:12111/".to_string(),
            "http://localhost:3000".to_string(),
        );
        assert_eq!(provider.api_base, "http://localhost:12111");
    }
}
