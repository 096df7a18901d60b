//! Vendus documents API.
//!
//! Invoice-receipts (`FR`) are issued with the API key as the basic-auth
//! user. Errors come back as plain HTTP statuses.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Invoice, InvoiceProvider, InvoiceRequest};
use crate::config::VendusConfig;
use crate::core::errors::{AppError, AppResult};
use crate::core::taxonomy::{provider_error, Provider};

#[derive(Debug, Serialize)]
struct DocumentItem<'a> {
    title: &'a str,
    qty: u32,
    gross_price: f64,
}

#[derive(Debug, Serialize)]
struct DocumentClient<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct NewDocument<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    external_reference: &'a str,
    client: DocumentClient<'a>,
    items: Vec<DocumentItem<'a>>,
}

#[derive(Debug, Deserialize)]
struct DocumentResponse {
    id: serde_json::Value,
    number: String,
    #[serde(default)]
    output: Option<String>,
}

impl DocumentResponse {
    fn into_invoice(self) -> Invoice {
        let id = match self.id {
            serde_json::Value::String(id) => id,
            other => other.to_string(),
        };
        Invoice {
            id,
            number: self.number,
            url: self.output,
        }
    }
}

fn document(request: &InvoiceRequest) -> NewDocument<'_> {
    NewDocument {
        kind: "FR",
        external_reference: &request.order_id,
        client: DocumentClient {
            name: &request.customer_name,
            email: &request.customer_email,
        },
        items: vec![DocumentItem {
            title: &request.description,
            qty: 1,
            gross_price: request.amount as f64 / 100.0,
        }],
    }
}

pub struct VendusInvoiceProvider {
    http: Client,
    api_key: String,
    api_base: String,
}

impl VendusInvoiceProvider {
    pub fn new(api_key: String, api_base: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_env() -> AppResult<Self> {
        Ok(Self::new(VendusConfig::api_key()?, VendusConfig::api_base()))
    }
}

#[async_trait]
impl InvoiceProvider for VendusInvoiceProvider {
    async fn issue_invoice(&self, request: InvoiceRequest) -> AppResult<Invoice> {
        let response = self
            .http
            .post(format!("{}/documents/", self.api_base))
            .basic_auth(&self.api_key, None::<&str>)
            .json(&document(&request))
            .send()
            .await
            .map_err(|e| AppError::InternalError(format!("Vendus request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(
                Provider::Vendus,
                &[status.as_str()],
                format!("issue invoice for order {} failed: {}", request.order_id, body),
            ));
        }

        let invoice = response
            .json::<DocumentResponse>()
            .await
            .map_err(|e| AppError::InternalError(format!("Vendus response parse failed: {}", e)))?
            .into_invoice();

        log::info!("Invoice {} issued for order {}", invoice.number, request.order_id);
        Ok(invoice)
    }
}
