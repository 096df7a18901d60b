//! Certified invoices (Vendus).

pub mod vendus;

pub use vendus::VendusInvoiceProvider;

use async_trait::async_trait;

use crate::core::errors::AppResult;

/// One-line invoice for a paid order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRequest {
    pub order_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub description: String,
    /// Minor units, tax included.
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub id: String,
    pub number: String,
    pub url: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InvoiceProvider: Send + Sync {
    async fn issue_invoice(&self, request: InvoiceRequest) -> AppResult<Invoice>;
}
