//! SES v2 adapter.

use async_trait::async_trait;
use aws_sdk_sesv2::error::ProvideErrorMetadata;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client;

use super::{Email, Mailer};
use crate::config::{AwsConfig, SesConfig};
use crate::core::errors::{AppError, AppResult};
use crate::core::taxonomy::{provider_error, Provider};

fn utf8(data: &str) -> AppResult<Content> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| AppError::InternalError(format!("Invalid email content: {}", e)))
}

pub struct SesMailer {
    client: Client,
    from_address: String,
}

impl SesMailer {
    pub fn new(client: Client, from_address: String) -> Self {
        Self { client, from_address }
    }

    pub async fn from_env() -> AppResult<Self> {
        let from_address = SesConfig::from_address()?;
        let shared = AwsConfig::load().await;
        Ok(Self::new(Client::new(&shared), from_address))
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, email: Email) -> AppResult<()> {
        let message = Message::builder()
            .subject(utf8(&email.subject)?)
            .body(Body::builder().html(utf8(&email.html)?).build())
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from_address)
            .destination(Destination::builder().to_addresses(&email.to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| {
                let code = e.code().unwrap_or_default();
                let message = e.message().unwrap_or("no message").to_string();
                provider_error(Provider::Ses, &[code], format!("SendEmail failed: {}", message))
            })?;

        log::info!("Email \"{}\" sent to {}", email.subject, email.to);
        Ok(())
    }
}
