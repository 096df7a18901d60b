//! Outgoing email (AWS SES v2) and the message templates.

pub mod ses;
pub mod templates;

pub use ses::SesMailer;

use async_trait::async_trait;

use crate::core::errors::AppResult;

/// A single HTML email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> AppResult<()>;
}
