//! # Application Error Handling System
//!
//! Unified error type for every layer of the marketplace backend.
//!
//! Repositories and provider adapters never leak driver-specific errors.
//! Whatever MongoDB, Cognito, Stripe or Vendus report is folded into a
//! closed set of four kinds ([`ErrorKind`]) by the taxonomy mapper in
//! [`crate::core::taxonomy`], and callers pattern-match on [`AppError`].
//!
//! ## HTTP mapping
//!
//! | AppError | Kind | HTTP Status |
//! |----------|------|-------------|
//! | `NotFound` | `NOT_FOUND` | 404 Not Found |
//! | `InvalidParameter` | `INVALID_PARAMETER` | 400 Bad Request |
//! | `DuplicateKey` | `DUPLICATE_KEY` | 409 Conflict |
//! | `InternalError` | `INTERNAL_ERROR` | 500 Internal Server Error |
//! | `AuthenticationError` | `INVALID_PARAMETER` | 401 Unauthorized |
//! | `AuthorizationError` | `INVALID_PARAMETER` | 403 Forbidden |
//!
//! Every error response uses the same envelope as successful ones:
//!
//! ```json
//! { "statusCode": 404, "data": { "code": "NOT_FOUND", "message": "Order not found" } }
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crate::core::errors::{AppError, AppResult};
//!
//! async fn load(repo: &Repository<Order>, id: &str) -> AppResult<Order> {
//!     // NOT_FOUND / INTERNAL_ERROR already mapped by the repository
//!     let order = repo.retrieve(id, None).await?;
//!     if order.status.is_terminal() {
//!         return Err(AppError::InvalidParameter("Order is closed".to_string()));
//!     }
//!     Ok(order)
//! }
//! ```

use std::fmt;

use actix_web::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// The closed error taxonomy shared by repositories and provider adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Requested entity does not exist, or a malformed identifier was used.
    NotFound,
    /// Input fails validation or violates a uniqueness constraint.
    InvalidParameter,
    /// A conflicting unique value already exists (provider adapters only).
    DuplicateKey,
    /// Anything unanticipated.
    InternalError,
}

impl ErrorKind {
    /// Wire code used in error envelopes and logs.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidParameter => "INVALID_PARAMETER",
            ErrorKind::DuplicateKey => "DUPLICATE_KEY",
            ErrorKind::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Builds the matching [`AppError`] variant.
    pub fn into_error(self, message: impl Into<String>) -> AppError {
        let message = message.into();
        match self {
            ErrorKind::NotFound => AppError::NotFound(message),
            ErrorKind::InvalidParameter => AppError::InvalidParameter(message),
            ErrorKind::DuplicateKey => AppError::DuplicateKey(message),
            ErrorKind::InternalError => AppError::InternalError(message),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Application-wide error type.
///
/// The first four variants are the storage/provider taxonomy; the last two
/// are raised only by the authentication guard.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// 404 Not Found
    #[error("Not found: {0}")]
    NotFound(String),

    /// 400 Bad Request
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// 409 Conflict
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// 500 Internal Server Error
    ///
    /// The message is logged but never sent to the client.
    #[error("Internal server error: {0}")]
    InternalError(String),

    /// 401 Unauthorized
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// 403 Forbidden
    #[error("Authorization error: {0}")]
    AuthorizationError(String),
}

impl AppError {
    /// Projects the error onto the four-kind taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::InvalidParameter(_)
            | AppError::AuthenticationError(_)
            | AppError::AuthorizationError(_) => ErrorKind::InvalidParameter,
            AppError::DuplicateKey(_) => ErrorKind::DuplicateKey,
            AppError::InternalError(_) => ErrorKind::InternalError,
        }
    }

    /// Human-readable message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            AppError::NotFound(m)
            | AppError::InvalidParameter(m)
            | AppError::DuplicateKey(m)
            | AppError::InternalError(m)
            | AppError::AuthenticationError(m)
            | AppError::AuthorizationError(m) => m,
        }
    }

    fn public_code(&self) -> &'static str {
        match self {
            AppError::AuthenticationError(_) => "UNAUTHORIZED",
            AppError::AuthorizationError(_) => "FORBIDDEN",
            other => other.kind().code(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::InvalidParameter(errors.to_string())
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateKey(_) => StatusCode::CONFLICT,
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Emits the `{statusCode, data}` envelope.
    ///
    /// Internal errors are logged with their detail and answered with a
    /// generic message.
    fn error_response(&self) -> actix_web::HttpResponse {
        let status = self.status_code();

        let message = match self {
            AppError::InternalError(detail) => {
                log::error!("Internal error returned to client: {}", detail);
                "An unexpected error occurred".to_string()
            }
            other => other.message().to_string(),
        };

        actix_web::HttpResponse::build(status).json(serde_json::json!({
            "statusCode": status.as_u16(),
            "data": {
                "code": self.public_code(),
                "message": message,
            }
        }))
    }
}

/// `Result<T, AppError>` shorthand.
pub type AppResult<T> = Result<T, AppError>;

/// Converts foreign errors into `InternalError` with context.
///
/// ```rust,ignore
/// let body = serde_json::to_vec(&payload).context("Failed to encode payload")?;
/// ```
pub trait ErrorContext<T> {
    /// Attaches a fixed context message.
    fn context(self, msg: &str) -> AppResult<T>;

    /// Attaches a lazily built context message.
    fn with_context<F>(self, f: F) -> AppResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn context(self, msg: &str) -> AppResult<T> {
        self.map_err(|e| AppError::InternalError(format!("{}: {}", msg, e)))
    }

    fn with_context<F>(self, f: F) -> AppResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::InternalError(format!("{}: {}", f(), e)))
    }
}
