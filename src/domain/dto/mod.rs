//! # Request and response DTOs
//!
//! Request bodies are validated with `validator` before they reach a
//! service; update bodies are turned into `$set` documents with
//! [`changes`]. Responses go through [`ApiResponse`].

pub mod catalog;
pub mod collaborators;
pub mod customers;
pub mod events;
pub mod health_units;
pub mod orders;
pub mod patients;
pub mod query;
pub mod response;
pub mod reviews;

pub use query::ListQuery;
pub use response::{to_view, ApiResponse};

use mongodb::bson::{self, oid::ObjectId, DateTime, Document};
use serde::Serialize;

use crate::core::errors::{AppError, AppResult};

/// Serializes a partial update, dropping absent fields.
///
/// Fails with `INVALID_PARAMETER` when nothing is left to change.
pub fn changes<T: Serialize>(update: &T) -> AppResult<Document> {
    changes_with(update, Document::new())
}

/// [`changes`] plus fields the DTO cannot serialize itself (BSON dates).
pub fn changes_with<T: Serialize>(update: &T, extra: Document) -> AppResult<Document> {
    let mut document = bson::to_document(update)
        .map_err(|e| AppError::InvalidParameter(format!("Invalid update: {}", e)))?;
    document.extend(extra);
    if document.is_empty() {
        return Err(AppError::InvalidParameter("Nothing to update".to_string()));
    }
    Ok(document)
}

/// Parses a path or body identifier.
pub fn object_id(raw: &str, field: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| AppError::InvalidParameter(format!("{} is not a valid id", field)))
}

pub fn bson_date(date: &chrono::DateTime<chrono::Utc>) -> DateTime {
    DateTime::from_millis(date.timestamp_millis())
}
