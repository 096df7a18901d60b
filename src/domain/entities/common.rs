//! Value objects shared by several entities.

use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Postal address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[validate(length(min = 1, max = 200))]
    pub street: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 3, max = 12))]
    pub postal_code: String,
    #[serde(default = "default_country")]
    #[validate(length(equal = 2))]
    pub country: String,
}

fn default_country() -> String {
    "PT".to_string()
}

/// `end` must not precede `start`.
pub(crate) fn ensure_window(start: DateTime, end: Option<DateTime>) -> Result<(), ValidationError> {
    match end {
        Some(end) if end < start => {
            let mut error = ValidationError::new("window");
            error.message = Some("end must not be before start".into());
            Err(error)
        }
        _ => Ok(()),
    }
}

pub(crate) fn default_true() -> bool {
    true
}
