use serde::Deserialize;
use validator::Validate;

use crate::utils::string_utils::deserialize_optional_string;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReviewRequest {
    /// Completed order being reviewed.
    pub order: String,

    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i32,

    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

/// `?healthUnit=<id>` on the public review listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFilter {
    pub health_unit: String,
}
