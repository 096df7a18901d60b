use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::entities::CollaboratorRole;
use crate::utils::string_utils::deserialize_optional_string;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollaboratorRequest {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: String,

    #[validate(email(message = "a valid email address is required"))]
    pub email: String,

    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(min = 6, max = 20))]
    pub phone: Option<String>,

    pub role: CollaboratorRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCollaboratorRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_optional_string")]
    #[validate(length(min = 6, max = 20))]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<CollaboratorRole>,
}
