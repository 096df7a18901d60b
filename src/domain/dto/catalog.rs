use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::entities::Service;
use crate::utils::string_utils::deserialize_optional_string;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: String,

    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 60, message = "category must be 1-60 characters"))]
    pub category: String,
}

impl CreateServiceRequest {
    pub fn into_service(self) -> Service {
        Service {
            description: self.description,
            ..Service::new(self.name, self.category)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_optional_string")]
    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 60))]
    pub category: Option<String>,
}

/// `?category=nursing` on the catalogue listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogFilter {
    pub category: Option<String>,
}
