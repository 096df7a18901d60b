//! Catalogue entry (home nursing, companionship, physiotherapy...).

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Entity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Service {
    pub fn new(name: String, category: String) -> Self {
        Self {
            id: None,
            name,
            description: None,
            category,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Entity for Service {
    const COLLECTION: &'static str = "services";
    const UNIQUE_FIELDS: &'static [&'static str] = &["name"];

    fn id(&self) -> Option<ObjectId> {
        self.id
    }
}
