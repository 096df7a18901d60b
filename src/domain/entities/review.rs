//! Customer review of a health unit.

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Entity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub health_unit: ObjectId,
    pub customer: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<ObjectId>,
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Review {
    pub fn new(health_unit: ObjectId, customer: ObjectId, rating: i32) -> Self {
        Self {
            id: None,
            health_unit,
            customer,
            order: None,
            rating,
            comment: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Entity for Review {
    const COLLECTION: &'static str = "reviews";

    fn id(&self) -> Option<ObjectId> {
        self.id
    }
}
