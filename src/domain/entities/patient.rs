//! Person receiving care, owned by a customer.

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::Address;
use super::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub customer: ObjectId,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub medical_conditions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Patient {
    pub fn new(customer: ObjectId, name: String) -> Self {
        Self {
            id: None,
            customer,
            name,
            birthdate: None,
            gender: None,
            medical_conditions: Vec::new(),
            notes: None,
            address: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn belongs_to(&self, customer: &ObjectId) -> bool {
        self.customer == *customer
    }
}

impl Entity for Patient {
    const COLLECTION: &'static str = "patients";

    fn id(&self) -> Option<ObjectId> {
        self.id
    }
}
