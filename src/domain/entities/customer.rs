//! Marketplace customer (the account that books care).

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::Address;
use super::Entity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[validate(length(min = 1))]
    pub cognito_id: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 6, max = 20))]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub patients: Vec<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Customer {
    pub fn new(cognito_id: String, name: String, email: String) -> Self {
        Self {
            id: None,
            cognito_id,
            name,
            email,
            phone: None,
            address: None,
            stripe_customer_id: None,
            patients: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Entity for Customer {
    const COLLECTION: &'static str = "customers";
    const UNIQUE_FIELDS: &'static [&'static str] = &["email", "cognitoId"];

    fn id(&self) -> Option<ObjectId> {
        self.id
    }
}
