use chrono::{DateTime, Utc};
use mongodb::bson::{doc, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{bson_date, changes_with};
use crate::core::errors::AppResult;
use crate::domain::entities::{Address, Gender, Patient};
use crate::utils::string_utils::deserialize_optional_string;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientRequest {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: String,

    #[serde(default)]
    pub birthdate: Option<DateTime<Utc>>,

    #[serde(default)]
    pub gender: Option<Gender>,

    #[serde(default)]
    pub medical_conditions: Vec<String>,

    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(max = 2000))]
    pub notes: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub address: Option<Address>,
}

impl CreatePatientRequest {
    pub fn into_patient(self, customer: ObjectId) -> Patient {
        Patient {
            birthdate: self.birthdate.as_ref().map(bson_date),
            gender: self.gender,
            medical_conditions: self.medical_conditions,
            notes: self.notes,
            address: self.address,
            ..Patient::new(customer, self.name)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePatientRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,

    #[serde(default, skip_serializing)]
    pub birthdate: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_conditions: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_optional_string")]
    #[validate(length(max = 2000))]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub address: Option<Address>,
}

impl UpdatePatientRequest {
    pub fn changes(&self) -> AppResult<Document> {
        let extra = match &self.birthdate {
            Some(date) => doc! { "birthdate": bson_date(date) },
            None => Document::new(),
        };
        changes_with(self, extra)
    }
}
