//! Staff member of a health unit.

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorRole {
    Admin,
    Manager,
    Caregiver,
}

impl CollaboratorRole {
    /// Admins and managers can change orders and staff.
    pub fn can_manage(self) -> bool {
        matches!(self, CollaboratorRole::Admin | CollaboratorRole::Manager)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
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
    pub role: CollaboratorRole,
    pub health_unit: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Collaborator {
    pub fn new(
        cognito_id: String,
        name: String,
        email: String,
        role: CollaboratorRole,
        health_unit: ObjectId,
    ) -> Self {
        Self {
            id: None,
            cognito_id,
            name,
            email,
            phone: None,
            role,
            health_unit,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Entity for Collaborator {
    const COLLECTION: &'static str = "collaborators";
    const UNIQUE_FIELDS: &'static [&'static str] = &["email", "cognitoId"];

    fn id(&self) -> Option<ObjectId> {
        self.id
    }
}
