//! Calendar entry of a health unit.

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::common::ensure_window;
use super::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Order,
    Personal,
}

fn validate_event(event: &Event) -> Result<(), ValidationError> {
    ensure_window(event.start, Some(event.end))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_event"))]
pub struct Event {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub health_unit: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<ObjectId>,
    #[validate(length(min = 1, max = 160))]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub start: DateTime,
    pub end: DateTime,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Entity for Event {
    const COLLECTION: &'static str = "events";

    fn id(&self) -> Option<ObjectId> {
        self.id
    }
}
