use chrono::{DateTime, Utc};
use mongodb::bson::{doc, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{bson_date, changes_with};
use crate::core::errors::AppResult;
use crate::domain::entities::{Event, EventKind};
use crate::utils::string_utils::deserialize_optional_string;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 160, message = "title must be 1-160 characters"))]
    pub title: String,

    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(max = 2000))]
    pub description: Option<String>,

    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CreateEventRequest {
    /// Personal calendar entry; order entries are created by the order flow.
    pub fn into_event(self, health_unit: ObjectId) -> Event {
        Event {
            id: None,
            health_unit,
            order: None,
            title: self.title,
            description: self.description,
            start: bson_date(&self.start),
            end: bson_date(&self.end),
            kind: EventKind::Personal,
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 160))]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_optional_string")]
    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[serde(default, skip_serializing)]
    pub start: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing)]
    pub end: Option<DateTime<Utc>>,
}

impl UpdateEventRequest {
    pub fn changes(&self) -> AppResult<Document> {
        let mut extra = Document::new();
        if let Some(start) = &self.start {
            extra.insert("start", bson_date(start));
        }
        if let Some(end) = &self.end {
            extra.insert("end", bson_date(end));
        }
        changes_with(self, extra)
    }
}

/// `?from=...&to=...` calendar window.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl CalendarWindow {
    /// Events overlapping the window.
    pub fn filter(&self, health_unit: ObjectId) -> Document {
        let mut filter = doc! { "healthUnit": health_unit };
        if let Some(from) = &self.from {
            filter.insert("end", doc! { "$gte": bson_date(from) });
        }
        if let Some(to) = &self.to {
            filter.insert("start", doc! { "$lte": bson_date(to) });
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_changes_convert_dates() {
        let request: UpdateEventRequest =
            serde_json::from_str(r#"{"title": "Visit", "end": "2024-04-01T12:00:00Z"}"#).unwrap();
        let changes = request.changes().unwrap();
        assert_eq!(changes.get_str("title").unwrap(), "Visit");
        assert!(changes.get_datetime("end").is_ok());
        assert!(!changes.contains_key("start"));
    }

    #[test]
    fn test_calendar_window_filter() {
        let unit = ObjectId::new();
        let window: CalendarWindow = serde_json::from_str(r#"{"from": "2024-04-01T00:00:00Z"}"#).unwrap();
        let filter = window.filter(unit);
        assert!(filter.get_document("end").unwrap().contains_key("$gte"));
        assert!(!filter.contains_key("start"));
    }
}
