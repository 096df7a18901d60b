use mongodb::bson::doc;
use validator::Validate;

use crate::core::errors::{AppError, AppResult};
use crate::domain::dto::events::{CalendarWindow, CreateEventRequest, UpdateEventRequest};
use crate::domain::entities::{Collaborator, Event, EventKind};
use crate::domain::models::auth::AuthenticatedUser;
use crate::repositories::{ListOptions, Page, Repositories};
use crate::services::callers::member_of;

/// Calendar of the caller's health unit. Entries created by the order flow
/// are read-only here.
pub struct EventService {
    repos: Repositories,
}

impl EventService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn list(
        &self,
        user: &AuthenticatedUser,
        window: CalendarWindow,
        options: &ListOptions,
    ) -> AppResult<Page<Event>> {
        let member = member_of(&self.repos, user).await?;
        let options = if options.sort.is_none() {
            options.clone().sort(doc! { "start": 1 })
        } else {
            options.clone()
        };
        self.repos
            .events
            .query_list(window.filter(member.health_unit), &options, None)
            .await
    }

    pub async fn get(&self, user: &AuthenticatedUser, id: &str) -> AppResult<Event> {
        let member = member_of(&self.repos, user).await?;
        self.owned(&member, id).await
    }

    pub async fn create(&self, user: &AuthenticatedUser, request: CreateEventRequest) -> AppResult<Event> {
        request.validate()?;
        let member = member_of(&self.repos, user).await?;
        let event = self
            .repos
            .events
            .create(request.into_event(member.health_unit), None)
            .await?;
        log::debug!("Event '{}' added to health unit {}", event.title, event.health_unit);
        Ok(event)
    }

    pub async fn update(&self, user: &AuthenticatedUser, id: &str, request: UpdateEventRequest) -> AppResult<Event> {
        request.validate()?;
        let member = member_of(&self.repos, user).await?;
        let event = self.editable(&member, id).await?;
        self.repos.events.update_by_id(&event_id(&event)?, request.changes()?, None).await
    }

    pub async fn delete(&self, user: &AuthenticatedUser, id: &str) -> AppResult<Event> {
        let member = member_of(&self.repos, user).await?;
        let event = self.editable(&member, id).await?;
        self.repos.events.delete(&event_id(&event)?, None).await
    }

    async fn owned(&self, member: &Collaborator, id: &str) -> AppResult<Event> {
        let event = self.repos.events.retrieve(id, None).await?;
        if event.health_unit != member.health_unit {
            return Err(AppError::NotFound("events document not found".to_string()));
        }
        Ok(event)
    }

    async fn editable(&self, member: &Collaborator, id: &str) -> AppResult<Event> {
        let event = self.owned(member, id).await?;
        if event.kind == EventKind::Order {
            return Err(AppError::InvalidParameter(
                "Order events follow their order and cannot be changed directly".to_string(),
            ));
        }
        Ok(event)
    }
}

fn event_id(event: &Event) -> AppResult<String> {
    crate::services::callers::id_of(event.id).map(|id| id.to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::CollaboratorRole;
    use crate::domain::models::auth::ClientKind;
    use crate::services::callers::fixtures;
    use mongodb::bson::DateTime;

    fn create(title: &str, start: &str, end: &str) -> CreateEventRequest {
        serde_json::from_value(serde_json::json!({ "title": title, "start": start, "end": end })).unwrap()
    }

    async fn setup() -> (Repositories, EventService, AuthenticatedUser) {
        let (repos, _) = Repositories::in_memory();
        let unit = fixtures::health_unit(&repos, "a@lar.pt").await;
        fixtures::member(&repos, "nurse", &unit, CollaboratorRole::Caregiver).await;
        let service = EventService::new(repos.clone());
        (repos, service, fixtures::user("nurse", ClientKind::Business))
    }

    #[actix_web::test]
    async fn test_create_and_list_within_window() {
        let (_, service, nurse) = setup().await;
        service
            .create(&nurse, create("Team meeting", "2024-03-01T09:00:00Z", "2024-03-01T10:00:00Z"))
            .await
            .unwrap();
        service
            .create(&nurse, create("Training", "2024-04-10T09:00:00Z", "2024-04-10T12:00:00Z"))
            .await
            .unwrap();

        let window: CalendarWindow = serde_json::from_value(serde_json::json!({
            "from": "2024-02-28T00:00:00Z",
            "to": "2024-03-31T00:00:00Z"
        }))
        .unwrap();
        let page = service.list(&nurse, window, &ListOptions::default()).await.unwrap();
        assert_eq!(page.total_documents, 1);
        assert_eq!(page.data[0].title, "Team meeting");
        assert_eq!(page.data[0].kind, EventKind::Personal);
    }

    #[actix_web::test]
    async fn test_end_before_start_is_rejected() {
        let (_, service, nurse) = setup().await;
        let err = service
            .create(&nurse, create("Backwards", "2024-03-01T10:00:00Z", "2024-03-01T09:00:00Z"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
    }

    #[actix_web::test]
    async fn test_update_and_delete_personal_event() {
        let (repos, service, nurse) = setup().await;
        let event = service
            .create(&nurse, create("Team meeting", "2024-03-01T09:00:00Z", "2024-03-01T10:00:00Z"))
            .await
            .unwrap();
        let id = event.id.unwrap().to_hex();

        let update: UpdateEventRequest = serde_json::from_value(serde_json::json!({ "title": "Staff meeting" })).unwrap();
        let updated = service.update(&nurse, &id, update).await.unwrap();
        assert_eq!(updated.title, "Staff meeting");

        service.delete(&nurse, &id).await.unwrap();
        assert!(repos.events.retrieve(&id, None).await.is_err());
    }

    #[actix_web::test]
    async fn test_order_events_are_read_only() {
        let (repos, service, nurse) = setup().await;
        let member = member_of(&repos, &nurse).await.unwrap();
        let event = repos
            .events
            .create(
                Event {
                    id: None,
                    health_unit: member.health_unit,
                    order: Some(mongodb::bson::oid::ObjectId::new()),
                    title: "Home care".to_string(),
                    description: None,
                    start: DateTime::from_millis(1_700_000_000_000),
                    end: DateTime::from_millis(1_700_003_600_000),
                    kind: EventKind::Order,
                    created_at: None,
                    updated_at: None,
                },
                None,
            )
            .await
            .unwrap();

        let err = service.delete(&nurse, &event.id.unwrap().to_hex()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
        assert!(service.get(&nurse, &event.id.unwrap().to_hex()).await.is_ok());
    }

    #[actix_web::test]
    async fn test_other_units_events_are_hidden() {
        let (repos, service, nurse) = setup().await;
        let event = service
            .create(&nurse, create("Team meeting", "2024-03-01T09:00:00Z", "2024-03-01T10:00:00Z"))
            .await
            .unwrap();
        let other = fixtures::health_unit(&repos, "b@lar.pt").await;
        fixtures::member(&repos, "outsider", &other, CollaboratorRole::Admin).await;

        let err = service
            .get(&fixtures::user("outsider", ClientKind::Business), &event.id.unwrap().to_hex())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
