use std::sync::Arc;

use mongodb::bson::doc;
use validator::Validate;

use crate::core::errors::{AppError, AppResult};
use crate::domain::dto::changes;
use crate::domain::dto::collaborators::{CreateCollaboratorRequest, UpdateCollaboratorRequest};
use crate::domain::entities::{Collaborator, CollaboratorRole};
use crate::domain::models::auth::AuthenticatedUser;
use crate::repositories::{ListOptions, Page, Repositories};
use crate::services::callers::{id_of, manager_of, member_of};
use crate::services::identity::{IdentityProvider, UserGroup};
use crate::services::mail::{templates, Mailer};
use crate::services::orchestration::compensate;

/// Staff of the caller's health unit.
///
/// Every collaborator can read the roster; admins and managers change it,
/// and only admins grant or revoke the admin role.
pub struct CollaboratorService {
    repos: Repositories,
    identity: Arc<dyn IdentityProvider>,
    mailer: Arc<dyn Mailer>,
}

impl CollaboratorService {
    pub fn new(repos: Repositories, identity: Arc<dyn IdentityProvider>, mailer: Arc<dyn Mailer>) -> Self {
        Self { repos, identity, mailer }
    }

    pub async fn me(&self, user: &AuthenticatedUser) -> AppResult<Collaborator> {
        member_of(&self.repos, user).await
    }

    pub async fn list(&self, user: &AuthenticatedUser, options: &ListOptions) -> AppResult<Page<Collaborator>> {
        let member = member_of(&self.repos, user).await?;
        self.repos
            .collaborators
            .query_list(doc! { "healthUnit": member.health_unit }, options, None)
            .await
    }

    pub async fn get(&self, user: &AuthenticatedUser, id: &str) -> AppResult<Collaborator> {
        let member = member_of(&self.repos, user).await?;
        self.colleague(&member, id).await
    }

    /// Creates the Cognito user and the collaborator record, then sends
    /// the invitation. A failed insert deletes the Cognito user.
    pub async fn add(
        &self,
        user: &AuthenticatedUser,
        request: CreateCollaboratorRequest,
    ) -> AppResult<Collaborator> {
        request.validate()?;
        let manager = manager_of(&self.repos, user).await?;
        ensure_can_assign(&manager, request.role)?;
        let email = request.email.trim().to_lowercase();

        let sub = self
            .identity
            .create_user(&email, &request.name, UserGroup::Business)
            .await?;

        let mut collaborator =
            Collaborator::new(sub, request.name, email.clone(), request.role, manager.health_unit);
        collaborator.phone = request.phone;
        let collaborator = match self.repos.collaborators.create(collaborator, None).await {
            Ok(collaborator) => collaborator,
            Err(e) => {
                compensate("delete Cognito user", self.identity.delete_user(&email)).await;
                return Err(e);
            }
        };
        log::info!("Collaborator {} added to health unit {}", email, manager.health_unit);

        let unit_name = match self.repos.health_units.retrieve(&manager.health_unit.to_hex(), None).await {
            Ok(unit) => unit.name,
            Err(_) => String::from("your health unit"),
        };
        let invite = templates::collaborator_invite(&email, &collaborator.name, &unit_name);
        if let Err(e) = self.mailer.send(invite).await {
            log::warn!("Invitation to {} not sent: {}", email, e);
        }

        Ok(collaborator)
    }

    pub async fn update(
        &self,
        user: &AuthenticatedUser,
        id: &str,
        request: UpdateCollaboratorRequest,
    ) -> AppResult<Collaborator> {
        request.validate()?;
        let manager = manager_of(&self.repos, user).await?;
        let target = self.colleague(&manager, id).await?;

        if let Some(role) = request.role {
            ensure_can_assign(&manager, role)?;
            ensure_can_assign(&manager, target.role)?;
            if target.id == manager.id && role != manager.role {
                return Err(AppError::InvalidParameter("You cannot change your own role".to_string()));
            }
        }

        self.repos
            .collaborators
            .update_by_id(&id_of(target.id)?.to_hex(), changes(&request)?, None)
            .await
    }

    /// Deletes the record, then the Cognito user. A failure on the Cognito
    /// side is logged; the collaborator has already lost access to the unit.
    pub async fn remove(&self, user: &AuthenticatedUser, id: &str) -> AppResult<Collaborator> {
        let manager = manager_of(&self.repos, user).await?;
        let target = self.colleague(&manager, id).await?;
        if target.id == manager.id {
            return Err(AppError::InvalidParameter("You cannot remove yourself".to_string()));
        }
        ensure_can_assign(&manager, target.role)?;

        let removed = self.repos.collaborators.delete(&id_of(target.id)?.to_hex(), None).await?;
        if let Err(e) = self.identity.delete_user(&removed.email).await {
            log::error!("Cognito user {} not deleted after removal: {}", removed.email, e);
        }
        log::info!("Collaborator {} removed from health unit {}", removed.email, removed.health_unit);
        Ok(removed)
    }

    /// Collaborator `id` of the same health unit as `member`.
    async fn colleague(&self, member: &Collaborator, id: &str) -> AppResult<Collaborator> {
        let target = self.repos.collaborators.retrieve(id, None).await?;
        if target.health_unit != member.health_unit {
            return Err(AppError::NotFound("collaborators document not found".to_string()));
        }
        Ok(target)
    }
}

fn ensure_can_assign(manager: &Collaborator, role: CollaboratorRole) -> AppResult<()> {
    if role == CollaboratorRole::Admin && manager.role != CollaboratorRole::Admin {
        return Err(AppError::AuthorizationError(
            "Only admins can manage admin collaborators".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::auth::ClientKind;
    use crate::services::callers::fixtures;
    use crate::services::identity::MockIdentityProvider;
    use crate::services::mail::MockMailer;

    fn create(role: &str) -> CreateCollaboratorRequest {
        serde_json::from_value(serde_json::json!({
            "name": "Marta Dias",
            "email": "marta@lar.pt",
            "role": role,
        }))
        .unwrap()
    }

    #[actix_web::test]
    async fn test_manager_adds_caregiver() {
        let (repos, _) = Repositories::in_memory();
        let unit = fixtures::health_unit(&repos, "a@lar.pt").await;
        fixtures::member(&repos, "boss", &unit, CollaboratorRole::Manager).await;

        let mut identity = MockIdentityProvider::new();
        identity
            .expect_create_user()
            .withf(|_, _, group| *group == UserGroup::Business)
            .times(1)
            .returning(|_, _, _| Ok("sub-marta".to_string()));
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|email| email.html.contains("Lar Sol"))
            .times(1)
            .returning(|_| Ok(()));
        let service = CollaboratorService::new(repos, Arc::new(identity), Arc::new(mailer));

        let boss = fixtures::user("boss", ClientKind::Business);
        let added = service.add(&boss, create("caregiver")).await.unwrap();
        assert_eq!(added.health_unit, unit.id.unwrap());
        assert_eq!(added.cognito_id, "sub-marta");

        let roster = service.list(&boss, &ListOptions::default()).await.unwrap();
        assert_eq!(roster.total_documents, 2);
    }

    #[actix_web::test]
    async fn test_manager_cannot_add_admin() {
        let (repos, _) = Repositories::in_memory();
        let unit = fixtures::health_unit(&repos, "a@lar.pt").await;
        fixtures::member(&repos, "boss", &unit, CollaboratorRole::Manager).await;
        let mut identity = MockIdentityProvider::new();
        identity.expect_create_user().never();
        let service = CollaboratorService::new(repos, Arc::new(identity), Arc::new(MockMailer::new()));

        let err = service
            .add(&fixtures::user("boss", ClientKind::Business), create("admin"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthorizationError(_)));
    }

    #[actix_web::test]
    async fn test_colleagues_of_other_units_are_invisible() {
        let (repos, _) = Repositories::in_memory();
        let ours = fixtures::health_unit(&repos, "a@lar.pt").await;
        let theirs = fixtures::health_unit(&repos, "b@lar.pt").await;
        fixtures::member(&repos, "boss", &ours, CollaboratorRole::Admin).await;
        let stranger = fixtures::member(&repos, "stranger", &theirs, CollaboratorRole::Caregiver).await;
        let service = CollaboratorService::new(repos, Arc::new(MockIdentityProvider::new()), Arc::new(MockMailer::new()));

        let err = service
            .remove(&fixtures::user("boss", ClientKind::Business), &stranger.id.unwrap().to_hex())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[actix_web::test]
    async fn test_remove_deletes_record_even_if_cognito_fails() {
        let (repos, store) = Repositories::in_memory();
        let unit = fixtures::health_unit(&repos, "a@lar.pt").await;
        let boss = fixtures::member(&repos, "boss", &unit, CollaboratorRole::Admin).await;
        let carer = fixtures::member(&repos, "carer", &unit, CollaboratorRole::Caregiver).await;

        let mut identity = MockIdentityProvider::new();
        identity
            .expect_delete_user()
            .withf(|email| email.eq_ignore_ascii_case("carer@lar.pt"))
            .times(1)
            .returning(|_| Err(AppError::InternalError("cognito down".to_string())));
        let service = CollaboratorService::new(repos, Arc::new(identity), Arc::new(MockMailer::new()));
        let caller = fixtures::user("boss", ClientKind::Business);

        service.remove(&caller, &carer.id.unwrap().to_hex()).await.unwrap();
        assert_eq!(store.documents("collaborators").len(), 1);

        let err = service.remove(&caller, &boss.id.unwrap().to_hex()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
    }

    #[actix_web::test]
    async fn test_update_role() {
        let (repos, _) = Repositories::in_memory();
        let unit = fixtures::health_unit(&repos, "a@lar.pt").await;
        fixtures::member(&repos, "boss", &unit, CollaboratorRole::Admin).await;
        let carer = fixtures::member(&repos, "carer", &unit, CollaboratorRole::Caregiver).await;
        let service = CollaboratorService::new(repos, Arc::new(MockIdentityProvider::new()), Arc::new(MockMailer::new()));

        let request: UpdateCollaboratorRequest = serde_json::from_str(r#"{"role": "manager"}"#).unwrap();
        let updated = service
            .update(&fixtures::user("boss", ClientKind::Business), &carer.id.unwrap().to_hex(), request)
            .await
            .unwrap();
        assert_eq!(updated.role, CollaboratorRole::Manager);
    }
}
