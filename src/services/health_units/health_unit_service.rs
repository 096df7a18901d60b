use std::sync::Arc;

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use validator::Validate;

use crate::core::errors::{AppError, AppResult};
use crate::db::scope::TransactionScope;
use crate::domain::dto::health_units::{
    HealthUnitFilter, OnboardRequest, Onboarded, UpdateHealthUnitRequest,
};
use crate::domain::dto::{changes_with, object_id};
use crate::domain::entities::{Collaborator, CollaboratorRole, HealthUnit};
use crate::domain::models::auth::AuthenticatedUser;
use crate::repositories::{ListOptions, Page, Repositories};
use crate::services::callers::{id_of, manager_of, member_of};
use crate::services::identity::{IdentityProvider, UserGroup};
use crate::services::mail::{templates, Mailer};
use crate::services::orchestration::{compensate, finish};
use crate::services::payments::PaymentProvider;

pub struct HealthUnitService {
    repos: Repositories,
    identity: Arc<dyn IdentityProvider>,
    payments: Arc<dyn PaymentProvider>,
    mailer: Arc<dyn Mailer>,
}

impl HealthUnitService {
    pub fn new(
        repos: Repositories,
        identity: Arc<dyn IdentityProvider>,
        payments: Arc<dyn PaymentProvider>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self { repos, identity, payments, mailer }
    }

    /// Registers a health unit and its admin collaborator.
    ///
    /// 1. Stripe connected account
    /// 2. Cognito user in `business`
    /// 3. health unit + admin collaborator, one scope
    /// 4. account link and onboarding email (best effort)
    ///
    /// A failure in steps 2-3 deletes what steps 1-2 created, newest first.
    pub async fn onboard(&self, request: OnboardRequest) -> AppResult<Onboarded> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();
        let services = self.catalog_ids(&request.services).await?;

        let account = self
            .payments
            .create_connected_account(&email, request.kind.stripe_business_type())
            .await?;
        log::info!("Stripe connected account created: {}", account);

        let sub = match self
            .identity
            .create_user(&email, &request.admin_name, UserGroup::Business)
            .await
        {
            Ok(sub) => sub,
            Err(e) => {
                compensate("delete connected account", self.payments.delete_connected_account(&account)).await;
                return Err(e);
            }
        };
        log::info!("Cognito business user created: {}", email);

        let mut unit = HealthUnit::new(request.name, email.clone(), request.kind);
        unit.phone = request.phone;
        unit.description = request.description;
        unit.address = request.address;
        unit.services = services;
        unit.stripe_account_id = Some(account.clone());
        let admin = Collaborator::new(sub, request.admin_name, email.clone(), CollaboratorRole::Admin, ObjectId::new());

        let stored = match self.repos.begin().await {
            Ok(mut scope) => {
                let result = self.store_unit(&mut scope, unit, admin).await;
                finish(scope, result).await
            }
            Err(e) => Err(e),
        };
        let (health_unit, collaborator) = match stored {
            Ok(stored) => stored,
            Err(e) => {
                compensate("delete Cognito user", self.identity.delete_user(&email)).await;
                compensate("delete connected account", self.payments.delete_connected_account(&account)).await;
                return Err(e);
            }
        };
        log::info!("Health unit onboarded: {} ({})", health_unit.name, email);

        let onboarding_url = match self.payments.create_account_link(&account).await {
            Ok(url) => Some(url),
            Err(e) => {
                log::warn!("Onboarding link for {} not created: {}", account, e);
                None
            }
        };
        if let Some(url) = &onboarding_url {
            let email = templates::business_onboarding(&health_unit.email, &health_unit.name, url);
            if let Err(e) = self.mailer.send(email).await {
                log::warn!("Onboarding email to {} not sent: {}", health_unit.email, e);
            }
        }

        Ok(Onboarded { health_unit, collaborator, onboarding_url })
    }

    async fn store_unit(
        &self,
        scope: &mut TransactionScope,
        unit: HealthUnit,
        mut admin: Collaborator,
    ) -> AppResult<(HealthUnit, Collaborator)> {
        let unit = self.repos.health_units.create(unit, Some(&mut *scope)).await?;
        admin.health_unit = id_of(unit.id)?;
        let admin = self.repos.collaborators.create(admin, Some(&mut *scope)).await?;
        Ok((unit, admin))
    }

    /// Applies an `account.updated` webhook. Unknown accounts are ignored.
    pub async fn sync_stripe_account(&self, account_id: &str, charges_enabled: bool) -> AppResult<()> {
        let page = self
            .repos
            .health_units
            .query_list(doc! { "stripeAccountId": account_id }, &ListOptions::page(1, 1), None)
            .await?;
        let Some(unit) = page.data.into_iter().next() else {
            log::warn!("account.updated for unknown account {}", account_id);
            return Ok(());
        };
        if unit.charges_enabled == charges_enabled {
            return Ok(());
        }

        self.repos
            .health_units
            .update_by_id(&id_of(unit.id)?.to_hex(), doc! { "chargesEnabled": charges_enabled }, None)
            .await?;
        log::info!("Health unit {} chargesEnabled={}", unit.name, charges_enabled);
        Ok(())
    }

    /// Fresh Stripe onboarding link for the caller's health unit.
    pub async fn onboarding_link(&self, user: &AuthenticatedUser) -> AppResult<String> {
        let member = manager_of(&self.repos, user).await?;
        let unit = self.repos.health_units.retrieve(&member.health_unit.to_hex(), None).await?;
        let account = unit
            .stripe_account_id
            .ok_or_else(|| AppError::InvalidParameter("Health unit has no Stripe account".to_string()))?;
        self.payments.create_account_link(&account).await
    }

    /// Active health units, optionally only those offering `service`.
    pub async fn list(&self, filter: HealthUnitFilter, options: &ListOptions) -> AppResult<Page<HealthUnit>> {
        let mut query = doc! { "active": true };
        if let Some(service) = filter.service.as_deref() {
            query.insert("services", object_id(service, "service")?);
        }
        self.repos.health_units.query_list(query, options, None).await
    }

    pub async fn get(&self, id: &str) -> AppResult<HealthUnit> {
        self.repos.health_units.retrieve(id, None).await
    }

    /// Health unit of the calling collaborator.
    pub async fn mine(&self, user: &AuthenticatedUser) -> AppResult<HealthUnit> {
        let member = member_of(&self.repos, user).await?;
        self.repos.health_units.retrieve(&member.health_unit.to_hex(), None).await
    }

    pub async fn update_mine(
        &self,
        user: &AuthenticatedUser,
        request: UpdateHealthUnitRequest,
    ) -> AppResult<HealthUnit> {
        request.validate()?;
        let member = manager_of(&self.repos, user).await?;

        let mut extra = Document::new();
        if let Some(services) = &request.services {
            let ids = self.catalog_ids(services).await?;
            extra.insert("services", ids.into_iter().map(Bson::ObjectId).collect::<Vec<_>>());
        }
        let fields = changes_with(&request, extra)?;

        self.repos
            .health_units
            .update_by_id(&member.health_unit.to_hex(), fields, None)
            .await
    }

    /// Parses catalogue ids and checks they all exist.
    async fn catalog_ids(&self, raw: &[String]) -> AppResult<Vec<ObjectId>> {
        let mut ids = Vec::with_capacity(raw.len());
        for id in raw {
            let id = object_id(id, "service")?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            return Ok(ids);
        }

        let found = self
            .repos
            .services
            .query_list(doc! { "_id": { "$in": ids.clone() } }, &ListOptions::page(1, 1), None)
            .await?;
        if found.total_documents != ids.len() as u64 {
            return Err(AppError::InvalidParameter("Unknown service in list".to_string()));
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::StoreError;
    use crate::domain::entities::Service;
    use crate::domain::models::auth::ClientKind;
    use crate::services::callers::fixtures;
    use crate::services::identity::MockIdentityProvider;
    use crate::services::mail::MockMailer;
    use crate::services::payments::MockPaymentProvider;
    use mockall::Sequence;

    fn request(services: Vec<String>) -> OnboardRequest {
        serde_json::from_value(serde_json::json!({
            "name": "Lar Sol",
            "email": "geral@larsol.pt",
            "kind": "company",
            "adminName": "Rui Costa",
            "services": services,
        }))
        .unwrap()
    }

    fn service(
        repos: Repositories,
        identity: MockIdentityProvider,
        payments: MockPaymentProvider,
        mailer: MockMailer,
    ) -> HealthUnitService {
        HealthUnitService::new(repos, Arc::new(identity), Arc::new(payments), Arc::new(mailer))
    }

    #[actix_web::test]
    async fn test_onboard_stores_unit_and_admin() {
        let (repos, store) = Repositories::in_memory();
        let care = repos
            .services
            .create(Service::new("Home care".to_string(), "care".to_string()), None)
            .await
            .unwrap();

        let mut payments = MockPaymentProvider::new();
        payments
            .expect_create_connected_account()
            .withf(|_, business_type| business_type.eq_ignore_ascii_case("company"))
            .returning(|_, _| Ok("acct_9".to_string()));
        payments
            .expect_create_account_link()
            .returning(|_| Ok("https://connect.stripe.com/setup/x".to_string()));
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_create_user()
            .withf(|_, _, group| *group == UserGroup::Business)
            .returning(|_, _, _| Ok("sub-rui".to_string()));
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|email| email.html.contains("https://connect.stripe.com/setup/x"))
            .times(1)
            .returning(|_| Ok(()));

        let onboarded = service(repos, identity, payments, mailer)
            .onboard(request(vec![care.id.unwrap().to_hex()]))
            .await
            .unwrap();

        assert_eq!(onboarded.health_unit.stripe_account_id.as_deref(), Some("acct_9"));
        assert!(!onboarded.health_unit.charges_enabled);
        assert_eq!(onboarded.collaborator.role, CollaboratorRole::Admin);
        assert_eq!(onboarded.collaborator.health_unit, onboarded.health_unit.id.unwrap());
        assert!(onboarded.onboarding_url.is_some());
        assert_eq!(store.documents("health_units").len(), 1);
        assert_eq!(store.documents("collaborators").len(), 1);
    }

    #[actix_web::test]
    async fn test_unknown_service_rejected_before_side_effects() {
        let (repos, _) = Repositories::in_memory();
        let mut payments = MockPaymentProvider::new();
        payments.expect_create_connected_account().never();

        let err = service(repos, MockIdentityProvider::new(), payments, MockMailer::new())
            .onboard(request(vec![ObjectId::new().to_hex()]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
    }

    #[actix_web::test]
    async fn test_cognito_failure_deletes_connected_account() {
        let (repos, _) = Repositories::in_memory();
        let mut payments = MockPaymentProvider::new();
        payments
            .expect_create_connected_account()
            .returning(|_, _| Ok("acct_9".to_string()));
        payments
            .expect_delete_connected_account()
            .withf(|account| account.eq_ignore_ascii_case("acct_9"))
            .times(1)
            .returning(|_| Ok(()));
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_create_user()
            .returning(|_, _, _| Err(AppError::DuplicateKey("User already exists".to_string())));
        identity.expect_delete_user().never();

        let err = service(repos, identity, payments, MockMailer::new())
            .onboard(request(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateKey(_)));
    }

    #[actix_web::test]
    async fn test_storage_failure_rolls_back_in_reverse_order() {
        let (repos, store) = Repositories::in_memory();
        let mut seq = Sequence::new();
        let mut payments = MockPaymentProvider::new();
        let mut identity = MockIdentityProvider::new();
        payments
            .expect_create_connected_account()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("acct_9".to_string()));
        identity
            .expect_create_user()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok("sub-rui".to_string()));
        identity
            .expect_delete_user()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        payments
            .expect_delete_connected_account()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        payments.expect_create_account_link().never();

        store.fail_next(StoreError::Driver("primary stepped down".to_string()));
        let err = service(repos, identity, payments, MockMailer::new())
            .onboard(request(vec![]))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InternalError(_)));
        assert!(store.documents("health_units").is_empty());
        assert!(store.documents("collaborators").is_empty());
    }

    #[actix_web::test]
    async fn test_missing_link_is_not_fatal() {
        let (repos, _) = Repositories::in_memory();
        let mut payments = MockPaymentProvider::new();
        payments
            .expect_create_connected_account()
            .returning(|_, _| Ok("acct_9".to_string()));
        payments
            .expect_create_account_link()
            .returning(|_| Err(AppError::InternalError("stripe unavailable".to_string())));
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_create_user()
            .returning(|_, _, _| Ok("sub-rui".to_string()));
        let mut mailer = MockMailer::new();
        mailer.expect_send().never();

        let onboarded = service(repos, identity, payments, mailer)
            .onboard(request(vec![]))
            .await
            .unwrap();
        assert_eq!(onboarded.onboarding_url, None);
    }

    #[actix_web::test]
    async fn test_sync_stripe_account() {
        let (repos, _) = Repositories::in_memory();
        let mut unit = HealthUnit::new("Lar Sol".to_string(), "geral@larsol.pt".to_string(), crate::domain::entities::HealthUnitKind::Company);
        unit.stripe_account_id = Some("acct_sync".to_string());
        let unit = repos.health_units.create(unit, None).await.unwrap();
        let service = service(repos.clone(), MockIdentityProvider::new(), MockPaymentProvider::new(), MockMailer::new());

        service.sync_stripe_account("acct_sync", true).await.unwrap();
        service.sync_stripe_account("acct_unknown", true).await.unwrap();

        let stored = repos.health_units.retrieve(&unit.id.unwrap().to_hex(), None).await.unwrap();
        assert!(stored.charges_enabled);
        assert!(stored.accepts_orders());
    }

    #[actix_web::test]
    async fn test_list_filters_by_service() {
        let (repos, _) = Repositories::in_memory();
        let care = repos
            .services
            .create(Service::new("Home care".to_string(), "care".to_string()), None)
            .await
            .unwrap();
        let mut offering = fixtures::health_unit(&repos, "a@lar.pt").await;
        fixtures::health_unit(&repos, "b@lar.pt").await;
        offering = repos
            .health_units
            .update_by_id(
                &offering.id.unwrap().to_hex(),
                doc! { "services": [care.id.unwrap()] },
                None,
            )
            .await
            .unwrap();
        let service = service(repos, MockIdentityProvider::new(), MockPaymentProvider::new(), MockMailer::new());

        let all = service.list(HealthUnitFilter::default(), &ListOptions::default()).await.unwrap();
        assert_eq!(all.total_documents, 2);

        let filter = HealthUnitFilter { service: Some(care.id.unwrap().to_hex()) };
        let page = service.list(filter, &ListOptions::default()).await.unwrap();
        assert_eq!(page.total_documents, 1);
        assert_eq!(page.data[0].id, offering.id);
    }

    #[actix_web::test]
    async fn test_only_managers_update_the_unit() {
        let (repos, _) = Repositories::in_memory();
        let unit = fixtures::health_unit(&repos, "a@lar.pt").await;
        fixtures::member(&repos, "boss", &unit, CollaboratorRole::Manager).await;
        fixtures::member(&repos, "carer", &unit, CollaboratorRole::Caregiver).await;
        let service = service(repos, MockIdentityProvider::new(), MockPaymentProvider::new(), MockMailer::new());

        let request: UpdateHealthUnitRequest =
            serde_json::from_str(r#"{"description": "Residential care in Braga"}"#).unwrap();
        let updated = service
            .update_mine(&fixtures::user("boss", ClientKind::Business), request.clone())
            .await
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("Residential care in Braga"));

        let err = service
            .update_mine(&fixtures::user("carer", ClientKind::Business), request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthorizationError(_)));
    }
}
