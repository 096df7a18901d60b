//! Resolves the authenticated caller to its marketplace record.

use mongodb::bson::doc;

use crate::core::errors::{AppError, AppResult};
use crate::domain::entities::{Collaborator, Customer};
use crate::domain::models::auth::AuthenticatedUser;
use crate::repositories::Repositories;

fn no_profile(what: &str) -> impl FnOnce(AppError) -> AppError + '_ {
    move |e| match e {
        AppError::NotFound(_) => {
            AppError::AuthorizationError(format!("No {} profile for this account", what))
        }
        other => other,
    }
}

pub async fn customer_of(repos: &Repositories, user: &AuthenticatedUser) -> AppResult<Customer> {
    repos
        .customers
        .query_one(doc! { "cognitoId": user.sub.as_str() }, None)
        .await
        .map_err(no_profile("customer"))
}

pub async fn member_of(repos: &Repositories, user: &AuthenticatedUser) -> AppResult<Collaborator> {
    repos
        .collaborators
        .query_one(doc! { "cognitoId": user.sub.as_str() }, None)
        .await
        .map_err(no_profile("collaborator"))
}

/// Collaborator allowed to change orders, staff and the unit profile.
pub async fn manager_of(repos: &Repositories, user: &AuthenticatedUser) -> AppResult<Collaborator> {
    let member = member_of(repos, user).await?;
    if !member.role.can_manage() {
        return Err(AppError::AuthorizationError(
            "Only admins and managers can do this".to_string(),
        ));
    }
    Ok(member)
}

/// Identifier of a stored entity. Stored entities always carry one.
pub(crate) fn id_of(id: Option<mongodb::bson::oid::ObjectId>) -> AppResult<mongodb::bson::oid::ObjectId> {
    id.ok_or_else(|| AppError::InternalError("stored document without _id".to_string()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::domain::entities::{CollaboratorRole, HealthUnit, HealthUnitKind};
    use crate::domain::models::auth::ClientKind;

    pub fn user(sub: &str, client: ClientKind) -> AuthenticatedUser {
        AuthenticatedUser {
            sub: sub.to_string(),
            email: None,
            groups: vec![client.group().name().to_string()],
            client,
        }
    }

    pub async fn customer(repos: &Repositories, sub: &str) -> Customer {
        let mut customer = Customer::new(sub.to_string(), "Ana Silva".to_string(), format!("{}@example.pt", sub));
        customer.stripe_customer_id = Some(format!("cus_{}", sub));
        repos.customers.create(customer, None).await.unwrap()
    }

    pub async fn health_unit(repos: &Repositories, email: &str) -> HealthUnit {
        let mut unit = HealthUnit::new("Lar Sol".to_string(), email.to_string(), HealthUnitKind::Company);
        unit.stripe_account_id = Some("acct_1".to_string());
        unit.charges_enabled = true;
        repos.health_units.create(unit, None).await.unwrap()
    }

    pub async fn member(
        repos: &Repositories,
        sub: &str,
        unit: &HealthUnit,
        role: CollaboratorRole,
    ) -> Collaborator {
        let collaborator = Collaborator::new(
            sub.to_string(),
            "Rui Costa".to_string(),
            format!("{}@lar.pt", sub),
            role,
            unit.id.unwrap(),
        );
        repos.collaborators.create(collaborator, None).await.unwrap()
    }
}
