use std::sync::Arc;

use mongodb::bson::doc;
use validator::Validate;

use crate::core::errors::AppResult;
use crate::domain::dto::changes;
use crate::domain::dto::customers::{SignUpRequest, UpdateCustomerRequest};
use crate::domain::entities::Customer;
use crate::domain::models::auth::AuthenticatedUser;
use crate::repositories::Repositories;
use crate::services::callers::{customer_of, id_of};
use crate::services::identity::{IdentityProvider, UserGroup};
use crate::services::mail::{templates, Mailer};
use crate::services::orchestration::compensate;
use crate::services::payments::PaymentProvider;

pub struct CustomerService {
    repos: Repositories,
    identity: Arc<dyn IdentityProvider>,
    payments: Arc<dyn PaymentProvider>,
    mailer: Arc<dyn Mailer>,
}

impl CustomerService {
    pub fn new(
        repos: Repositories,
        identity: Arc<dyn IdentityProvider>,
        payments: Arc<dyn PaymentProvider>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self { repos, identity, payments, mailer }
    }

    /// Registers a marketplace customer.
    ///
    /// Cognito user → Stripe customer → `customers` record → welcome email.
    /// A failure before the record is stored deletes the Cognito user; the
    /// Stripe customer has no side effects and is left in place.
    pub async fn sign_up(&self, request: SignUpRequest) -> AppResult<Customer> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        let sub = self
            .identity
            .create_user(&email, &request.name, UserGroup::Customers)
            .await?;
        log::info!("Cognito customer created: {}", email);

        let stripe_customer = match self.payments.create_customer(&email, &request.name).await {
            Ok(id) => id,
            Err(e) => {
                compensate("delete Cognito user", self.identity.delete_user(&email)).await;
                return Err(e);
            }
        };
        log::info!("Stripe customer created: {}", stripe_customer);

        let mut customer = Customer::new(sub, request.name, email.clone());
        customer.phone = request.phone;
        customer.address = request.address;
        customer.stripe_customer_id = Some(stripe_customer.clone());

        let customer = match self.repos.customers.create(customer, None).await {
            Ok(customer) => customer,
            Err(e) => {
                compensate("delete Cognito user", self.identity.delete_user(&email)).await;
                log::warn!("Stripe customer {} left without a marketplace record", stripe_customer);
                return Err(e);
            }
        };

        if let Err(e) = self.mailer.send(templates::welcome(&email, &customer.name)).await {
            log::warn!("Welcome email to {} not sent: {}", email, e);
        }

        Ok(customer)
    }

    pub async fn me(&self, user: &AuthenticatedUser) -> AppResult<Customer> {
        customer_of(&self.repos, user).await
    }

    pub async fn update_me(
        &self,
        user: &AuthenticatedUser,
        request: UpdateCustomerRequest,
    ) -> AppResult<Customer> {
        request.validate()?;
        let customer = customer_of(&self.repos, user).await?;
        let fields = changes(&request)?;
        self.repos
            .customers
            .update_by_id(&id_of(customer.id)?.to_hex(), fields, None)
            .await
    }

    /// Looks a customer up by email (back-office).
    pub async fn find_by_email(&self, email: &str) -> AppResult<Customer> {
        self.repos
            .customers
            .query_one(doc! { "email": email.trim().to_lowercase() }, None)
            .await
    }
}
