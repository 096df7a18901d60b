use mongodb::bson::{doc, oid::ObjectId, Bson};
use validator::Validate;

use crate::core::errors::{AppError, AppResult};
use crate::db::scope::TransactionScope;
use crate::domain::dto::patients::{CreatePatientRequest, UpdatePatientRequest};
use crate::domain::entities::{Customer, OrderStatus, Patient};
use crate::domain::models::auth::AuthenticatedUser;
use crate::repositories::{ListOptions, Page, Repositories};
use crate::services::callers::{customer_of, id_of};
use crate::services::orchestration::finish;

/// Orders that still need the patient record.
const OPEN_STATUSES: [OrderStatus; 4] = [
    OrderStatus::Pending,
    OrderStatus::Accepted,
    OrderStatus::Paid,
    OrderStatus::PaymentFailed,
];

/// Care recipients of the calling customer. The customer's `patients`
/// array is kept in step with the collection in the same scope.
pub struct PatientService {
    repos: Repositories,
}

impl PatientService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn list(&self, user: &AuthenticatedUser, options: &ListOptions) -> AppResult<Page<Patient>> {
        let customer = customer_of(&self.repos, user).await?;
        self.repos
            .patients
            .query_list(doc! { "customer": id_of(customer.id)? }, options, None)
            .await
    }

    pub async fn get(&self, user: &AuthenticatedUser, id: &str) -> AppResult<Patient> {
        let customer = customer_of(&self.repos, user).await?;
        self.owned(&customer, id).await
    }

    pub async fn create(&self, user: &AuthenticatedUser, request: CreatePatientRequest) -> AppResult<Patient> {
        request.validate()?;
        let customer = customer_of(&self.repos, user).await?;
        let customer_id = id_of(customer.id)?;

        let mut scope = self.repos.begin().await?;
        let result = self.create_in(&mut scope, customer_id, request).await;
        let patient = finish(scope, result).await?;
        log::info!("Patient {} added for customer {}", patient.name, customer_id);
        Ok(patient)
    }

    async fn create_in(
        &self,
        scope: &mut TransactionScope,
        customer_id: ObjectId,
        request: CreatePatientRequest,
    ) -> AppResult<Patient> {
        let patient = self
            .repos
            .patients
            .create(request.into_patient(customer_id), Some(&mut *scope))
            .await?;
        let customer = self.repos.customers.retrieve(&customer_id.to_hex(), Some(&mut *scope)).await?;
        let mut patients = customer.patients;
        patients.push(id_of(patient.id)?);
        self.set_patients(scope, customer_id, patients).await?;
        Ok(patient)
    }

    pub async fn update(
        &self,
        user: &AuthenticatedUser,
        id: &str,
        request: UpdatePatientRequest,
    ) -> AppResult<Patient> {
        request.validate()?;
        let customer = customer_of(&self.repos, user).await?;
        let patient = self.owned(&customer, id).await?;
        self.repos
            .patients
            .update_by_id(&id_of(patient.id)?.to_hex(), request.changes()?, None)
            .await
    }

    /// Refused while an order for the patient is still open.
    pub async fn delete(&self, user: &AuthenticatedUser, id: &str) -> AppResult<Patient> {
        let customer = customer_of(&self.repos, user).await?;
        let patient = self.owned(&customer, id).await?;
        let patient_id = id_of(patient.id)?;

        let open: Vec<&str> = OPEN_STATUSES.iter().map(|s| s.as_str()).collect();
        let orders = self
            .repos
            .orders
            .query_list(
                doc! { "patient": patient_id, "status": { "$in": open } },
                &ListOptions::page(1, 1),
                None,
            )
            .await?;
        if orders.total_documents > 0 {
            return Err(AppError::InvalidParameter("Patient has open orders".to_string()));
        }

        let mut scope = self.repos.begin().await?;
        let result = self.delete_in(&mut scope, id_of(customer.id)?, patient_id).await;
        finish(scope, result).await
    }

    async fn delete_in(
        &self,
        scope: &mut TransactionScope,
        customer_id: ObjectId,
        patient_id: ObjectId,
    ) -> AppResult<Patient> {
        let removed = self.repos.patients.delete(&patient_id.to_hex(), Some(&mut *scope)).await?;
        let customer = self.repos.customers.retrieve(&customer_id.to_hex(), Some(&mut *scope)).await?;
        let patients = customer.patients.into_iter().filter(|p| *p != patient_id).collect();
        self.set_patients(scope, customer_id, patients).await?;
        Ok(removed)
    }

    async fn set_patients(
        &self,
        scope: &mut TransactionScope,
        customer_id: ObjectId,
        patients: Vec<ObjectId>,
    ) -> AppResult<Customer> {
        let patients: Vec<Bson> = patients.into_iter().map(Bson::ObjectId).collect();
        self.repos
            .customers
            .update_by_id(&customer_id.to_hex(), doc! { "patients": patients }, Some(&mut *scope))
            .await
    }

    async fn owned(&self, customer: &Customer, id: &str) -> AppResult<Patient> {
        let patient = self.repos.patients.retrieve(id, None).await?;
        if !patient.belongs_to(&id_of(customer.id)?) {
            return Err(AppError::NotFound("patients document not found".to_string()));
        }
        Ok(patient)
    }
}
