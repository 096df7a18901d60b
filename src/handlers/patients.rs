//! `/api/v1/patients`, owner-only.

use actix_web::{delete, get, patch, post, web, HttpResponse};

use crate::core::errors::AppError;
use crate::domain::dto::patients::{CreatePatientRequest, UpdatePatientRequest};
use crate::domain::dto::{ApiResponse, ListQuery};
use crate::domain::models::auth::AuthenticatedUser;
use crate::services::patients::PatientService;

#[get("")]
pub async fn list(
    service: web::Data<PatientService>,
    user: AuthenticatedUser,
    page: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.list(&user, &page.options()).await?)
}

#[post("")]
pub async fn create(
    service: web::Data<PatientService>,
    user: AuthenticatedUser,
    payload: web::Json<CreatePatientRequest>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::created(&service.create(&user, payload.into_inner()).await?)
}

#[get("/{patient_id}")]
pub async fn get(
    service: web::Data<PatientService>,
    user: AuthenticatedUser,
    patient_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.get(&user, &patient_id).await?)
}

#[patch("/{patient_id}")]
pub async fn update(
    service: web::Data<PatientService>,
    user: AuthenticatedUser,
    patient_id: web::Path<String>,
    payload: web::Json<UpdatePatientRequest>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.update(&user, &patient_id, payload.into_inner()).await?)
}

#[delete("/{patient_id}")]
pub async fn delete(
    service: web::Data<PatientService>,
    user: AuthenticatedUser,
    patient_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.delete(&user, &patient_id).await?)
}
