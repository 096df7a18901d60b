//! `/api/v1/health-units`

use actix_web::{get, patch, post, web, HttpResponse};

use crate::core::errors::AppError;
use crate::domain::dto::health_units::{HealthUnitFilter, OnboardRequest, OnboardingLink, UpdateHealthUnitRequest};
use crate::domain::dto::{ApiResponse, ListQuery};
use crate::domain::models::auth::AuthenticatedUser;
use crate::services::health_units::HealthUnitService;

/// Public onboarding: Stripe account, admin login and the unit itself.
#[post("")]
pub async fn onboard(
    service: web::Data<HealthUnitService>,
    payload: web::Json<OnboardRequest>,
) -> Result<HttpResponse, AppError> {
    let onboarded = service.onboard(payload.into_inner()).await?;
    ApiResponse::created(&onboarded)
}

#[get("")]
pub async fn list(
    service: web::Data<HealthUnitService>,
    filter: web::Query<HealthUnitFilter>,
    page: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.list(filter.into_inner(), &page.options()).await?)
}

#[get("/{health_unit_id}")]
pub async fn get(
    service: web::Data<HealthUnitService>,
    health_unit_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.get(&health_unit_id).await?)
}

#[get("")]
pub async fn mine(service: web::Data<HealthUnitService>, user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.mine(&user).await?)
}

#[patch("")]
pub async fn update_mine(
    service: web::Data<HealthUnitService>,
    user: AuthenticatedUser,
    payload: web::Json<UpdateHealthUnitRequest>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.update_mine(&user, payload.into_inner()).await?)
}

/// Fresh Stripe onboarding link for an unfinished account.
#[get("/onboarding-link")]
pub async fn onboarding_link(
    service: web::Data<HealthUnitService>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let url = service.onboarding_link(&user).await?;
    ApiResponse::ok(&OnboardingLink { url })
}
