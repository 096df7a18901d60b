//! `/api/v1/reviews`

use actix_web::{get, post, web, HttpResponse};

use crate::core::errors::AppError;
use crate::domain::dto::reviews::{ReviewFilter, SubmitReviewRequest};
use crate::domain::dto::{ApiResponse, ListQuery};
use crate::domain::models::auth::AuthenticatedUser;
use crate::services::reviews::ReviewService;

/// Public, newest first.
#[get("")]
pub async fn list(
    service: web::Data<ReviewService>,
    filter: web::Query<ReviewFilter>,
    page: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.list_for_health_unit(&filter.health_unit, &page.options()).await?)
}

#[post("")]
pub async fn submit(
    service: web::Data<ReviewService>,
    user: AuthenticatedUser,
    payload: web::Json<SubmitReviewRequest>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::created(&service.submit(&user, payload.into_inner()).await?)
}
