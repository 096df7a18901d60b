//! `/api/v1/customers`

use actix_web::{get, patch, post, web, HttpResponse};

use crate::core::errors::AppError;
use crate::domain::dto::customers::{SignUpRequest, UpdateCustomerRequest};
use crate::domain::dto::ApiResponse;
use crate::domain::models::auth::AuthenticatedUser;
use crate::services::customers::CustomerService;

/// Public sign-up from the marketplace app.
#[post("")]
pub async fn sign_up(
    service: web::Data<CustomerService>,
    payload: web::Json<SignUpRequest>,
) -> Result<HttpResponse, AppError> {
    let customer = service.sign_up(payload.into_inner()).await?;
    ApiResponse::created(&customer)
}

#[get("")]
pub async fn me(service: web::Data<CustomerService>, user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.me(&user).await?)
}

#[patch("")]
pub async fn update_me(
    service: web::Data<CustomerService>,
    user: AuthenticatedUser,
    payload: web::Json<UpdateCustomerRequest>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.update_me(&user, payload.into_inner()).await?)
}
