//! `/api/v1/orders`, shared by the marketplace and business apps.
//!
//! Listing depends on the calling app: customers see their own orders,
//! collaborators see their health unit's. Who may apply which status
//! change is decided by [`OrderService::transition`].

use actix_web::{get, post, web, HttpResponse};

use crate::core::errors::AppError;
use crate::domain::dto::orders::{OrderFilter, PlaceOrderRequest};
use crate::domain::dto::{ApiResponse, ListQuery};
use crate::domain::entities::OrderStatus;
use crate::domain::models::auth::{AuthenticatedUser, ClientKind};
use crate::services::orders::OrderService;

#[post("")]
pub async fn place(
    service: web::Data<OrderService>,
    user: AuthenticatedUser,
    payload: web::Json<PlaceOrderRequest>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::created(&service.place(&user, payload.into_inner()).await?)
}

#[get("")]
pub async fn list(
    service: web::Data<OrderService>,
    user: AuthenticatedUser,
    filter: web::Query<OrderFilter>,
    page: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let page = match user.client {
        ClientKind::Marketplace => service.list_for_customer(&user, filter.into_inner(), &page.options()).await?,
        ClientKind::Business => service.list_for_health_unit(&user, filter.into_inner(), &page.options()).await?,
        ClientKind::Admin => {
            return Err(AppError::AuthorizationError(
                "Order listings are per customer or health unit".to_string(),
            ));
        }
    };
    ApiResponse::ok(&page)
}

#[get("/{order_id}")]
pub async fn get(
    service: web::Data<OrderService>,
    user: AuthenticatedUser,
    order_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.get(&user, &order_id).await?)
}

async fn transition(
    service: &OrderService,
    user: &AuthenticatedUser,
    order_id: &str,
    next: OrderStatus,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.transition(user, order_id, next).await?)
}

#[post("/{order_id}/accept")]
pub async fn accept(
    service: web::Data<OrderService>,
    user: AuthenticatedUser,
    order_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    transition(&service, &user, &order_id, OrderStatus::Accepted).await
}

#[post("/{order_id}/reject")]
pub async fn reject(
    service: web::Data<OrderService>,
    user: AuthenticatedUser,
    order_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    transition(&service, &user, &order_id, OrderStatus::Rejected).await
}

#[post("/{order_id}/complete")]
pub async fn complete(
    service: web::Data<OrderService>,
    user: AuthenticatedUser,
    order_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    transition(&service, &user, &order_id, OrderStatus::Completed).await
}

#[post("/{order_id}/cancel")]
pub async fn cancel(
    service: web::Data<OrderService>,
    user: AuthenticatedUser,
    order_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    transition(&service, &user, &order_id, OrderStatus::Cancelled).await
}

/// Creates the payment intent and returns its client secret.
#[post("/{order_id}/checkout")]
pub async fn checkout(
    service: web::Data<OrderService>,
    user: AuthenticatedUser,
    order_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.checkout(&user, &order_id).await?)
}
