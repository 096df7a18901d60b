//! `/api/v1/events`, the caller's health unit calendar.

use actix_web::{delete, get, patch, post, web, HttpResponse};

use crate::core::errors::AppError;
use crate::domain::dto::events::{CalendarWindow, CreateEventRequest, UpdateEventRequest};
use crate::domain::dto::{ApiResponse, ListQuery};
use crate::domain::models::auth::AuthenticatedUser;
use crate::services::events::EventService;

#[get("")]
pub async fn list(
    service: web::Data<EventService>,
    user: AuthenticatedUser,
    window: web::Query<CalendarWindow>,
    page: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.list(&user, window.into_inner(), &page.options()).await?)
}

#[post("")]
pub async fn create(
    service: web::Data<EventService>,
    user: AuthenticatedUser,
    payload: web::Json<CreateEventRequest>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::created(&service.create(&user, payload.into_inner()).await?)
}

#[get("/{event_id}")]
pub async fn get(
    service: web::Data<EventService>,
    user: AuthenticatedUser,
    event_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.get(&user, &event_id).await?)
}

#[patch("/{event_id}")]
pub async fn update(
    service: web::Data<EventService>,
    user: AuthenticatedUser,
    event_id: web::Path<String>,
    payload: web::Json<UpdateEventRequest>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.update(&user, &event_id, payload.into_inner()).await?)
}

#[delete("/{event_id}")]
pub async fn delete(
    service: web::Data<EventService>,
    user: AuthenticatedUser,
    event_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.delete(&user, &event_id).await?)
}
