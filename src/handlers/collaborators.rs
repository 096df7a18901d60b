//! `/api/v1/collaborators`, all scoped to the caller's health unit.

use actix_web::{delete, get, patch, post, web, HttpResponse};

use crate::core::errors::AppError;
use crate::domain::dto::collaborators::{CreateCollaboratorRequest, UpdateCollaboratorRequest};
use crate::domain::dto::{ApiResponse, ListQuery};
use crate::domain::models::auth::AuthenticatedUser;
use crate::services::collaborators::CollaboratorService;

#[get("")]
pub async fn list(
    service: web::Data<CollaboratorService>,
    user: AuthenticatedUser,
    page: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.list(&user, &page.options()).await?)
}

#[post("")]
pub async fn add(
    service: web::Data<CollaboratorService>,
    user: AuthenticatedUser,
    payload: web::Json<CreateCollaboratorRequest>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::created(&service.add(&user, payload.into_inner()).await?)
}

#[get("/me")]
pub async fn me(service: web::Data<CollaboratorService>, user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.me(&user).await?)
}

#[get("/{collaborator_id}")]
pub async fn get(
    service: web::Data<CollaboratorService>,
    user: AuthenticatedUser,
    collaborator_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.get(&user, &collaborator_id).await?)
}

#[patch("/{collaborator_id}")]
pub async fn update(
    service: web::Data<CollaboratorService>,
    user: AuthenticatedUser,
    collaborator_id: web::Path<String>,
    payload: web::Json<UpdateCollaboratorRequest>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.update(&user, &collaborator_id, payload.into_inner()).await?)
}

#[delete("/{collaborator_id}")]
pub async fn remove(
    service: web::Data<CollaboratorService>,
    user: AuthenticatedUser,
    collaborator_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.remove(&user, &collaborator_id).await?)
}
