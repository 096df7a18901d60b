//! `/api/v1/services`: public reads, admin writes.

use actix_web::{delete, get, patch, post, web, HttpResponse};

use crate::core::errors::AppError;
use crate::domain::dto::catalog::{CatalogFilter, CreateServiceRequest, UpdateServiceRequest};
use crate::domain::dto::{ApiResponse, ListQuery};
use crate::services::catalog::CatalogService;

#[get("")]
pub async fn list(
    service: web::Data<CatalogService>,
    filter: web::Query<CatalogFilter>,
    page: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.list(filter.into_inner(), &page.options()).await?)
}

#[get("/{service_id}")]
pub async fn get(service: web::Data<CatalogService>, service_id: web::Path<String>) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.get(&service_id).await?)
}

#[post("")]
pub async fn create(
    service: web::Data<CatalogService>,
    payload: web::Json<CreateServiceRequest>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::created(&service.create(payload.into_inner()).await?)
}

#[patch("/{service_id}")]
pub async fn update(
    service: web::Data<CatalogService>,
    service_id: web::Path<String>,
    payload: web::Json<UpdateServiceRequest>,
) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.update(&service_id, payload.into_inner()).await?)
}

#[delete("/{service_id}")]
pub async fn delete(service: web::Data<CatalogService>, service_id: web::Path<String>) -> Result<HttpResponse, AppError> {
    ApiResponse::ok(&service.delete(&service_id).await?)
}
