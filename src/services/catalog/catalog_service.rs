use mongodb::bson::{doc, Document};
use validator::Validate;

use crate::core::errors::{AppError, AppResult};
use crate::domain::dto::catalog::{CatalogFilter, CreateServiceRequest, UpdateServiceRequest};
use crate::domain::dto::changes;
use crate::domain::entities::Service;
use crate::repositories::{ListOptions, Page, Repositories};
use crate::services::callers::id_of;

/// Marketplace-wide catalogue of care services, curated by admins.
pub struct CatalogService {
    repos: Repositories,
}

impl CatalogService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn list(&self, filter: CatalogFilter, options: &ListOptions) -> AppResult<Page<Service>> {
        let mut query = Document::new();
        if let Some(category) = filter.category {
            query.insert("category", category);
        }
        let options = match options.sort {
            Some(_) => options.clone(),
            None => options.clone().sort(doc! { "name": 1 }),
        };
        self.repos.services.query_list(query, &options, None).await
    }

    pub async fn get(&self, id: &str) -> AppResult<Service> {
        self.repos.services.retrieve(id, None).await
    }

    pub async fn create(&self, request: CreateServiceRequest) -> AppResult<Service> {
        request.validate()?;
        let service = self.repos.services.create(request.into_service(), None).await?;
        log::info!("Catalogue service created: {}", service.name);
        Ok(service)
    }

    pub async fn update(&self, id: &str, request: UpdateServiceRequest) -> AppResult<Service> {
        request.validate()?;
        self.repos.services.update_by_id(id, changes(&request)?, None).await
    }

    /// Refused while any health unit still offers the service.
    pub async fn delete(&self, id: &str) -> AppResult<Service> {
        let service = self.repos.services.retrieve(id, None).await?;
        let offering = self
            .repos
            .health_units
            .query_list(doc! { "services": id_of(service.id)? }, &ListOptions::page(1, 1), None)
            .await?;
        if offering.total_documents > 0 {
            return Err(AppError::InvalidParameter(format!(
                "Service is offered by {} health unit(s)",
                offering.total_documents
            )));
        }
        self.repos.services.delete(id, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::callers::fixtures;

    fn create(name: &str, category: &str) -> CreateServiceRequest {
        serde_json::from_value(serde_json::json!({ "name": name, "category": category })).unwrap()
    }

    #[actix_web::test]
    async fn test_list_by_category_sorted_by_name() {
        let (repos, _) = Repositories::in_memory();
        let service = CatalogService::new(repos);
        service.create(create("Physiotherapy", "therapy")).await.unwrap();
        service.create(create("Night care", "care")).await.unwrap();
        service.create(create("Home care", "care")).await.unwrap();

        let page = service
            .list(CatalogFilter { category: Some("care".to_string()) }, &ListOptions::default())
            .await
            .unwrap();
        let names: Vec<_> = page.data.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Home care", "Night care"]);
    }

    #[actix_web::test]
    async fn test_offered_service_cannot_be_deleted() {
        let (repos, _) = Repositories::in_memory();
        let service = CatalogService::new(repos.clone());
        let care = service.create(create("Home care", "care")).await.unwrap();
        let unused = service.create(create("Night care", "care")).await.unwrap();
        let unit = fixtures::health_unit(&repos, "a@lar.pt").await;
        repos
            .health_units
            .update_by_id(&unit.id.unwrap().to_hex(), doc! { "services": [care.id.unwrap()] }, None)
            .await
            .unwrap();

        let err = service.delete(&care.id.unwrap().to_hex()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
        assert!(service.delete(&unused.id.unwrap().to_hex()).await.is_ok());
    }

    #[actix_web::test]
    async fn test_empty_update_is_rejected() {
        let (repos, _) = Repositories::in_memory();
        let service = CatalogService::new(repos);
        let care = service.create(create("Home care", "care")).await.unwrap();

        let request: UpdateServiceRequest = serde_json::from_str("{}").unwrap();
        let err = service.update(&care.id.unwrap().to_hex(), request).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
    }
}
