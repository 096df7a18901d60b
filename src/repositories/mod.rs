//! Data access layer.
//!
//! One [`Repository`] per entity, all sharing a single
//! [`DocumentStore`]. [`Repositories`] is built once in `main` and handed
//! to handlers and services through `web::Data`.
//!
//! ```rust,ignore
//! let repos = Repositories::new(store, RepositoryConfig::deletion_policy(), RepositoryConfig::max_page_size());
//! repos.ensure_indexes().await?;
//!
//! let mut scope = repos.begin().await?;
//! repos.reviews.create(review, Some(&mut scope)).await?;
//! scope.commit().await?;
//! ```

pub mod page;
pub mod repository;

pub use page::Page;
pub use repository::{DeletionPolicy, ListOptions, Repository};

use std::sync::Arc;

use crate::core::errors::{AppError, AppResult};
use crate::db::scope::TransactionScope;
use crate::db::store::DocumentStore;
use crate::domain::entities::{
    Collaborator, Customer, Event, HealthUnit, Order, Patient, Review, Service,
};

/// Every repository of the service.
#[derive(Clone)]
pub struct Repositories {
    store: Arc<dyn DocumentStore>,
    pub customers: Repository<Customer>,
    pub health_units: Repository<HealthUnit>,
    pub collaborators: Repository<Collaborator>,
    pub patients: Repository<Patient>,
    pub services: Repository<Service>,
    pub orders: Repository<Order>,
    pub reviews: Repository<Review>,
    pub events: Repository<Event>,
}

impl Repositories {
    pub fn new(store: Arc<dyn DocumentStore>, deletion: DeletionPolicy, max_page_size: i64) -> Self {
        Self {
            customers: Repository::new(Arc::clone(&store), deletion.clone(), max_page_size),
            health_units: Repository::new(Arc::clone(&store), deletion.clone(), max_page_size),
            collaborators: Repository::new(Arc::clone(&store), deletion.clone(), max_page_size),
            patients: Repository::new(Arc::clone(&store), deletion.clone(), max_page_size),
            services: Repository::new(Arc::clone(&store), deletion.clone(), max_page_size),
            orders: Repository::new(Arc::clone(&store), deletion.clone(), max_page_size),
            reviews: Repository::new(Arc::clone(&store), deletion.clone(), max_page_size),
            events: Repository::new(Arc::clone(&store), deletion, max_page_size),
            store,
        }
    }

    /// Opens a unit of work spanning any of the repositories.
    pub async fn begin(&self) -> AppResult<TransactionScope> {
        self.store
            .begin()
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to open transaction scope: {}", e)))
    }

    /// Creates the unique indexes of every collection.
    pub async fn ensure_indexes(&self) -> AppResult<()> {
        self.customers.ensure_indexes().await?;
        self.health_units.ensure_indexes().await?;
        self.collaborators.ensure_indexes().await?;
        self.patients.ensure_indexes().await?;
        self.services.ensure_indexes().await?;
        self.orders.ensure_indexes().await?;
        self.reviews.ensure_indexes().await?;
        self.events.ensure_indexes().await?;
        log::info!("✅ Unique indexes ensured");
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Repositories {
    /// Repositories over a fresh [`MemoryStore`](crate::db::memory_store::MemoryStore).
    pub fn in_memory() -> (Self, Arc<crate::db::memory_store::MemoryStore>) {
        let store = Arc::new(crate::db::memory_store::MemoryStore::new());
        let repos = Self::new(store.clone(), DeletionPolicy::Hard, 1000);
        (repos, store)
    }
}
