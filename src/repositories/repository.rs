//! # Generic Repository
//!
//! [`Repository<T>`] is the single CRUD + pagination contract every
//! collection goes through. It is bound to one [`Entity`] type (and so one
//! collection) for its whole lifetime.
//!
//! ## Contract
//!
//! | Operation | Success | Failure kinds |
//! |-----------|---------|---------------|
//! | [`create`](Repository::create) | stored document, fresh `_id`, timestamps | INVALID_PARAMETER (validation, duplicate key), INTERNAL_ERROR |
//! | [`retrieve`](Repository::retrieve) | document | NOT_FOUND (absent or malformed id), INTERNAL_ERROR |
//! | [`update`](Repository::update) | post-update document | NOT_FOUND, INVALID_PARAMETER, INTERNAL_ERROR |
//! | [`delete`](Repository::delete) | pre-delete snapshot | NOT_FOUND, INTERNAL_ERROR |
//! | [`query_list`](Repository::query_list) | [`Page`] | INTERNAL_ERROR only |
//! | [`query_one`](Repository::query_one) | first match | NOT_FOUND, INVALID_PARAMETER, INTERNAL_ERROR |
//!
//! Every method takes an optional [`TransactionScope`]. When a call made
//! with a scope fails, the scope is aborted before the mapped error is
//! returned; the repository never commits.
//!
//! ```rust,ignore
//! let unit = repos.health_units.create(HealthUnit::new(name, email, kind), None).await?;
//! let page = repos.orders
//!     .query_list(doc! { "healthUnit": unit.id }, &ListOptions::page(2, 10), None)
//!     .await?;
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use futures_util::future::try_join;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, DateTime, Document};
use serde::de::DeserializeOwned;

use crate::core::errors::{AppError, AppResult, ErrorKind};
use crate::core::taxonomy::{repository_error, Operation};
use crate::db::scope::TransactionScope;
use crate::db::store::{set_path, DocumentStore, FindQuery, Populate, StoreError};
use crate::domain::entities::Entity;
use crate::repositories::page::{Page, Window};

/// Storage metadata removed from deletion snapshots.
const INTERNAL_FIELDS: &[&str] = &["__v"];

/// What `delete` does besides removing the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeletionPolicy {
    #[default]
    Hard,
    /// Copies `{collection, documentId, snapshot, deletedAt}` into
    /// `collection` before removing the document.
    Tombstone { collection: String },
}

/// Sort, window, projection and reference resolution for list queries.
#[derive(Debug, Clone, PartialEq)]
pub struct ListOptions {
    /// Defaults to newest first.
    pub sort: Option<Document>,
    pub page: i64,
    pub page_size: i64,
    pub populate: Vec<Populate>,
    pub projection: Option<Document>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            sort: None,
            page: 1,
            page_size: 10,
            populate: Vec::new(),
            projection: None,
        }
    }
}

impl ListOptions {
    pub fn page(page: i64, page_size: i64) -> Self {
        Self { page, page_size, ..Default::default() }
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn populate(mut self, populate: &[Populate]) -> Self {
        self.populate = populate.to_vec();
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }
}

pub(crate) fn parse_id(id: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse_str(id).map_err(|_| StoreError::MalformedId(id.to_string()))
}

fn normalize_id(value: Bson) -> Result<Bson, StoreError> {
    match value {
        Bson::String(raw) => Ok(Bson::ObjectId(parse_id(&raw)?)),
        Bson::Array(items) => items
            .into_iter()
            .map(normalize_id)
            .collect::<Result<Vec<_>, _>>()
            .map(Bson::Array),
        Bson::Document(operators) if operators.keys().all(|k| k.starts_with('$')) => {
            let mut normalized = Document::new();
            for (op, operand) in operators {
                normalized.insert(op, normalize_id(operand)?);
            }
            Ok(Bson::Document(normalized))
        }
        other => Ok(other),
    }
}

/// Turns string identifiers under `_id` into ObjectIds.
pub(crate) fn normalize_filter(mut filter: Document) -> Result<Document, StoreError> {
    if let Some(value) = filter.remove("_id") {
        filter.insert("_id", normalize_id(value)?);
    }
    Ok(filter)
}

fn strip_internal(mut document: Document) -> Document {
    for field in INTERNAL_FIELDS {
        document.remove(*field);
    }
    document
}

fn decode<O: DeserializeOwned>(document: Document) -> Result<O, StoreError> {
    Ok(bson::from_document(document)?)
}

fn ensure_active(scope: &Option<&mut TransactionScope>) -> Result<(), StoreError> {
    match scope {
        Some(scope) => scope.ensure_active(),
        None => Ok(()),
    }
}

/// Typed repository over one collection.
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    deletion: DeletionPolicy,
    max_page_size: i64,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            deletion: self.deletion.clone(),
            max_page_size: self.max_page_size,
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>, deletion: DeletionPolicy, max_page_size: i64) -> Self {
        Self {
            store,
            deletion,
            max_page_size,
            _entity: PhantomData,
        }
    }

    pub fn collection(&self) -> &'static str {
        T::COLLECTION
    }

    /// Creates the unique indexes declared by `T`.
    pub async fn ensure_indexes(&self) -> AppResult<()> {
        self.store
            .ensure_unique(T::COLLECTION, T::UNIQUE_FIELDS)
            .await
            .map_err(|e| AppError::InternalError(format!("{} index creation failed: {}", T::COLLECTION, e)))
    }

    /// Maps a store fault, aborting `scope` if one was supplied.
    async fn settle<R>(
        &self,
        operation: Operation,
        result: Result<R, StoreError>,
        scope: Option<&mut TransactionScope>,
    ) -> AppResult<R> {
        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let mapped = repository_error(operation, T::COLLECTION, &error);
        if mapped.kind() == ErrorKind::InternalError {
            log::error!("[{}] {} failed: {}", T::COLLECTION, operation, error);
        } else {
            log::warn!("[{}] {} rejected ({}): {}", T::COLLECTION, operation, mapped.kind(), error);
        }

        if let Some(scope) = scope {
            scope.abort().await;
        }
        Err(mapped)
    }

    /// Persists `entity` under a freshly generated identifier.
    ///
    /// Any `id` on the input is ignored. `createdAt` and `updatedAt` are set
    /// to the same instant.
    pub async fn create(&self, entity: T, mut scope: Option<&mut TransactionScope>) -> AppResult<T> {
        let result = self.try_create(entity, scope.as_deref_mut()).await;
        self.settle(Operation::Create, result, scope).await
    }

    async fn try_create(&self, entity: T, scope: Option<&mut TransactionScope>) -> Result<T, StoreError> {
        ensure_active(&scope)?;

        let fields = bson::to_document(&entity)?;
        log::debug!("[{}] create request: {}", T::COLLECTION, fields);
        entity.validate().map_err(|e| StoreError::Validation(e.to_string()))?;

        let now = DateTime::now();
        let mut document = doc! { "_id": ObjectId::new() };
        for (field, value) in fields {
            if field != "_id" {
                document.insert(field, value);
            }
        }
        document.insert("createdAt", now);
        document.insert("updatedAt", now);

        self.store.insert(T::COLLECTION, document.clone(), scope).await?;
        log::debug!("[{}] create response: {}", T::COLLECTION, document);

        decode(document)
    }

    pub async fn retrieve(&self, id: &str, scope: Option<&mut TransactionScope>) -> AppResult<T> {
        self.retrieve_as::<T>(id, &[], scope).await
    }

    /// Looks a document up by id, resolving `populate` references, and
    /// decodes it as `O`.
    pub async fn retrieve_as<O: DeserializeOwned>(
        &self,
        id: &str,
        populate: &[Populate],
        mut scope: Option<&mut TransactionScope>,
    ) -> AppResult<O> {
        let result = self
            .try_retrieve(id, populate, scope.as_deref_mut())
            .await
            .and_then(decode);
        self.settle(Operation::Retrieve, result, scope).await
    }

    async fn try_retrieve(
        &self,
        id: &str,
        populate: &[Populate],
        scope: Option<&mut TransactionScope>,
    ) -> Result<Document, StoreError> {
        ensure_active(&scope)?;
        log::debug!("[{}] retrieve request: id={} populate={:?}", T::COLLECTION, id, populate);

        let object_id = parse_id(id)?;
        let query = FindQuery::by_id(object_id).populate(populate);
        let found = self
            .store
            .find_one(T::COLLECTION, &query, scope)
            .await?
            .ok_or_else(|| StoreError::Missing(id.to_string()))?;

        log::debug!("[{}] retrieve response: {}", T::COLLECTION, found);
        Ok(found)
    }

    /// Applies `changes` to the document whose `_id` they carry.
    ///
    /// The merged document is validated against `T` before anything is
    /// written. `_id` and `createdAt` are never overwritten; `updatedAt` is
    /// refreshed. Dotted keys address nested fields.
    pub async fn update(&self, changes: Document, mut scope: Option<&mut TransactionScope>) -> AppResult<T> {
        let result = self.try_update(changes, scope.as_deref_mut()).await;
        self.settle(Operation::Update, result, scope).await
    }

    /// [`update`](Self::update) with the identifier given separately.
    pub async fn update_by_id(
        &self,
        id: &str,
        mut fields: Document,
        scope: Option<&mut TransactionScope>,
    ) -> AppResult<T> {
        fields.insert("_id", id);
        self.update(fields, scope).await
    }

    async fn try_update(
        &self,
        mut changes: Document,
        mut scope: Option<&mut TransactionScope>,
    ) -> Result<T, StoreError> {
        ensure_active(&scope)?;
        log::debug!("[{}] update request: {}", T::COLLECTION, changes);

        let id = match changes.remove("_id") {
            Some(Bson::ObjectId(id)) => id,
            Some(Bson::String(raw)) => parse_id(&raw)?,
            Some(other) => return Err(StoreError::MalformedId(other.to_string())),
            None => return Err(StoreError::Validation("update requires an _id".to_string())),
        };
        changes.remove("createdAt");
        changes.remove("updatedAt");

        let mut merged = self
            .store
            .find_one(T::COLLECTION, &FindQuery::by_id(id), scope.as_deref_mut())
            .await?
            .ok_or_else(|| StoreError::Missing(id.to_hex()))?;
        for (path, value) in &changes {
            set_path(&mut merged, path, value.clone());
        }

        let candidate: T =
            bson::from_document(merged).map_err(|e| StoreError::Validation(e.to_string()))?;
        candidate.validate().map_err(|e| StoreError::Validation(e.to_string()))?;

        changes.insert("updatedAt", DateTime::now());
        let updated = self
            .store
            .update_by_id(T::COLLECTION, id, changes, scope)
            .await?
            .ok_or_else(|| StoreError::Missing(id.to_hex()))?;

        log::debug!("[{}] update response: {}", T::COLLECTION, updated);
        decode(updated)
    }

    /// Removes the document and returns it as it was just before removal.
    pub async fn delete(&self, id: &str, mut scope: Option<&mut TransactionScope>) -> AppResult<T> {
        let result = self.try_delete(id, scope.as_deref_mut()).await;
        self.settle(Operation::Delete, result, scope).await
    }

    async fn try_delete(&self, id: &str, mut scope: Option<&mut TransactionScope>) -> Result<T, StoreError> {
        ensure_active(&scope)?;
        log::debug!("[{}] delete request: id={}", T::COLLECTION, id);

        let object_id = parse_id(id)?;

        if let DeletionPolicy::Tombstone { collection } = &self.deletion {
            let snapshot = self
                .store
                .find_one(T::COLLECTION, &FindQuery::by_id(object_id), scope.as_deref_mut())
                .await?
                .ok_or_else(|| StoreError::Missing(id.to_string()))?;
            let tombstone = doc! {
                "_id": ObjectId::new(),
                "collection": T::COLLECTION,
                "documentId": object_id,
                "snapshot": strip_internal(snapshot),
                "deletedAt": DateTime::now(),
            };
            self.store.insert(collection, tombstone, scope.as_deref_mut()).await?;
        }

        let removed = self
            .store
            .delete_by_id(T::COLLECTION, object_id, scope)
            .await?
            .ok_or_else(|| StoreError::Missing(id.to_string()))?;
        let snapshot = strip_internal(removed);

        log::debug!("[{}] delete response: {}", T::COLLECTION, snapshot);
        decode(snapshot)
    }

    pub async fn query_list(
        &self,
        filter: Document,
        options: &ListOptions,
        scope: Option<&mut TransactionScope>,
    ) -> AppResult<Page<T>> {
        self.query_list_as::<T>(filter, options, scope).await
    }

    /// Filtered, sorted, bounded page plus totals.
    ///
    /// Outside a scope the count and the page fetch run concurrently; inside
    /// one they share the session and run in sequence.
    pub async fn query_list_as<O: DeserializeOwned>(
        &self,
        filter: Document,
        options: &ListOptions,
        mut scope: Option<&mut TransactionScope>,
    ) -> AppResult<Page<O>> {
        let result = self
            .try_query_list(filter, options, scope.as_deref_mut())
            .await
            .and_then(|page| page.try_map(decode));
        self.settle(Operation::QueryList, result, scope).await
    }

    async fn try_query_list(
        &self,
        filter: Document,
        options: &ListOptions,
        scope: Option<&mut TransactionScope>,
    ) -> Result<Page<Document>, StoreError> {
        ensure_active(&scope)?;

        let filter = normalize_filter(filter)?;
        let window = Window::new(options.page, options.page_size, self.max_page_size);
        log::debug!(
            "[{}] queryList request: filter={} page={} pageSize={}",
            T::COLLECTION,
            filter,
            window.page,
            window.page_size
        );

        let query = FindQuery {
            filter: filter.clone(),
            sort: Some(options.sort.clone().unwrap_or_else(|| doc! { "createdAt": -1 })),
            skip: window.skip,
            limit: Some(window.limit),
            projection: options.projection.clone(),
            populate: options.populate.clone(),
        };

        let (total_documents, data) = match scope {
            Some(scope) => {
                let total = self.store.count(T::COLLECTION, &filter, Some(&mut *scope)).await?;
                let data = self.store.find_many(T::COLLECTION, &query, Some(scope)).await?;
                (total, data)
            }
            None => {
                try_join(
                    self.store.count(T::COLLECTION, &filter, None),
                    self.store.find_many(T::COLLECTION, &query, None),
                )
                .await?
            }
        };

        log::debug!(
            "[{}] queryList response: {} of {} documents",
            T::COLLECTION,
            data.len(),
            total_documents
        );

        Ok(Page {
            data,
            page: window.page,
            page_size: window.page_size,
            total_pages: window.total_pages(total_documents),
            total_documents,
        })
    }

    pub async fn query_one(&self, filter: Document, scope: Option<&mut TransactionScope>) -> AppResult<T> {
        self.query_one_as::<T>(filter, &[], scope).await
    }

    /// First document matching `filter`. Ties follow storage order.
    pub async fn query_one_as<O: DeserializeOwned>(
        &self,
        filter: Document,
        populate: &[Populate],
        mut scope: Option<&mut TransactionScope>,
    ) -> AppResult<O> {
        let result = self
            .try_query_one(filter, populate, scope.as_deref_mut())
            .await
            .and_then(decode);
        self.settle(Operation::QueryOne, result, scope).await
    }

    async fn try_query_one(
        &self,
        filter: Document,
        populate: &[Populate],
        scope: Option<&mut TransactionScope>,
    ) -> Result<Document, StoreError> {
        ensure_active(&scope)?;

        let filter = normalize_filter(filter)?;
        log::debug!("[{}] queryOne request: {}", T::COLLECTION, filter);

        let description = filter.to_string();
        let query = FindQuery::filter(filter).populate(populate);
        let found = self
            .store
            .find_one(T::COLLECTION, &query, scope)
            .await?
            .ok_or(StoreError::Missing(description))?;

        log::debug!("[{}] queryOne response: {}", T::COLLECTION, found);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_store::MemoryStore;
    use crate::db::scope::ScopeState;
    use crate::domain::entities::{HealthUnit, HealthUnitKind, Review, Service};

    fn repository<T: Entity>(store: &Arc<MemoryStore>) -> Repository<T> {
        Repository::new(store.clone(), DeletionPolicy::Hard, 1000)
    }

    fn acme(email: &str) -> HealthUnit {
        HealthUnit::new("Acme Home Care".to_string(), email.to_string(), HealthUnitKind::Company)
    }

    async fn seed_services(repo: &Repository<Service>, count: usize) {
        for i in 0..count {
            repo.create(Service::new(format!("Service {:02}", i), "nursing".to_string()), None)
                .await
                .unwrap();
        }
    }

    #[actix_web::test]
    async fn test_create_assigns_fresh_id_and_timestamps() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<HealthUnit>(&store);

        let supplied = ObjectId::new();
        let mut input = acme("a@x.pt");
        input.id = Some(supplied);

        let created = repo.create(input, None).await.unwrap();

        assert!(created.id.is_some());
        assert_ne!(created.id, Some(supplied));
        assert!(created.created_at.is_some());
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(created.name, "Acme Home Care");
    }

    #[actix_web::test]
    async fn test_create_duplicate_email_is_invalid_parameter() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<HealthUnit>(&store);
        repo.ensure_indexes().await.unwrap();

        repo.create(acme("a@x.pt"), None).await.unwrap();
        let mut second = acme("a@x.pt");
        second.name = "Other Care".to_string();

        let result = repo.create(second, None).await;
        assert!(matches!(result, Err(AppError::InvalidParameter(_))));
        assert_eq!(store.documents("health_units").len(), 1);
    }

    #[actix_web::test]
    async fn test_create_rejects_invalid_entity() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<HealthUnit>(&store);

        let result = repo.create(acme("not-an-email"), None).await;
        assert!(matches!(result, Err(AppError::InvalidParameter(_))));
        assert!(store.documents("health_units").is_empty());
    }

    #[actix_web::test]
    async fn test_retrieve_round_trip_is_stable() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<HealthUnit>(&store);
        let created = repo.create(acme("a@x.pt"), None).await.unwrap();
        let id = created.id.unwrap().to_hex();

        let first = repo.retrieve(&id, None).await.unwrap();
        let second = repo.retrieve(&id, None).await.unwrap();

        assert_eq!(first, created);
        assert_eq!(first, second);
    }

    #[actix_web::test]
    async fn test_retrieve_malformed_id_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<HealthUnit>(&store);

        let result = repo.retrieve("not-a-valid-object-id", None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[actix_web::test]
    async fn test_update_and_delete_absent_id_are_not_found() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<HealthUnit>(&store);
        let absent = ObjectId::new();

        let update = repo.update(doc! { "_id": absent, "name": "Ghost" }, None).await;
        assert!(matches!(update, Err(AppError::NotFound(_))));

        let delete = repo.delete(&absent.to_hex(), None).await;
        assert!(matches!(delete, Err(AppError::NotFound(_))));
        assert!(store.documents("health_units").is_empty());
    }

    #[actix_web::test]
    async fn test_update_out_of_range_rating_is_rejected_before_write() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<Review>(&store);
        let review = repo
            .create(Review::new(ObjectId::new(), ObjectId::new(), 4), None)
            .await
            .unwrap();
        let id = review.id.unwrap();

        let result = repo.update(doc! { "_id": id, "rating": 6 }, None).await;

        assert!(matches!(result, Err(AppError::InvalidParameter(_))));
        assert_eq!(repo.retrieve(&id.to_hex(), None).await.unwrap().rating, 4);
    }

    #[actix_web::test]
    async fn test_update_keeps_identity_and_creation_time() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<HealthUnit>(&store);
        let created = repo.create(acme("a@x.pt"), None).await.unwrap();
        let id = created.id.unwrap();

        let updated = repo
            .update(
                doc! {
                    "_id": id.to_hex(),
                    "name": "Acme Care Lisboa",
                    "rating.average": 4.5,
                    "createdAt": DateTime::from_millis(0),
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(updated.id, Some(id));
        assert_eq!(updated.name, "Acme Care Lisboa");
        assert_eq!(updated.rating.average, 4.5);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.email, "a@x.pt");
    }

    #[actix_web::test]
    async fn test_update_without_id_is_invalid_parameter() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<HealthUnit>(&store);

        let result = repo.update(doc! { "name": "Nameless" }, None).await;
        assert!(matches!(result, Err(AppError::InvalidParameter(_))));
    }

    #[actix_web::test]
    async fn test_delete_twice() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<HealthUnit>(&store);
        let created = repo.create(acme("a@x.pt"), None).await.unwrap();
        let id = created.id.unwrap().to_hex();

        let snapshot = repo.delete(&id, None).await.unwrap();
        assert_eq!(snapshot, created);

        let again = repo.delete(&id, None).await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
    }

    #[actix_web::test]
    async fn test_tombstone_policy_records_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let repo: Repository<HealthUnit> = Repository::new(
            store.clone(),
            DeletionPolicy::Tombstone { collection: "deletions".to_string() },
            1000,
        );
        let created = repo.create(acme("a@x.pt"), None).await.unwrap();
        let id = created.id.unwrap();

        repo.delete(&id.to_hex(), None).await.unwrap();

        let tombstones = store.documents("deletions");
        assert_eq!(tombstones.len(), 1);
        assert_eq!(tombstones[0].get_str("collection").unwrap(), "health_units");
        assert_eq!(tombstones[0].get_object_id("documentId").unwrap(), id);
        assert_eq!(
            tombstones[0].get_document("snapshot").unwrap().get_str("email").unwrap(),
            "a@x.pt"
        );
        assert!(store.documents("health_units").is_empty());
    }

    #[actix_web::test]
    async fn test_query_list_second_page() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<Service>(&store);
        seed_services(&repo, 25).await;

        let options = ListOptions::page(2, 10).sort(doc! { "name": 1 });
        let page = repo.query_list(doc! {}, &options, None).await.unwrap();

        assert_eq!(page.data.len(), 10);
        assert_eq!(page.data[0].name, "Service 10");
        assert_eq!(page.data[9].name, "Service 19");
        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_documents, 25);
    }

    #[actix_web::test]
    async fn test_query_list_totals_do_not_depend_on_page() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<Service>(&store);
        seed_services(&repo, 7).await;

        for page in [0, 1, 2, 3, 9] {
            let result = repo
                .query_list(doc! {}, &ListOptions::page(page, 3), None)
                .await
                .unwrap();
            assert_eq!(result.total_documents, 7);
            assert_eq!(result.total_pages, 3);
        }

        let past_end = repo.query_list(doc! {}, &ListOptions::page(9, 3), None).await.unwrap();
        assert!(past_end.data.is_empty());

        let empty = repo
            .query_list(doc! { "category": "physio" }, &ListOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(empty.total_pages, 1);
        assert_eq!(empty.total_documents, 0);
    }

    #[actix_web::test]
    async fn test_query_list_storage_failure_is_internal() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<Service>(&store);
        store.fail_next(StoreError::Driver("connection reset".to_string()));

        let result = repo.query_list(doc! {}, &ListOptions::default(), None).await;
        assert!(matches!(result, Err(AppError::InternalError(_))));
    }

    #[actix_web::test]
    async fn test_query_one_error_kinds() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<Service>(&store);
        seed_services(&repo, 2).await;

        let found = repo.query_one(doc! { "name": "Service 01" }, None).await.unwrap();
        assert_eq!(found.name, "Service 01");

        let by_string_id = repo
            .query_one(doc! { "_id": found.id.unwrap().to_hex() }, None)
            .await
            .unwrap();
        assert_eq!(by_string_id, found);

        let missing = repo.query_one(doc! { "name": "Nope" }, None).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let malformed_id = repo.query_one(doc! { "_id": "xyz" }, None).await;
        assert!(matches!(malformed_id, Err(AppError::InvalidParameter(_))));

        let malformed_filter = repo.query_one(doc! { "name": { "$where": "1" } }, None).await;
        assert!(matches!(malformed_filter, Err(AppError::InvalidParameter(_))));
    }

    #[actix_web::test]
    async fn test_failure_aborts_scope_and_blocks_reuse() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<HealthUnit>(&store);
        let mut scope = store.begin().await.unwrap();

        let missing = repo.retrieve(&ObjectId::new().to_hex(), Some(&mut scope)).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
        assert_eq!(scope.state(), ScopeState::Aborted);

        let reuse = repo.create(acme("a@x.pt"), Some(&mut scope)).await;
        assert!(matches!(reuse, Err(AppError::InternalError(_))));
        assert!(store.documents("health_units").is_empty());
        assert!(scope.commit().await.is_err());
    }

    #[actix_web::test]
    async fn test_successful_calls_leave_scope_active() {
        let store = Arc::new(MemoryStore::new());
        let repo = repository::<HealthUnit>(&store);
        let mut scope = store.begin().await.unwrap();

        let created = repo.create(acme("a@x.pt"), Some(&mut scope)).await.unwrap();
        let page = repo
            .query_list(doc! { "_id": created.id.unwrap() }, &ListOptions::default(), Some(&mut scope))
            .await
            .unwrap();

        assert_eq!(page.total_documents, 1);
        assert!(scope.is_active());
        assert!(scope.commit().await.is_ok());
    }

    #[actix_web::test]
    async fn test_retrieve_as_populates_references() {
        let store = Arc::new(MemoryStore::new());
        let services = repository::<Service>(&store);
        let units = repository::<HealthUnit>(&store);

        let nursing = services
            .create(Service::new("Nursing".to_string(), "health".to_string()), None)
            .await
            .unwrap();
        let mut unit = acme("a@x.pt");
        unit.services = vec![nursing.id.unwrap()];
        let unit = units.create(unit, None).await.unwrap();

        let view: Document = units
            .retrieve_as(
                &unit.id.unwrap().to_hex(),
                &[Populate::many("services", "services")],
                None,
            )
            .await
            .unwrap();

        let resolved = view.get_array("services").unwrap();
        assert_eq!(
            resolved[0].as_document().unwrap().get_str("name").unwrap(),
            "Nursing"
        );
    }
}
