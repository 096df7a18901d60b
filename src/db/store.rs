//! Document store seam.
//!
//! [`DocumentStore`] is the only thing repositories know about storage. It
//! speaks `bson::Document` and collection names, so it stays object-safe
//! and one `Arc<dyn DocumentStore>` serves every repository.
//!
//! Implementations:
//!
//! - [`MongoStore`](crate::db::mongo_store::MongoStore) for production
//! - `MemoryStore` (tests and the `test-utils` feature)

use async_trait::async_trait;
use mongodb::bson::{Bson, Document, oid::ObjectId};
use thiserror::Error;

use crate::db::scope::TransactionScope;

/// Driver-neutral storage fault.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("malformed identifier: {0}")]
    MalformedId(String),

    #[error("malformed filter: {0}")]
    MalformedFilter(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("duplicate key on index {index}")]
    DuplicateKey { index: String },

    #[error("document (de)serialization failed: {0}")]
    Serialization(String),

    #[error("transaction scope is no longer active")]
    ScopeInactive,

    #[error("no document matches {0}")]
    Missing(String),

    #[error("storage driver error: {0}")]
    Driver(String),
}

/// Fault classes used as keys of the taxonomy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    MalformedId,
    MalformedFilter,
    Validation,
    DuplicateKey,
    Serialization,
    ScopeInactive,
    Missing,
    Driver,
}

impl StoreError {
    pub fn class(&self) -> FaultClass {
        match self {
            StoreError::MalformedId(_) => FaultClass::MalformedId,
            StoreError::MalformedFilter(_) => FaultClass::MalformedFilter,
            StoreError::Validation(_) => FaultClass::Validation,
            StoreError::DuplicateKey { .. } => FaultClass::DuplicateKey,
            StoreError::Serialization(_) => FaultClass::Serialization,
            StoreError::ScopeInactive => FaultClass::ScopeInactive,
            StoreError::Missing(_) => FaultClass::Missing,
            StoreError::Driver(_) => FaultClass::Driver,
        }
    }
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(e: mongodb::bson::ser::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<mongodb::bson::de::Error> for StoreError {
    fn from(e: mongodb::bson::de::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Reference resolution instruction.
///
/// Replaces the identifier stored at `path` with the document it points to
/// in collection `from`. With `many`, `path` holds an array of identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct Populate {
    pub path: String,
    pub from: String,
    pub many: bool,
}

impl Populate {
    pub fn one(path: &str, from: &str) -> Self {
        Self { path: path.to_string(), from: from.to_string(), many: false }
    }

    pub fn many(path: &str, from: &str) -> Self {
        Self { path: path.to_string(), from: from.to_string(), many: true }
    }
}

/// Sets `value` at a dotted `path`, creating intermediate documents.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }
            if let Some(Bson::Document(child)) = document.get_mut(head) {
                set_path(child, rest, value);
            }
        }
    }
}

/// Read query passed down to the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Document,
    pub sort: Option<Document>,
    pub skip: u64,
    pub limit: Option<i64>,
    pub projection: Option<Document>,
    pub populate: Vec<Populate>,
}

impl FindQuery {
    pub fn filter(filter: Document) -> Self {
        Self { filter, ..Default::default() }
    }

    pub fn by_id(id: ObjectId) -> Self {
        Self::filter(mongodb::bson::doc! { "_id": id })
    }

    pub fn populate(mut self, populate: &[Populate]) -> Self {
        self.populate = populate.to_vec();
        self
    }
}

/// Storage driver contract.
///
/// Every method takes an optional [`TransactionScope`]. Stores do not check
/// scope state; the repository does that before delegating.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Opens a unit of work.
    async fn begin(&self) -> Result<TransactionScope, StoreError>;

    async fn insert(
        &self,
        collection: &str,
        document: Document,
        scope: Option<&mut TransactionScope>,
    ) -> Result<(), StoreError>;

    async fn find_one(
        &self,
        collection: &str,
        query: &FindQuery,
        scope: Option<&mut TransactionScope>,
    ) -> Result<Option<Document>, StoreError>;

    async fn find_many(
        &self,
        collection: &str,
        query: &FindQuery,
        scope: Option<&mut TransactionScope>,
    ) -> Result<Vec<Document>, StoreError>;

    async fn count(
        &self,
        collection: &str,
        filter: &Document,
        scope: Option<&mut TransactionScope>,
    ) -> Result<u64, StoreError>;

    /// Applies `$set: fields` and returns the post-update document.
    async fn update_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        fields: Document,
        scope: Option<&mut TransactionScope>,
    ) -> Result<Option<Document>, StoreError>;

    /// Removes the document and returns its pre-delete snapshot.
    async fn delete_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        scope: Option<&mut TransactionScope>,
    ) -> Result<Option<Document>, StoreError>;

    /// Declares `fields` unique within `collection`.
    async fn ensure_unique(&self, collection: &str, fields: &[&str]) -> Result<(), StoreError>;
}
