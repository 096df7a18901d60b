//! MongoDB implementation of [`DocumentStore`].
//!
//! Driver errors are classified here, once, into [`StoreError`]; nothing
//! above this file sees a `mongodb::error::Error`.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    error::{Error as MongoError, ErrorKind as MongoErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    ClientSession, Collection, IndexModel,
};

use crate::db::scope::TransactionScope;
use crate::db::store::{DocumentStore, FindQuery, Populate, StoreError};
use crate::db::Database;

const DUPLICATE_KEY: i32 = 11000;
const DOCUMENT_VALIDATION_FAILURE: i32 = 121;
const BAD_VALUE: i32 = 2;
const FAILED_TO_PARSE: i32 = 9;

/// [`DocumentStore`] backed by a MongoDB database.
#[derive(Clone)]
pub struct MongoStore {
    database: Arc<Database>,
}

impl MongoStore {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.get_database().collection::<Document>(name)
    }
}

fn session_of(scope: Option<&mut TransactionScope>) -> Option<&mut ClientSession> {
    scope.and_then(|s| s.session_mut())
}

/// Maps a driver error onto the store fault classes.
pub(crate) fn classify(error: MongoError) -> StoreError {
    match error.kind.as_ref() {
        MongoErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY => {
            StoreError::DuplicateKey { index: duplicate_index(&we.message) }
        }
        MongoErrorKind::Command(ce) if ce.code == DUPLICATE_KEY => {
            StoreError::DuplicateKey { index: duplicate_index(&ce.message) }
        }
        MongoErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DOCUMENT_VALIDATION_FAILURE => {
            StoreError::Validation(we.message.clone())
        }
        MongoErrorKind::Command(ce) if ce.code == BAD_VALUE || ce.code == FAILED_TO_PARSE => {
            StoreError::MalformedFilter(ce.message.clone())
        }
        MongoErrorKind::BsonDeserialization(e) => StoreError::Serialization(e.to_string()),
        MongoErrorKind::BsonSerialization(e) => StoreError::Serialization(e.to_string()),
        _ => StoreError::Driver(error.to_string()),
    }
}

/// Pulls the index name out of an E11000 message.
///
/// `E11000 duplicate key error collection: db.customers index: email_unique dup key: { ... }`
fn duplicate_index(message: &str) -> String {
    message
        .split("index: ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or("unknown")
        .to_string()
}

/// Aggregation pipeline for reads that resolve references.
fn populate_pipeline(query: &FindQuery) -> Vec<Document> {
    let mut pipeline = vec![doc! { "$match": query.filter.clone() }];

    if let Some(sort) = query.sort.as_ref().filter(|s| !s.is_empty()) {
        pipeline.push(doc! { "$sort": sort.clone() });
    }
    if query.skip > 0 {
        pipeline.push(doc! { "$skip": i64::try_from(query.skip).unwrap_or(i64::MAX) });
    }
    if let Some(limit) = query.limit {
        pipeline.push(doc! { "$limit": limit });
    }

    for Populate { path, from, many } in &query.populate {
        pipeline.push(doc! {
            "$lookup": {
                "from": from,
                "localField": path,
                "foreignField": "_id",
                "as": path,
            }
        });
        if !many {
            pipeline.push(doc! {
                "$unwind": {
                    "path": format!("${}", path),
                    "preserveNullAndEmptyArrays": true,
                }
            });
        }
    }

    if let Some(projection) = query.projection.as_ref().filter(|p| !p.is_empty()) {
        pipeline.push(doc! { "$project": projection.clone() });
    }

    pipeline
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn begin(&self) -> Result<TransactionScope, StoreError> {
        let mut session = self.database.client().start_session().await.map_err(classify)?;
        session.start_transaction().await.map_err(classify)?;

        let scope = TransactionScope::with_session(session);
        log::debug!("Scope {} started", scope.id());
        Ok(scope)
    }

    async fn insert(
        &self,
        collection: &str,
        document: Document,
        scope: Option<&mut TransactionScope>,
    ) -> Result<(), StoreError> {
        let coll = self.collection(collection);

        let result = match session_of(scope) {
            Some(session) => coll.insert_one(document).session(session).await,
            None => coll.insert_one(document).await,
        };

        result.map(|_| ()).map_err(classify)
    }

    async fn find_one(
        &self,
        collection: &str,
        query: &FindQuery,
        scope: Option<&mut TransactionScope>,
    ) -> Result<Option<Document>, StoreError> {
        let mut single = query.clone();
        single.limit = Some(1);

        let mut documents = self.find_many(collection, &single, scope).await?;
        Ok(if documents.is_empty() { None } else { Some(documents.swap_remove(0)) })
    }

    async fn find_many(
        &self,
        collection: &str,
        query: &FindQuery,
        scope: Option<&mut TransactionScope>,
    ) -> Result<Vec<Document>, StoreError> {
        let coll = self.collection(collection);
        let session = session_of(scope);

        if !query.populate.is_empty() {
            let pipeline = populate_pipeline(query);
            return match session {
                Some(session) => {
                    let mut cursor = coll.aggregate(pipeline).session(&mut *session).await.map_err(classify)?;
                    let mut documents = Vec::new();
                    while let Some(document) = cursor.next(&mut *session).await {
                        documents.push(document.map_err(classify)?);
                    }
                    Ok(documents)
                }
                None => {
                    let cursor = coll.aggregate(pipeline).await.map_err(classify)?;
                    cursor.try_collect().await.map_err(classify)
                }
            };
        }

        let options = FindOptions::builder()
            .sort(query.sort.clone())
            .skip(if query.skip > 0 { Some(query.skip) } else { None })
            .limit(query.limit)
            .projection(query.projection.clone())
            .build();

        match session {
            Some(session) => {
                let mut cursor = coll
                    .find(query.filter.clone())
                    .with_options(options)
                    .session(&mut *session)
                    .await
                    .map_err(classify)?;
                let mut documents = Vec::new();
                while let Some(document) = cursor.next(&mut *session).await {
                    documents.push(document.map_err(classify)?);
                }
                Ok(documents)
            }
            None => {
                let cursor = coll
                    .find(query.filter.clone())
                    .with_options(options)
                    .await
                    .map_err(classify)?;
                cursor.try_collect().await.map_err(classify)
            }
        }
    }

    async fn count(
        &self,
        collection: &str,
        filter: &Document,
        scope: Option<&mut TransactionScope>,
    ) -> Result<u64, StoreError> {
        let coll = self.collection(collection);

        let result = match session_of(scope) {
            Some(session) => coll.count_documents(filter.clone()).session(session).await,
            None => coll.count_documents(filter.clone()).await,
        };

        result.map_err(classify)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        fields: Document,
        scope: Option<&mut TransactionScope>,
    ) -> Result<Option<Document>, StoreError> {
        let coll = self.collection(collection);
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let action = coll
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": fields })
            .with_options(options);

        let result = match session_of(scope) {
            Some(session) => action.session(session).await,
            None => action.await,
        };

        result.map_err(classify)
    }

    async fn delete_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        scope: Option<&mut TransactionScope>,
    ) -> Result<Option<Document>, StoreError> {
        let coll = self.collection(collection);
        let action = coll.find_one_and_delete(doc! { "_id": id });

        let result = match session_of(scope) {
            Some(session) => action.session(session).await,
            None => action.await,
        };

        result.map_err(classify)
    }

    async fn ensure_unique(&self, collection: &str, fields: &[&str]) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }

        let indexes = fields.iter().map(|field| {
            IndexModel::builder()
                .keys(doc! { *field: 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name(format!("{}_unique", field))
                        .build(),
                )
                .build()
        });

        self.collection(collection)
            .create_indexes(indexes)
            .await
            .map_err(classify)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_index_is_extracted() {
        let message = "E11000 duplicate key error collection: care.customers index: email_unique dup key: { email: \"a@x.pt\" }";
        assert_eq!(duplicate_index(message), "email_unique");
        assert_eq!(duplicate_index("E11000 duplicate key error"), "unknown");
    }

    #[test]
    fn test_populate_pipeline_unwinds_single_references() {
        let query = FindQuery::filter(doc! { "status": "pending" })
            .populate(&[Populate::one("customer", "customers"), Populate::many("services", "services")]);

        let pipeline = populate_pipeline(&query);

        assert_eq!(pipeline.len(), 4);
        assert!(pipeline[1].contains_key("$lookup"));
        assert_eq!(
            pipeline[2].get_document("$unwind").unwrap().get_str("path").unwrap(),
            "$customer"
        );
        assert!(pipeline[3].contains_key("$lookup"));
    }

    #[test]
    fn test_populate_pipeline_keeps_page_window_before_lookup() {
        let mut query = FindQuery::filter(doc! {}).populate(&[Populate::one("healthUnit", "health_units")]);
        query.sort = Some(doc! { "createdAt": -1 });
        query.skip = 20;
        query.limit = Some(10);

        let stages: Vec<String> = populate_pipeline(&query)
            .iter()
            .map(|stage| stage.keys().next().unwrap().clone())
            .collect();

        assert_eq!(stages, vec!["$match", "$sort", "$skip", "$limit", "$lookup", "$unwind"]);
    }
}
