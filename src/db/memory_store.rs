//! In-process [`DocumentStore`] for tests.
//!
//! Compiled under `cfg(test)` and the `test-utils` feature. It keeps one
//! insertion-ordered `Vec<Document>` per collection and evaluates the
//! subset of the MongoDB query language the repositories use:
//!
//! - equality (arrays match when any element is equal), dotted paths
//! - `$eq`, `$ne`, `$in`, `$nin`, `$gt`, `$gte`, `$lt`, `$lte`, `$exists`
//!
//! Any other `$` operator is reported as [`StoreError::MalformedFilter`].
//! Scopes are detached: writes apply immediately and nothing rolls back.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};

use crate::db::scope::TransactionScope;
use crate::db::store::{set_path, DocumentStore, FindQuery, Populate, StoreError};

#[derive(Default)]
struct Collections {
    documents: HashMap<String, Vec<Document>>,
    unique: HashMap<String, Vec<String>>,
    failure: Option<StoreError>,
    healthy_calls: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next store call fail with `error`.
    pub fn fail_next(&self, error: StoreError) {
        self.fail_after(0, error);
    }

    /// Lets `calls` store calls through, then fails the one after with `error`.
    pub fn fail_after(&self, calls: usize, error: StoreError) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failure = Some(error);
            inner.healthy_calls = calls;
        }
    }

    /// Snapshot of a collection in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.inner
            .lock()
            .map(|inner| inner.documents.get(collection).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Driver("memory store lock poisoned".to_string()))?;
        if inner.failure.is_some() && inner.healthy_calls > 0 {
            inner.healthy_calls -= 1;
            return Ok(inner);
        }
        match inner.failure.take() {
            Some(error) => Err(error),
            None => Ok(inner),
        }
    }
}

fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            Some(x.timestamp_millis().cmp(&y.timestamp_millis()))
        }
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => as_f64(a)?.partial_cmp(&as_f64(b)?),
    }
}

fn same(a: &Bson, b: &Bson) -> bool {
    a == b || compare(a, b) == Some(Ordering::Equal)
}

fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| same(item, expected))
        }
        Some(actual) => same(actual, expected),
    }
}

fn ordered(value: Option<&Bson>, operand: &Bson, accept: &[Ordering]) -> bool {
    match value {
        Some(Bson::Array(items)) => items
            .iter()
            .any(|item| compare(item, operand).is_some_and(|o| accept.contains(&o))),
        Some(actual) => compare(actual, operand).is_some_and(|o| accept.contains(&o)),
        None => false,
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        other => as_f64(other).is_none_or(|n| n != 0.0),
    }
}

fn operand_list<'a>(op: &str, operand: &'a Bson) -> Result<&'a Vec<Bson>, StoreError> {
    match operand {
        Bson::Array(items) => Ok(items),
        _ => Err(StoreError::MalformedFilter(format!("{} needs an array", op))),
    }
}

fn matches_condition(value: Option<&Bson>, condition: &Bson) -> Result<bool, StoreError> {
    let operators = match condition {
        Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => ops,
        _ => return Ok(equals(value, condition)),
    };

    for (op, operand) in operators {
        let ok = match op.as_str() {
            "$eq" => equals(value, operand),
            "$ne" => !equals(value, operand),
            "$in" => operand_list(op, operand)?.iter().any(|c| equals(value, c)),
            "$nin" => !operand_list(op, operand)?.iter().any(|c| equals(value, c)),
            "$gt" => ordered(value, operand, &[Ordering::Greater]),
            "$gte" => ordered(value, operand, &[Ordering::Greater, Ordering::Equal]),
            "$lt" => ordered(value, operand, &[Ordering::Less]),
            "$lte" => ordered(value, operand, &[Ordering::Less, Ordering::Equal]),
            "$exists" => value.is_some() == truthy(operand),
            other => {
                return Err(StoreError::MalformedFilter(format!("unsupported operator {}", other)));
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches(document: &Document, filter: &Document) -> Result<bool, StoreError> {
    for (key, condition) in filter {
        if key.starts_with('$') {
            return Err(StoreError::MalformedFilter(format!("unsupported operator {}", key)));
        }
        if !matches_condition(lookup(document, key), condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sort_documents(documents: &mut [Document], sort: &Document) {
    documents.sort_by(|a, b| {
        for (field, direction) in sort {
            let ordering = match (lookup(a, field), lookup(b, field)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
            };
            let ordering = if as_f64(direction).is_some_and(|d| d < 0.0) {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn project(document: Document, projection: &Document) -> Document {
    let inclusive = projection
        .iter()
        .any(|(field, flag)| field != "_id" && truthy(flag));
    let keep_id = projection.get("_id").is_none_or(truthy);

    if inclusive {
        document
            .into_iter()
            .filter(|(field, _)| {
                if field == "_id" {
                    keep_id
                } else {
                    projection.get(field).is_some_and(truthy)
                }
            })
            .collect()
    } else {
        document
            .into_iter()
            .filter(|(field, _)| match projection.get(field) {
                Some(flag) => truthy(flag),
                None => true,
            })
            .collect()
    }
}

fn resolve(collections: &Collections, document: &mut Document, populate: &Populate) {
    let source = collections.documents.get(&populate.from);
    let find = |id: &Bson| -> Option<Document> {
        source?
            .iter()
            .find(|candidate| candidate.get("_id").is_some_and(|own| same(own, id)))
            .cloned()
    };

    match document.get(&populate.path).cloned() {
        Some(Bson::Array(ids)) if populate.many => {
            let resolved: Vec<Bson> = ids.iter().filter_map(find).map(Bson::Document).collect();
            set_path(document, &populate.path, Bson::Array(resolved));
        }
        Some(id) if !populate.many => match find(&id) {
            Some(found) => set_path(document, &populate.path, Bson::Document(found)),
            None => {
                document.remove(&populate.path);
            }
        },
        _ => {}
    }
}

fn check_unique(
    collections: &Collections,
    collection: &str,
    candidate: &Document,
) -> Result<(), StoreError> {
    let Some(fields) = collections.unique.get(collection) else {
        return Ok(());
    };
    let Some(existing) = collections.documents.get(collection) else {
        return Ok(());
    };
    let own_id = candidate.get("_id");

    for field in fields {
        let value = lookup(candidate, field).cloned().unwrap_or(Bson::Null);
        let clash = existing.iter().any(|other| {
            other.get("_id") != own_id
                && same(lookup(other, field).unwrap_or(&Bson::Null), &value)
        });
        if clash {
            return Err(StoreError::DuplicateKey { index: format!("{}_unique", field) });
        }
    }
    Ok(())
}

fn object_id_of(document: &Document) -> Option<ObjectId> {
    match document.get("_id") {
        Some(Bson::ObjectId(id)) => Some(*id),
        _ => None,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn begin(&self) -> Result<TransactionScope, StoreError> {
        drop(self.lock()?);
        Ok(TransactionScope::detached())
    }

    async fn insert(
        &self,
        collection: &str,
        mut document: Document,
        _scope: Option<&mut TransactionScope>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;

        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        let id = document.get("_id").cloned();
        let taken = inner
            .documents
            .get(collection)
            .is_some_and(|docs| docs.iter().any(|d| d.get("_id") == id.as_ref()));
        if taken {
            return Err(StoreError::DuplicateKey { index: "_id_".to_string() });
        }
        check_unique(&inner, collection, &document)?;

        inner.documents.entry(collection.to_string()).or_default().push(document);
        Ok(())
    }

    async fn find_one(
        &self,
        collection: &str,
        query: &FindQuery,
        scope: Option<&mut TransactionScope>,
    ) -> Result<Option<Document>, StoreError> {
        let mut single = query.clone();
        single.limit = Some(1);
        Ok(self.find_many(collection, &single, scope).await?.into_iter().next())
    }

    async fn find_many(
        &self,
        collection: &str,
        query: &FindQuery,
        _scope: Option<&mut TransactionScope>,
    ) -> Result<Vec<Document>, StoreError> {
        let inner = self.lock()?;

        let mut found = Vec::new();
        for document in inner.documents.get(collection).into_iter().flatten() {
            if matches(document, &query.filter)? {
                found.push(document.clone());
            }
        }

        if let Some(sort) = &query.sort {
            sort_documents(&mut found, sort);
        }

        let limit = match query.limit {
            Some(n) if n > 0 => n as usize,
            _ => usize::MAX,
        };
        let mut page: Vec<Document> = found.into_iter().skip(query.skip as usize).take(limit).collect();

        for document in &mut page {
            for populate in &query.populate {
                resolve(&inner, document, populate);
            }
        }

        if let Some(projection) = query.projection.as_ref().filter(|p| !p.is_empty()) {
            page = page.into_iter().map(|d| project(d, projection)).collect();
        }

        Ok(page)
    }

    async fn count(
        &self,
        collection: &str,
        filter: &Document,
        _scope: Option<&mut TransactionScope>,
    ) -> Result<u64, StoreError> {
        let inner = self.lock()?;

        let mut total = 0;
        for document in inner.documents.get(collection).into_iter().flatten() {
            if matches(document, filter)? {
                total += 1;
            }
        }
        Ok(total)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        fields: Document,
        _scope: Option<&mut TransactionScope>,
    ) -> Result<Option<Document>, StoreError> {
        let mut inner = self.lock()?;

        let Some(position) = inner
            .documents
            .get(collection)
            .and_then(|docs| docs.iter().position(|d| object_id_of(d) == Some(id)))
        else {
            return Ok(None);
        };

        let mut updated = inner.documents[collection][position].clone();
        for (path, value) in fields {
            set_path(&mut updated, &path, value);
        }
        check_unique(&inner, collection, &updated)?;

        if let Some(docs) = inner.documents.get_mut(collection) {
            docs[position] = updated.clone();
        }
        Ok(Some(updated))
    }

    async fn delete_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        _scope: Option<&mut TransactionScope>,
    ) -> Result<Option<Document>, StoreError> {
        let mut inner = self.lock()?;

        let Some(docs) = inner.documents.get_mut(collection) else {
            return Ok(None);
        };
        Ok(docs
            .iter()
            .position(|d| object_id_of(d) == Some(id))
            .map(|position| docs.remove(position)))
    }

    async fn ensure_unique(&self, collection: &str, fields: &[&str]) -> Result<(), StoreError> {
        let mut inner = self.lock()?;

        let declared = inner.unique.entry(collection.to_string()).or_default();
        for field in fields {
            if !declared.iter().any(|f| f == field) {
                declared.push(field.to_string());
            }
        }
        Ok(())
    }
}
