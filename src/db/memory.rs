//! In-memory [`DocumentStore`] for tests, with per-collection failure injection.

use crate::db::store::DocumentStore;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Passed to [`MemoryDocumentStore::fail_collection`], takes the whole store
/// down, pings included.
pub const EVERY_COLLECTION: &str = "*";

#[derive(Debug, Default)]
struct Entry {
    seq: u64,
    body: Value,
    expires_at: Option<i64>,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    documents: BTreeMap<(String, String), Entry>,
    failing: HashSet<String>,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation on `collection` fails until [`Self::recover`] is called.
    pub async fn fail_collection(&self, collection: &str) {
        self.inner.write().await.failing.insert(collection.to_string());
    }

    pub async fn recover(&self, collection: &str) {
        self.inner.write().await.failing.remove(collection);
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.inner
            .read()
            .await
            .documents
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }
}

fn check(inner: &Inner, collection: &str) -> AppResult<()> {
    if inner.failing.contains(collection) || inner.failing.contains(EVERY_COLLECTION) {
        return Err(AppError::StoreUnavailable(format!(
            "collection '{collection}' is unreachable"
        )));
    }
    Ok(())
}

fn sorted(inner: &Inner, collection: &str, filter: impl Fn(&Value) -> bool) -> Vec<Value> {
    let mut found: Vec<&Entry> = inner
        .documents
        .iter()
        .filter(|((c, _), entry)| c == collection && filter(&entry.body))
        .map(|(_, entry)| entry)
        .collect();
    found.sort_by_key(|entry| entry.seq);
    found.into_iter().map(|entry| entry.body.clone()).collect()
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn ping(&self) -> AppResult<()> {
        check(&*self.inner.read().await, EVERY_COLLECTION)
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> AppResult<Option<Value>> {
        let inner = self.inner.read().await;
        check(&inner, collection)?;
        Ok(inner
            .documents
            .get(&(collection.to_string(), id.to_string()))
            .map(|entry| entry.body.clone()))
    }

    async fn find_all(&self, collection: &str) -> AppResult<Vec<Value>> {
        let inner = self.inner.read().await;
        check(&inner, collection)?;
        Ok(sorted(&inner, collection, |_| true))
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> AppResult<Vec<Value>> {
        let inner = self.inner.read().await;
        check(&inner, collection)?;
        Ok(sorted(&inner, collection, |body| {
            body.get(field).and_then(Value::as_str) == Some(value)
        }))
    }

    async fn save(
        &self,
        collection: &str,
        id: &str,
        body: &Value,
        expires_at: Option<i64>,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        check(&inner, collection)?;
        let key = (collection.to_string(), id.to_string());
        let seq = match inner.documents.get(&key) {
            Some(existing) => existing.seq,
            None => {
                inner.next_seq += 1;
                inner.next_seq
            }
        };
        inner.documents.insert(
            key,
            Entry {
                seq,
                body: body.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        check(&inner, collection)?;
        Ok(inner
            .documents
            .remove(&(collection.to_string(), id.to_string()))
            .is_some())
    }

    async fn delete_expired(&self, collection: &str, now: i64) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        check(&inner, collection)?;
        let before = inner.documents.len();
        inner.documents.retain(|(c, _), entry| {
            c != collection || entry.expires_at.map_or(true, |at| at >= now)
        });
        Ok((before - inner.documents.len()) as u64)
    }
}
