//! Document store seam. Every persistence call in the service goes through
//! `DocumentStore`; `PgDocumentStore` (db.rs) backs production and
//! `MemoryStore` backs tests and `STORE_BACKEND=memory`.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

pub const SIMULATIONS: &str = "simulations";
pub const SESSIONS: &str = "sessions";
pub const PROBLEMS: &str = "problems";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected for {collection}/{id}: {message}")]
    Write {
        collection: String,
        id: String,
        message: String,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Top-level field equality filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        doc.get(&self.field) == Some(&self.value)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Value>, StoreError>;

    /// Insert or replace.
    async fn put(&self, collection: &str, id: &str, record: Value) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Cheap reachability check run before batch writes.
    async fn ping(&self) -> Result<(), StoreError>;
}

pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(collection, id).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub async fn query_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    filters: &[Filter],
) -> Result<Vec<T>, StoreError> {
    store
        .query(collection, filters)
        .await?
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(StoreError::from))
        .collect()
}

pub async fn put_typed<T: Serialize>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    record: &T,
) -> Result<(), StoreError> {
    store.put(collection, id, serde_json::to_value(record)?).await
}

/// Process-local store. Documents live in insertion order per collection.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<(String, Value)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.collections.read().await.get(collection).and_then(|docs| {
            docs.iter()
                .find(|(key, _)| key == id)
                .map(|(_, v)| v.clone())
        }))
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, doc)| filters.iter().all(|f| f.matches(doc)))
                    .map(|(_, doc)| doc.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn put(&self, collection: &str, id: &str, record: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|(key, _)| key == id) {
            Some((_, existing)) => *existing = record,
            None => docs.push((id.to_string(), record)),
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        if let Some(docs) = self.collections.write().await.get_mut(collection) {
            docs.retain(|(key, _)| key != id);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_replaces_existing_document() {
        let store = MemoryStore::new();
        store.put("c", "a", json!({"v": 1})).await.unwrap();
        store.put("c", "a", json!({"v": 2})).await.unwrap();
        assert_eq!(store.len("c").await, 1);
        assert_eq!(store.get("c", "a").await.unwrap(), Some(json!({"v": 2})));
    }

    #[tokio::test]
    async fn test_query_applies_all_filters() {
        let store = MemoryStore::new();
        store.put("c", "1", json!({"user": "u1", "round": "A"})).await.unwrap();
        store.put("c", "2", json!({"user": "u1", "round": "B"})).await.unwrap();
        store.put("c", "3", json!({"user": "u2", "round": "A"})).await.unwrap();

        let hits = store
            .query("c", &[Filter::eq("user", "u1"), Filter::eq("round", "A")])
            .await
            .unwrap();
        assert_eq!(hits, vec![json!({"user": "u1", "round": "A"})]);
    }

    #[tokio::test]
    async fn test_delete_and_missing_collection() {
        let store = MemoryStore::new();
        store.put("c", "a", json!({})).await.unwrap();
        store.delete("c", "a").await.unwrap();
        store.delete("missing", "a").await.unwrap();
        assert_eq!(store.get("c", "a").await.unwrap(), None);
        assert!(store.query("missing", &[]).await.unwrap().is_empty());
    }
}
